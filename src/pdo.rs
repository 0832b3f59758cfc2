/*!
    process data records exchanged every bus cycle with the drive

    A drive is configured with one rx record type (master outputs) and one tx record type (master inputs). Each type is a fixed list of manufacturer PDOs assigned to the sync manager, whose concatenated content gives the packed little-endian layouts below.

    | record        | assigned PDOs                   | bytes |
    |---------------|---------------------------------|-------|
    | rx Standard   | 0x1605, 0x1618                  | 18    |
    | rx CST        | 0x1602, 0x160b                  | 6     |
    | tx Standard   | 0x1a03, 0x1a1d, 0x1a1f, 0x1a18  | 22    |
    | tx CST        | 0x1a02, 0x1a11                  | 14    |
*/

use crate::{
    data::{PduData, PackingResult, Cursor},
    cia402::{ControlWord, StatusWord, OperationMode},
    command::RawCommand,
    };
use serde::Deserialize;
use core::fmt;


/// byte size of the biggest record, enough for a stack buffer holding any of them
pub const MAX_RECORD_SIZE: usize = 22;


/// kind of record the drive receives
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
pub enum RxPdoType {
    /// not configured
    #[default]
    #[serde(rename = "NA")]
    Na,
    Standard,
    /// cyclic synchronous torque
    #[serde(rename = "CST")]
    Cst,
}

/// kind of record the drive transmits
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
pub enum TxPdoType {
    /// not configured
    #[default]
    #[serde(rename = "NA")]
    Na,
    Standard,
    /// cyclic synchronous torque
    #[serde(rename = "CST")]
    Cst,
}

impl RxPdoType {
    /// PDO indices to assign to the rx sync manager, in order
    pub fn assignment(self) -> Option<&'static [u16]> {
        match self {
            Self::Na => None,
            Self::Standard => Some(&[0x1605, 0x1618]),
            Self::Cst => Some(&[0x1602, 0x160b]),
        }
    }
    /// byte size of the record
    pub fn size(self) -> Option<usize> {
        match self {
            Self::Na => None,
            Self::Standard => Some(RxPdoStandard::packed_size()),
            Self::Cst => Some(RxPdoCst::packed_size()),
        }
    }
}

impl TxPdoType {
    /// PDO indices to assign to the tx sync manager, in order
    pub fn assignment(self) -> Option<&'static [u16]> {
        match self {
            Self::Na => None,
            Self::Standard => Some(&[0x1a03, 0x1a1d, 0x1a1f, 0x1a18]),
            Self::Cst => Some(&[0x1a02, 0x1a11]),
        }
    }
    /// byte size of the record
    pub fn size(self) -> Option<usize> {
        match self {
            Self::Na => None,
            Self::Standard => Some(TxPdoStandard::packed_size()),
            Self::Cst => Some(TxPdoCst::packed_size()),
        }
    }
}

impl fmt::Display for RxPdoType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {Self::Na => "NA", Self::Standard => "Standard", Self::Cst => "CST"})
    }
}
impl fmt::Display for TxPdoType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {Self::Na => "NA", Self::Standard => "Standard", Self::Cst => "CST"})
    }
}


/// byte sizes of the records negotiated by the master for one drive
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PdoInfo {
    pub rx_size: u16,
    pub tx_size: u16,
}


/// rx record for position, velocity and torque modes
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RxPdoStandard {
    pub target_position: i32,
    pub target_velocity: i32,
    pub target_torque: i16,
    pub max_torque: u16,
    pub controlword: ControlWord,
    pub mode_of_operation: i8,
    pub torque_offset: i16,
}
impl PduData for RxPdoStandard {
    type Packed = [u8; 18];

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        let mut cursor = Cursor::new(dst);
        cursor.pack(&self.target_position)?;
        cursor.pack(&self.target_velocity)?;
        cursor.pack(&self.target_torque)?;
        cursor.pack(&self.max_torque)?;
        cursor.pack(&self.controlword)?;
        cursor.pack(&self.mode_of_operation)?;
        cursor.write(&[0])?;
        cursor.pack(&self.torque_offset)?;
        Ok(())
    }
    fn unpack(src: &[u8]) -> PackingResult<Self> {
        let mut cursor = Cursor::new(src);
        let target_position = cursor.unpack()?;
        let target_velocity = cursor.unpack()?;
        let target_torque = cursor.unpack()?;
        let max_torque = cursor.unpack()?;
        let controlword = cursor.unpack()?;
        let mode_of_operation = cursor.unpack()?;
        cursor.unpack::<u8>()?;
        let torque_offset = cursor.unpack()?;
        Ok(Self {target_position, target_velocity, target_torque, max_torque, controlword, mode_of_operation, torque_offset})
    }
}

/// rx record for cyclic synchronous torque
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RxPdoCst {
    pub target_torque: i16,
    pub controlword: ControlWord,
    pub mode_of_operation: i8,
}
impl PduData for RxPdoCst {
    type Packed = [u8; 6];

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        let mut cursor = Cursor::new(dst);
        cursor.pack(&self.target_torque)?;
        cursor.pack(&self.controlword)?;
        cursor.pack(&self.mode_of_operation)?;
        cursor.write(&[0])?;
        Ok(())
    }
    fn unpack(src: &[u8]) -> PackingResult<Self> {
        let mut cursor = Cursor::new(src);
        let target_torque = cursor.unpack()?;
        let controlword = cursor.unpack()?;
        let mode_of_operation = cursor.unpack()?;
        cursor.unpack::<u8>()?;
        Ok(Self {target_torque, controlword, mode_of_operation})
    }
}

/// tx record for position, velocity and torque modes
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TxPdoStandard {
    pub actual_position: i32,
    pub digital_inputs: u32,
    pub actual_velocity: i32,
    pub statusword: StatusWord,
    pub analog_input: i16,
    pub actual_current: i16,
    pub bus_voltage: u32,
}
impl PduData for TxPdoStandard {
    type Packed = [u8; 22];

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        let mut cursor = Cursor::new(dst);
        cursor.pack(&self.actual_position)?;
        cursor.pack(&self.digital_inputs)?;
        cursor.pack(&self.actual_velocity)?;
        cursor.pack(&self.statusword)?;
        cursor.pack(&self.analog_input)?;
        cursor.pack(&self.actual_current)?;
        cursor.pack(&self.bus_voltage)?;
        Ok(())
    }
    fn unpack(src: &[u8]) -> PackingResult<Self> {
        let mut cursor = Cursor::new(src);
        Ok(Self {
            actual_position: cursor.unpack()?,
            digital_inputs: cursor.unpack()?,
            actual_velocity: cursor.unpack()?,
            statusword: cursor.unpack()?,
            analog_input: cursor.unpack()?,
            actual_current: cursor.unpack()?,
            bus_voltage: cursor.unpack()?,
        })
    }
}

/// tx record for cyclic synchronous torque
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TxPdoCst {
    pub actual_position: i32,
    /// actual torque, in the same unit as the current
    pub actual_torque: i16,
    pub statusword: StatusWord,
    pub mode_of_operation_display: i8,
    pub actual_velocity: i32,
}
impl PduData for TxPdoCst {
    type Packed = [u8; 14];

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        let mut cursor = Cursor::new(dst);
        cursor.pack(&self.actual_position)?;
        cursor.pack(&self.actual_torque)?;
        cursor.pack(&self.statusword)?;
        cursor.pack(&self.mode_of_operation_display)?;
        cursor.write(&[0])?;
        cursor.pack(&self.actual_velocity)?;
        Ok(())
    }
    fn unpack(src: &[u8]) -> PackingResult<Self> {
        let mut cursor = Cursor::new(src);
        let actual_position = cursor.unpack()?;
        let actual_torque = cursor.unpack()?;
        let statusword = cursor.unpack()?;
        let mode_of_operation_display = cursor.unpack()?;
        cursor.unpack::<u8>()?;
        let actual_velocity = cursor.unpack()?;
        Ok(Self {actual_position, actual_torque, statusword, mode_of_operation_display, actual_velocity})
    }
}


/// any rx record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RxPdo {
    Standard(RxPdoStandard),
    Cst(RxPdoCst),
}

impl RxPdo {
    /// build the record of the given type from a staged command, `None` if the type is not configured
    pub fn new(ty: RxPdoType, command: &RawCommand, controlword: ControlWord, mode: OperationMode) -> Option<Self> {
        match ty {
            RxPdoType::Na => None,
            RxPdoType::Standard => Some(Self::Standard(RxPdoStandard {
                target_position: command.target_position,
                target_velocity: command.target_velocity,
                target_torque: command.target_torque,
                max_torque: command.max_torque,
                controlword,
                mode_of_operation: mode.code(),
                torque_offset: command.torque_offset,
                })),
            RxPdoType::Cst => Some(Self::Cst(RxPdoCst {
                target_torque: command.target_torque,
                controlword,
                mode_of_operation: mode.code(),
                })),
        }
    }
    pub fn size(&self) -> usize {
        match self {
            Self::Standard(_) => RxPdoStandard::packed_size(),
            Self::Cst(_) => RxPdoCst::packed_size(),
        }
    }
    pub fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        match self {
            Self::Standard(record) => record.pack(dst),
            Self::Cst(record) => record.pack(dst),
        }
    }
}

/// any tx record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TxPdo {
    Standard(TxPdoStandard),
    Cst(TxPdoCst),
}

impl TxPdo {
    /// decode a record of the given type, `None` if the type is not configured
    pub fn unpack(ty: TxPdoType, src: &[u8]) -> PackingResult<Option<Self>> {
        Ok(match ty {
            TxPdoType::Na => None,
            TxPdoType::Standard => Some(Self::Standard(TxPdoStandard::unpack(src)?)),
            TxPdoType::Cst => Some(Self::Cst(TxPdoCst::unpack(src)?)),
        })
    }
}
