//! Convenient structures to address the drive's dictionnary objects (SDO) and the standard objects a CiA 402 drive exposes.
//!
//! # Example of PDO assignment
//!
//! ```no_run
//! # use etherage_cia402::{Bus, BusResult, SdoAbortCode, sdo::pdo_assignment};
//! # fn assign(bus: &impl Bus, slave: u16, timeout: core::time::Duration) -> BusResult<(), SdoAbortCode> {
//! // the assignment list of the rx sync manager is cleared first
//! bus.sdo_write(slave, &pdo_assignment::rx.len(), 0, timeout)?;
//! // then filled with the indices of the PDOs composing the record
//! bus.sdo_write(slave, &pdo_assignment::rx.slot(0), 0x1605, timeout)?;
//! bus.sdo_write(slave, &pdo_assignment::rx.slot(1), 0x1618, timeout)?;
//! // and closed with the number of assigned PDOs
//! bus.sdo_write(slave, &pdo_assignment::rx.len(), 2, timeout)?;
//! # Ok(())
//! # }
//! ```

use crate::data::PduData;
use bilge::prelude::*;
use core::{
	fmt,
	marker::PhantomData,
	};


/// description of an SDO's subitem, not a SDO itself
pub struct Sdo<T: PduData> {
	/// index of the item in the slave's dictionnary of objects
	pub index: u16,
	/// subindex in the item
	pub sub: u8,
    /// this is only here to mark that T is actually used
	extracted: PhantomData<T>,
}
impl<T: PduData> Sdo<T> {
	/// address an sdo subitem
	pub const fn sub(index: u16, sub: u8) -> Self { Self{
		index,
		sub,
		extracted: PhantomData,
	}}
	/// byte size of the addressed value
	pub fn size(&self) -> usize {T::packed_size()}
}
impl<T: PduData> fmt::Debug for Sdo<T> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Sdo {{index: {:#x}, sub: {:?}}}", self.index, self.sub)
	}
}
// [Clone] and [Copy] must be implemented manually to allow copying an sdo pointing to a type which does not implement this operation
impl<T: PduData> Clone for Sdo<T> {
    fn clone(&self) -> Self   {Self{index: self.index, sub: self.sub, extracted: PhantomData}}
}
impl<T: PduData> Copy for Sdo<T> {}
impl<T: PduData> PartialEq for Sdo<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.sub == other.sub
    }
}


/// description of SDO assigning PDOs to a sync manager
/// the SDO is assumed to follow the cia402 specifications for sync manager SDOs
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct SyncAssignment {
	/// index of the SDO that configures the sync manager
	pub index: u16,
	/// max number of PDO that can be assigned to the sync manager
	pub num: u8,
}
impl SyncAssignment {
	/// subitem holding the number of assigned PDOs
	pub fn len(&self) -> Sdo<u8> {Sdo::sub(self.index, 0)}
	/// subitem holding the index of the PDO at the given position
	pub fn slot(&self, i: u8) -> Sdo<u16> {
		assert!(i < self.num, "slot beyond sync manager capacity");
		Sdo::sub(self.index, i+1)
	}
}
impl fmt::Debug for SyncAssignment {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "SyncAssignment {{index: {:#x}, num: {}}}", self.index, self.num)
	}
}


/// sync manager assignment objects
#[allow(non_upper_case_globals)]
pub mod pdo_assignment {
	use super::*;

	/// PDOs received by the drive (master outputs)
	pub const rx: SyncAssignment = SyncAssignment {index: 0x1c12, num: 8};
	/// PDOs transmitted by the drive (master inputs)
	pub const tx: SyncAssignment = SyncAssignment {index: 0x1c13, num: 8};
}

/// standard objects of a CiA 402 servodrive used by this driver
#[allow(non_upper_case_globals)]
pub mod cia402 {
	use super::*;
	use crate::cia402::{StatusWord, ControlWord};

	pub const error_code: Sdo<u16> = Sdo::sub(0x603f, 0);
	pub const controlword: Sdo<ControlWord> = Sdo::sub(0x6040, 0);
	pub const statusword: Sdo<StatusWord> = Sdo::sub(0x6041, 0);
	pub const mode_of_operation: Sdo<i8> = Sdo::sub(0x6060, 0);
	/// maximum current, mA
	pub const max_current: Sdo<u16> = Sdo::sub(0x6073, 0);
	/// motor rated current, mA
	pub const motor_rated_current: Sdo<u32> = Sdo::sub(0x6075, 0);
	/// motor rated torque, same unit as rated current since torque is handled by this driver
	pub const motor_rated_torque: Sdo<u32> = Sdo::sub(0x6076, 0);
}


/// abort code a drive answers an SDO request with
///
/// ETG.1000.6 table 41
#[bitsize(32)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SdoAbortCode {
    /// Toggle bit not changed
    BadToggle = 0x05_03_00_00,
    /// SDO protocol timeout
    Timeout = 0x05_04_00_00,
    /// Client/Server command specifier not valid or unknown
    UnsupportedCommand = 0x05_04_00_01,
    /// Out of memory
    OufOfMemory = 0x05_04_00_05,
    /// Unsupported access to an object, this is raised when trying to access a complete SDO when complete SDO access is not supported
    UnsupportedAccess = 0x06_01_00_00,
    /// Attempt to read to a write only object
    WriteOnly = 0x06_01_00_01,
    /// Attempt to write to a read only object
    ReadOnly = 0x06_01_00_02,
    /// Object mapped to RxPDO, SDO Download blocked
    LockedByPdo = 0x06_01_00_06,
    /// The object does not exist in the object directory
    InvalidIndex = 0x06_02_00_00,
    /// The object can not be mapped into the PDO
    CannotMap = 0x06_04_00_41,
    /// The number and length of the objects to be mapped would exceed the PDO length
    PdoTooSmall = 0x06_04_00_42,
    /// Access failed due to a hardware error
    HardwareError = 0x06_06_00_00,
    /// Data type does not match, length of service parameter does not match
    InvalidLength = 0x06_07_00_10,
    /// Subindex does not exist
    InvalidSubIndex = 0x06_09_00_11,
    /// Value range of parameter exceeded (only for write access)
    ValueOutOfRange = 0x06_09_00_30,
    /// Value of parameter written too high
    ValueTooHigh = 0x06_09_00_31,
    /// Value of parameter written too low
    ValueTooLow = 0x06_09_00_32,
    /// General error
    GeneralError = 0x08_00_00_00,
    /// Data cannot be transferred or stored to the application
    Refused = 0x08_00_00_20,
    /// Data cannot be transferred or stored to the application because of the present device state
    StateRefused = 0x08_00_00_22,
}

impl SdoAbortCode {
    pub fn object_related(self) -> bool   {u32::from(self) >> 24 == 0x06}
    pub fn subitem_related(self) -> bool  {u32::from(self) >> 16 == 0x06_09}
    pub fn mapping_related(self) -> bool  {u32::from(self) >> 16 == 0x06_04}
    pub fn device_related(self) -> bool   {u32::from(self) >> 24 == 0x08}
    pub fn protocol_related(self) -> bool {u32::from(self) >> 24 == 0x05}

    /// short description of the category of the abort, for diagnostics
    pub fn reason(self) -> &'static str {
        if self.mapping_related()  {"object cannot be mapped this way"}
        else if self.subitem_related()  {"value refused"}
        else if self.object_related()  {"object access refused"}
        else if self.device_related()  {"refused in the present drive state"}
        else if self.protocol_related()  {"mailbox protocol failure"}
        else  {"unknown abort"}
    }
}
