/*!
    interface of the ethercat master as seen by a drive driver

    The master owns the frame transport, the mailbox transport and the timing of the bus cycle. A [crate::Drive] only needs the few operations of [Bus], addressed to its own slave.
*/

use crate::{
    data::{PduData, Storage},
    sdo::{Sdo, SdoAbortCode},
    error::{BusError, BusResult},
    };
use core::time::Duration;


/// ethercat communication state of a slave (ETG.1000.6 table 9)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BusState {
    Init,
    PreOperational,
    Bootstrap,
    SafeOperational,
    Operational,
}

/// addressing informations of a mailbox (CoE SDO) request
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SdoRequest {
    /// index of the item in the slave's dictionnary of objects
    pub index: u16,
    /// subindex in the item
    pub sub: u8,
    /// complete access to the item starting from `sub`, instead of one subitem
    pub complete: bool,
    /// maximum time to wait for the slave's answer
    pub timeout: Duration,
}
impl SdoRequest {
    pub fn new<T: PduData>(sdo: &Sdo<T>, timeout: Duration) -> Self {
        Self {index: sdo.index, sub: sdo.sub, complete: false, timeout}
    }
}

/**
    operations a drive driver performs through the ethercat master

    All methods are blocking. Process data methods are cheap and meant to be called every bus cycle, mailbox methods take several bus cycles and shall not be called in a tight realtime section.

    Implementors are shared between the cyclic task and the application task, hence `Send + Sync`.
*/
pub trait Bus: Send + Sync {
    /// request a communication state for the given slave
    fn set_state(&self, slave: u16, state: BusState) -> BusResult;
    /// stage the outbound process data record (rx for the slave) for the next bus cycle
    fn write_rxpdo(&self, slave: u16, data: &[u8]) -> BusResult;
    /// copy the most recent inbound process data record (tx for the slave)
    fn read_txpdo(&self, slave: u16, data: &mut [u8]) -> BusResult;
    /// upload an SDO, return the number of bytes written in `data`
    fn sdo_read_slice(&self, slave: u16, request: SdoRequest, data: &mut [u8]) -> BusResult<usize, SdoAbortCode>;
    /// download an SDO
    fn sdo_write_slice(&self, slave: u16, request: SdoRequest, data: &[u8]) -> BusResult<(), SdoAbortCode>;
    /// byte sizes of the rx and tx process data records currently negotiated with the slave
    fn pdo_sizes(&self, slave: u16) -> (u16, u16);

    /// read an SDO of a known type
    fn sdo_read<T: PduData>(&self, slave: u16, sdo: &Sdo<T>, timeout: Duration) -> BusResult<T, SdoAbortCode>
    where Self: Sized
    {
        let mut data = T::Packed::zeroed();
        let size = self.sdo_read_slice(slave, SdoRequest::new(sdo, timeout), data.as_mut())?;
        if size < T::packed_size()
            {return Err(BusError::Protocol("slave answered with less data than expected"))}
        Ok(T::unpack(data.as_ref())?)
    }
    /// write an SDO of a known type
    fn sdo_write<T: PduData>(&self, slave: u16, sdo: &Sdo<T>, value: T, timeout: Duration) -> BusResult<(), SdoAbortCode>
    where Self: Sized
    {
        let mut data = T::Packed::zeroed();
        value.pack(data.as_mut())?;
        self.sdo_write_slice(slave, SdoRequest::new(sdo, timeout), data.as_ref())
    }
}
