//! motion command staged by the application, in physical units

use crate::{
    cia402::OperationMode,
    units::{self, Factors},
    };


/**
    setpoints for the drive, in physical units

    - position in rad
    - velocity in rad/s
    - torques in N·m at the gearbox output
    - current in A on the motor side

    Target torque and target current drive the same setpoint of the drive and add up.

    The command is converted to drive integers when staged with [crate::Drive::stage_command], using the calibration of that drive.
*/
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Command {
    pub target_position: f64,
    pub target_velocity: f64,
    pub target_torque: f64,
    pub target_current: f64,
    /// torque saturation, defaults to the torque reachable with the configured maximum current
    pub max_torque: Option<f64>,
    pub torque_offset: f64,
    /// mode to switch to, only followed on drives configured for multiple modes of operation
    pub mode_of_operation: Option<OperationMode>,
}

/// setpoints converted to the drive integers, as they are sent in the rx record
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RawCommand {
    pub target_position: i32,
    pub target_velocity: i32,
    pub target_torque: i16,
    pub max_torque: u16,
    pub torque_offset: i16,
}

impl Command {
    /// convert to drive integers, `default_max_torque` applies when [Self::max_torque] is not set
    pub fn to_raw(&self, factors: &Factors, default_max_torque: f64) -> RawCommand {
        RawCommand {
            target_position: units::to_raw_i32(self.target_position, factors.position),
            target_velocity: units::to_raw_i32(self.target_velocity, factors.velocity),
            target_torque: units::to_raw_i16(
                self.target_torque * factors.torque + self.target_current * factors.current,
                1.),
            max_torque: units::to_raw_u16(self.max_torque.unwrap_or(default_max_torque), factors.torque),
            torque_offset: units::to_raw_i16(self.torque_offset, factors.torque),
        }
    }
}
