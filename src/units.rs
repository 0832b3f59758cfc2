//! conversion between physical units and the integers of the drive's dictionnary of objects

use crate::config::Configuration;
use core::f64::consts::TAU;


/**
    scale factors from physical units to drive integers, for one drive

    | quantity | physical unit | drive unit |
    |----------|---------------|------------|
    | position | rad           | encoder counts |
    | velocity | rad/s         | encoder counts/s |
    | current  | A             | ‰ of rated current |
    | torque   | N·m           | ‰ of rated current |
    | voltage  | V             | mV |

    A zero factor means the calibration is not known yet, every conversion through it then yields zero instead of an infinite or NaN value.
*/
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Factors {
    /// counts per rad
    pub position: f64,
    /// counts/s per rad/s
    pub velocity: f64,
    /// integer per A
    pub current: f64,
    /// integer per N·m
    pub torque: f64,
    /// integer per V
    pub voltage: f64,
}

impl Factors {
    /// factors of a drive calibrated by the given configuration
    pub fn new(config: &Configuration) -> Self {
        let position = f64::from(config.position_encoder_resolution) / TAU;
        let current = match config.motor_rated_current_a {
            Some(rated) if rated > 0. => 1000. / rated,
            _ => 0.,
        };
        let torque = current / config.motor_constant / config.gear_ratio;
        Self {
            position,
            velocity: position,
            current,
            torque: if torque.is_finite() {torque} else {0.},
            voltage: 1000.,
        }
    }
    /// identity factors, for applications already working with drive integers
    pub fn raw() -> Self {
        Self {position: 1., velocity: 1., current: 1., torque: 1., voltage: 1.}
    }
}

impl Default for Factors {
    fn default() -> Self {
        Self {position: 0., velocity: 0., current: 0., torque: 0., voltage: 0.}
    }
}

/// physical value to drive integer, rounded to nearest and saturated to the integer range
pub fn to_raw_i32(value: f64, factor: f64) -> i32   {(value * factor).round() as i32}
/// physical value to drive integer, rounded to nearest and saturated to the integer range
pub fn to_raw_i16(value: f64, factor: f64) -> i16   {(value * factor).round() as i16}
/// physical value to drive integer, rounded to nearest and saturated to the integer range
pub fn to_raw_u16(value: f64, factor: f64) -> u16   {(value * factor).round() as u16}

/// drive integer to physical value, zero when the factor is unknown
pub fn from_raw(raw: impl Into<f64>, factor: f64) -> f64 {
    if factor == 0.  {0.}
    else {raw.into() / factor}
}
