/*!
    calibration and behavior settings of a drive, and their loading from TOML

    ```toml
    motor_rated_current_a = 4.0       # optional, read from the drive when missing
    max_current_a = 8.0
    motor_constant = 0.12             # N·m/A
    gear_ratio = 50.0
    position_encoder_resolution = 16384
    rx_pdo_type = "Standard"          # "Standard", "CST" or "NA"
    tx_pdo_type = "Standard"
    mode_of_operation = 8             # CiA 402 code
    config_run_sdo_verify_timeout_us = 20000
    drive_state_change_min_timeout_us = 1000
    drive_state_change_max_timeout_us = 300000
    min_number_of_successful_target_state_readings = 10
    use_raw_commands = false
    use_multiple_modes_of_operation = false
    ```
*/

use crate::{
    cia402::OperationMode,
    pdo::{RxPdoType, TxPdoType},
    };
use core::time::Duration;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;


/// failure to obtain a usable [Configuration]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing configuration field `{0}`")]
    Missing(&'static str),
    #[error("invalid configuration field `{field}`: {reason}")]
    Invalid {field: &'static str, reason: &'static str},
}


/// settings of one drive
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    /// A, `None` until known, either from configuration or from the drive itself
    pub motor_rated_current_a: Option<f64>,
    /// A
    pub max_current_a: f64,
    /// N·m/A
    pub motor_constant: f64,
    pub gear_ratio: f64,
    /// encoder counts per turn
    pub position_encoder_resolution: u32,
    /// commands are given in drive integers instead of physical units
    pub use_raw_commands: bool,
    pub rx_pdo_type: RxPdoType,
    pub tx_pdo_type: TxPdoType,
    pub mode_of_operation: Option<OperationMode>,
    /// delay between the writing and the reading back of a configuration object, also between consecutive mapping writes
    pub config_run_sdo_verify_timeout: Duration,
    /// minimum dwell between two controlword changes on the cyclic path
    pub drive_state_change_min_timeout: Duration,
    /// maximum time waiting for a state requested on the cyclic path
    pub drive_state_change_max_timeout: Duration,
    /// consecutive readings of the target state needed to consider it reached
    pub min_number_of_successful_target_state_readings: u32,
    /// the mode of staged commands is followed, only possible with Standard records
    pub use_multiple_modes_of_operation: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            motor_rated_current_a: None,
            max_current_a: 0.,
            motor_constant: 1.,
            gear_ratio: 1.,
            position_encoder_resolution: 1,
            use_raw_commands: false,
            rx_pdo_type: RxPdoType::Na,
            tx_pdo_type: TxPdoType::Na,
            mode_of_operation: None,
            config_run_sdo_verify_timeout: Duration::from_millis(20),
            drive_state_change_min_timeout: Duration::from_millis(1),
            drive_state_change_max_timeout: Duration::from_millis(300),
            min_number_of_successful_target_state_readings: 10,
            use_multiple_modes_of_operation: false,
        }
    }
}

/// content of a configuration file, every field checked before becoming a [Configuration]
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigurationFile {
    motor_rated_current_a: Option<f64>,
    max_current_a: Option<f64>,
    motor_constant: Option<f64>,
    gear_ratio: Option<f64>,
    position_encoder_resolution: Option<u32>,
    #[serde(default)]
    use_raw_commands: bool,
    rx_pdo_type: Option<RxPdoType>,
    tx_pdo_type: Option<TxPdoType>,
    mode_of_operation: Option<u8>,
    config_run_sdo_verify_timeout_us: Option<u64>,
    drive_state_change_min_timeout_us: Option<u64>,
    drive_state_change_max_timeout_us: Option<u64>,
    min_number_of_successful_target_state_readings: Option<u32>,
    #[serde(default)]
    use_multiple_modes_of_operation: bool,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing(field))
}

impl Configuration {
    /// parse and validate a TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigurationFile = toml::from_str(content)?;
        let mode = required(file.mode_of_operation, "mode_of_operation")?;
        let config = Self {
            motor_rated_current_a: file.motor_rated_current_a.filter(|&rated| rated != 0.),
            max_current_a: required(file.max_current_a, "max_current_a")?,
            motor_constant: required(file.motor_constant, "motor_constant")?,
            gear_ratio: required(file.gear_ratio, "gear_ratio")?,
            position_encoder_resolution: required(file.position_encoder_resolution, "position_encoder_resolution")?,
            use_raw_commands: file.use_raw_commands,
            rx_pdo_type: required(file.rx_pdo_type, "rx_pdo_type")?,
            tx_pdo_type: required(file.tx_pdo_type, "tx_pdo_type")?,
            mode_of_operation: Some(OperationMode::try_from(mode).map_err(|_|
                ConfigError::Invalid {field: "mode_of_operation", reason: "not a CiA 402 mode of operation"})?),
            config_run_sdo_verify_timeout: Duration::from_micros(
                required(file.config_run_sdo_verify_timeout_us, "config_run_sdo_verify_timeout_us")?),
            drive_state_change_min_timeout: Duration::from_micros(
                required(file.drive_state_change_min_timeout_us, "drive_state_change_min_timeout_us")?),
            drive_state_change_max_timeout: Duration::from_micros(
                required(file.drive_state_change_max_timeout_us, "drive_state_change_max_timeout_us")?),
            min_number_of_successful_target_state_readings: required(
                file.min_number_of_successful_target_state_readings,
                "min_number_of_successful_target_state_readings")?,
            use_multiple_modes_of_operation: file.use_multiple_modes_of_operation,
        };
        config.validate()?;
        Ok(config)
    }

    /// read, parse and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// check the values are usable for unit conversion and state changes
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {field, reason})
        }
        if let Some(rated) = self.motor_rated_current_a {
            if ! (rated > 0.)  {return invalid("motor_rated_current_a", "must be positive")}
        }
        if ! (self.max_current_a > 0.)  {return invalid("max_current_a", "must be positive")}
        if ! (self.motor_constant > 0.)  {return invalid("motor_constant", "must be positive")}
        if ! (self.gear_ratio > 0.)  {return invalid("gear_ratio", "must be positive")}
        if self.position_encoder_resolution == 0
            {return invalid("position_encoder_resolution", "must be positive")}
        if self.drive_state_change_max_timeout < self.drive_state_change_min_timeout
            {return invalid("drive_state_change_max_timeout_us", "must not be below the minimum timeout")}
        if self.min_number_of_successful_target_state_readings == 0
            {return invalid("min_number_of_successful_target_state_readings", "must be at least 1")}
        Ok(())
    }

    /// N·m at the gearbox output reachable with the maximum current
    pub fn max_torque(&self) -> f64 {
        self.max_current_a * self.motor_constant * self.gear_ratio
    }

    /// mode changes from staged commands are followed only when permitted and both records carry the mode
    pub fn allows_mode_change(&self) -> bool {
        self.use_multiple_modes_of_operation
            && self.rx_pdo_type == RxPdoType::Standard
            && self.tx_pdo_type == TxPdoType::Standard
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = r#"
max_current_a = 8.0
motor_constant = 0.12
gear_ratio = 50.0
position_encoder_resolution = 16384
rx_pdo_type = "CST"
tx_pdo_type = "Standard"
mode_of_operation = 10
config_run_sdo_verify_timeout_us = 20000
drive_state_change_min_timeout_us = 1000
drive_state_change_max_timeout_us = 300000
min_number_of_successful_target_state_readings = 10
"#;

    #[test]
    fn parse_complete() {
        let config = Configuration::from_toml_str(COMPLETE).unwrap();
        assert_eq!(config.motor_rated_current_a, None);
        assert_eq!(config.rx_pdo_type, RxPdoType::Cst);
        assert_eq!(config.tx_pdo_type, TxPdoType::Standard);
        assert_eq!(config.mode_of_operation, Some(OperationMode::SynchronousTorque));
        assert_eq!(config.config_run_sdo_verify_timeout, Duration::from_millis(20));
        assert_eq!(config.drive_state_change_max_timeout, Duration::from_millis(300));
        assert!(! config.use_raw_commands);
        assert!(! config.allows_mode_change());
        assert!((config.max_torque() - 48.).abs() < 1e-9);
    }

    #[test]
    fn rated_current_is_optional() {
        let config = Configuration::from_toml_str(&format!("motor_rated_current_a = 4.5\n{}", COMPLETE)).unwrap();
        assert_eq!(config.motor_rated_current_a, Some(4.5));
    }

    #[test]
    fn missing_field() {
        let content = COMPLETE.replace("gear_ratio = 50.0\n", "");
        assert!(matches!(Configuration::from_toml_str(&content), Err(ConfigError::Missing("gear_ratio"))));
    }

    #[test]
    fn invalid_values() {
        let content = COMPLETE.replace("motor_constant = 0.12", "motor_constant = -1.0");
        assert!(matches!(
            Configuration::from_toml_str(&content),
            Err(ConfigError::Invalid {field: "motor_constant", ..})));
        let content = COMPLETE.replace("mode_of_operation = 10", "mode_of_operation = 5");
        assert!(matches!(
            Configuration::from_toml_str(&content),
            Err(ConfigError::Invalid {field: "mode_of_operation", ..})));
        let content = COMPLETE.replace("drive_state_change_max_timeout_us = 300000", "drive_state_change_max_timeout_us = 10");
        assert!(Configuration::from_toml_str(&content).is_err());
        let content = COMPLETE.replace("rx_pdo_type = \"CST\"", "rx_pdo_type = \"Fancy\"");
        assert!(matches!(Configuration::from_toml_str(&content), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn multiple_modes_need_standard_records() {
        let content = COMPLETE.replace("rx_pdo_type = \"CST\"", "rx_pdo_type = \"Standard\"");
        let content = format!("use_multiple_modes_of_operation = true\n{}", content);
        assert!(Configuration::from_toml_str(&content).unwrap().allows_mode_change());
    }

    #[test]
    fn missing_file() {
        assert!(matches!(Configuration::load("/nonexistent/drive.toml"), Err(ConfigError::Io(_))));
    }
}
