// Board/channel assignments, physical constants and voltage limits
use std::path::Path;

use serde::Deserialize;

// Board numbers (as assigned in the vendor's board configuration utility)
pub const ENCODER_BOARD_NUM: i32 = 0; // PCI-QUAD04
pub const DAC_BOARD_NUM: i32 = 1; // USB-3101
pub const ADC_BOARD_NUM: i32 = 2; // USB-1408FS

// Channels on the physical boards
pub const MOTOR_1_CHANNEL: i32 = 0;
pub const MOTOR_2_CHANNEL: i32 = 1;
pub const LASER_1_CHANNEL: i32 = 0;
pub const LASER_2_CHANNEL: i32 = 1;
pub const ENCODER_1_CHANNEL: i32 = 1;
pub const ENCODER_2_CHANNEL: i32 = 2;

// Voltage limits (engineering volts)
pub const MOTOR_VOLTAGE_MAX: f64 = 10.0; // bipolar output range of the DAC
pub const MOTOR_VOLTAGE_ALLOWABLE: f64 = 5.0; // what the motors should see
pub const MOTOR_VOLTAGE_DEFAULT: f64 = 3.0;

// Physical constants
pub const PULLEY_RADIUS: f64 = 0.015; // meters
pub const ENCODER_COUNTS_PER_REVOLUTION: u32 = (1 << 16) - 1; // 16-bit counter

// Encoder polling frequency
pub const POLL_HZ: u32 = 60;

/// Errors raised while loading a settings file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Rig settings. Every field is optional in the TOML file and falls back to
/// the built-in constants above.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub encoder_board: i32,
    pub dac_board: i32,
    pub adc_board: i32,

    pub motor_1_channel: i32,
    pub motor_2_channel: i32,
    pub laser_1_channel: i32,
    pub laser_2_channel: i32,
    pub encoder_1_channel: i32,
    pub encoder_2_channel: i32,

    pub voltage_max: f64,
    pub voltage_allowable: f64,
    pub voltage_default: f64,

    pub pulley_radius: f64,
    pub encoder_counts_per_revolution: u32,

    pub poll_hz: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encoder_board: ENCODER_BOARD_NUM,
            dac_board: DAC_BOARD_NUM,
            adc_board: ADC_BOARD_NUM,
            motor_1_channel: MOTOR_1_CHANNEL,
            motor_2_channel: MOTOR_2_CHANNEL,
            laser_1_channel: LASER_1_CHANNEL,
            laser_2_channel: LASER_2_CHANNEL,
            encoder_1_channel: ENCODER_1_CHANNEL,
            encoder_2_channel: ENCODER_2_CHANNEL,
            voltage_max: MOTOR_VOLTAGE_MAX,
            voltage_allowable: MOTOR_VOLTAGE_ALLOWABLE,
            voltage_default: MOTOR_VOLTAGE_DEFAULT,
            pulley_radius: PULLEY_RADIUS,
            encoder_counts_per_revolution: ENCODER_COUNTS_PER_REVOLUTION,
            poll_hz: POLL_HZ,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse settings from TOML text and validate them
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.encoder_counts_per_revolution == 0 {
            return Err(ConfigError::Invalid {
                field: "encoder_counts_per_revolution",
                reason: "must be positive".to_string(),
            });
        }
        if self.poll_hz == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_hz",
                reason: "must be positive".to_string(),
            });
        }
        if self.voltage_allowable > self.voltage_max {
            return Err(ConfigError::Invalid {
                field: "voltage_allowable",
                reason: format!(
                    "{} V exceeds voltage_max of {} V",
                    self.voltage_allowable, self.voltage_max
                ),
            });
        }
        Ok(())
    }

    pub fn physical_constants(&self) -> PhysicalConstants {
        PhysicalConstants {
            pulley_radius: self.pulley_radius,
            encoder_counts_per_revolution: self.encoder_counts_per_revolution,
            voltage_max: self.voltage_max,
            voltage_allowable: self.voltage_allowable,
        }
    }

    pub fn motor_channels(&self) -> MotorChannels {
        MotorChannels {
            board: self.dac_board,
            motor_1: self.motor_1_channel,
            motor_2: self.motor_2_channel,
        }
    }

    pub fn encoder_channels(&self) -> EncoderChannels {
        EncoderChannels {
            board: self.encoder_board,
            encoder_1: self.encoder_1_channel,
            encoder_2: self.encoder_2_channel,
        }
    }
}

/// Immutable physical description of the rig
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalConstants {
    pub pulley_radius: f64,
    pub encoder_counts_per_revolution: u32,
    /// Bounds for callers; the motion layer never enforces them.
    pub voltage_max: f64,
    pub voltage_allowable: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Settings::default().physical_constants()
    }
}

/// DAC board and the two analog output channels driving the motors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorChannels {
    pub board: i32,
    pub motor_1: i32,
    pub motor_2: i32,
}

impl Default for MotorChannels {
    fn default() -> Self {
        Settings::default().motor_channels()
    }
}

/// Encoder board and the two counter channels wired to the motors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderChannels {
    pub board: i32,
    pub encoder_1: i32,
    pub encoder_2: i32,
}

impl Default for EncoderChannels {
    fn default() -> Self {
        Settings::default().encoder_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.dac_board, 1);
        assert_eq!(settings.encoder_counts_per_revolution, 65535);
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml(
            r#"
            dac_board = 3
            pulley_radius = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(settings.dac_board, 3);
        assert_eq!(settings.pulley_radius, 0.02);
        // untouched fields keep their defaults
        assert_eq!(settings.motor_2_channel, MOTOR_2_CHANNEL);
        assert_eq!(settings.motor_channels().board, 3);
    }

    #[test]
    fn test_zero_counts_per_revolution_rejected() {
        let err = Settings::from_toml("encoder_counts_per_revolution = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "encoder_counts_per_revolution",
                ..
            }
        ));
    }

    #[test]
    fn test_allowable_above_max_rejected() {
        let err = Settings::from_toml("voltage_allowable = 12.0").unwrap_err();
        assert!(err.to_string().contains("voltage_allowable"));
    }

    #[test]
    fn test_bad_toml() {
        let err = Settings::from_toml("dac_board = \"one\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load("/nonexistent/hframe.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
