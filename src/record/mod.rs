// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Timer configuration record.
//!
//! The decoded view of the device's 262-byte record. Values are kept in
//! their wire representation (raw bytes, integer tenths, settings bytes)
//! so that encoding is an exact inverse of decoding.

mod defaults;
mod edit;
mod flags;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::codec::layout::{DEVICE_ROW_CAPACITY, RESERVED_COUNT};

pub use flags::{ConfigFlag, ConfigurationBits, ServoBits, ServoFlag};

/// Number of servo channels on the timer.
pub const SERVO_COUNT: usize = 4;

/// Model type codes that older firmware used for unsupported programs.
pub const LEGACY_MODEL_TYPES: [u8; 3] = [3, 4, 6];

/// Timer (model class) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerType {
    F1B = 1,
    F1A = 2,
    P30 = 3,
    E36 = 4,
    F1Q = 5,
}

impl TimerType {
    /// Parse from the wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::F1B),
            2 => Some(Self::F1A),
            3 => Some(Self::P30),
            4 => Some(Self::E36),
            5 => Some(Self::F1Q),
            _ => None,
        }
    }

    /// Parse from a user supplied name such as "f1a" or "P-30".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "").as_str() {
            "F1B" => Some(Self::F1B),
            "F1A" => Some(Self::F1A),
            "P30" => Some(Self::P30),
            "E36" => Some(Self::E36),
            "F1Q" => Some(Self::F1Q),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F1B => "F1B",
            Self::F1A => "F1A",
            Self::P30 => "P-30",
            Self::E36 => "E-36",
            Self::F1Q => "F1Q",
        }
    }
}

/// Fixed-point value in tenths (e.g. seconds or volts).
///
/// Serialized as a decimal number so saved documents stay readable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tenths(pub u16);

impl Tenths {
    /// Convert a decimal value, rounding to the nearest tenth.
    pub fn from_f64(value: f64) -> Self {
        Self((value * 10.0).round().clamp(0.0, u16::MAX as f64) as u16)
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 10.0
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for Tenths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Tenths {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(Self::from_f64(value))
    }
}

/// One program row: time plus servo 1-4 positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRow {
    pub time: Tenths,
    pub servo: [u8; SERVO_COUNT],
    /// Step lines are not supported; decoded for the legacy warning only.
    #[serde(default)]
    pub step: u8,
}

/// Values the device appends after its record. Never written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Raw device units.
    pub battery_voltage: u8,
    pub lowest_battery_voltage: u8,
    /// Kelvin + 100.
    pub temperature_raw: u8,
    /// Accumulated DT usage in seconds.
    pub dt_usage: u16,
}

impl Telemetry {
    pub fn temperature_celsius(&self) -> i16 {
        kelvin_plus_100_to_celsius(self.temperature_raw)
    }
}

/// Convert the device temperature encoding (Kelvin + 100) to Celsius.
pub fn kelvin_plus_100_to_celsius(raw: u8) -> i16 {
    i16::from(raw) + 100 - 273
}

/// Key used to detect that a write targets a different record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub model_type: u8,
    pub model_id: u8,
    pub model_set: u8,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type {} / id {} / set {}",
            self.model_type, self.model_id, self.model_set
        )
    }
}

/// Identity field names, for mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    ModelType,
    ModelId,
    ModelSet,
}

impl IdentityField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelType => "type",
            Self::ModelId => "id",
            Self::ModelSet => "set",
        }
    }
}

/// Device record and intended write differ in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMismatch {
    pub on_device: Identity,
    pub intended: Identity,
}

impl IdentityMismatch {
    /// Compare identities; `None` when they match.
    pub fn between(on_device: Identity, intended: Identity) -> Option<Self> {
        if on_device == intended {
            None
        } else {
            Some(Self {
                on_device,
                intended,
            })
        }
    }

    /// Differing fields with (device, intended) values.
    pub fn differences(&self) -> Vec<(IdentityField, u8, u8)> {
        let pairs = [
            (
                IdentityField::ModelType,
                self.on_device.model_type,
                self.intended.model_type,
            ),
            (
                IdentityField::ModelId,
                self.on_device.model_id,
                self.intended.model_id,
            ),
            (
                IdentityField::ModelSet,
                self.on_device.model_set,
                self.intended.model_set,
            ),
        ];
        pairs.into_iter().filter(|(_, a, b)| a != b).collect()
    }
}

impl fmt::Display for IdentityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model doesn't match:")?;
        for (field, device, intended) in self.differences() {
            write!(f, "\n{}: {} <> {}", field.as_str(), device, intended)?;
        }
        Ok(())
    }
}

/// Complete timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationRecord {
    pub model_type: u8,
    pub model_id: u8,
    pub model_set: u8,
    pub configuration: ConfigurationBits,
    pub battery_warning_voltage: Tenths,
    pub number_of_data_rows: u8,
    pub servo_settings: ServoBits,
    /// Kelvin + 100, used when the sensor gives no reading.
    pub default_temperature: u8,
    /// 1 = longer than maximum, 2 = shorter than minimum.
    pub bunt_status: u8,
    pub startup_cycle_count: u8,
    pub servo_mid_position: [u8; SERVO_COUNT],
    pub servo_range: [u8; SERVO_COUNT],
    pub motor_run_time: [u8; 2],
    pub servo_temperature_mid_position: [u8; SERVO_COUNT],
    pub servo_temperature_range: [u8; SERVO_COUNT],
    pub calibration_ms: u8,
    pub calibration_us: [u8; 2],
    pub max_data_rows: u8,
    /// Offset where the model name starts on the wire.
    pub name_start: u8,
    /// Tenths of a second.
    pub max_skip_bunt_time: u8,
    /// Tenths of a second; 0 never skips.
    pub min_skip_bunt_time: u8,
    pub skip_to_row: u8,
    pub power_down_delay: u8,
    /// Reserved bytes 29, 30, 40 and 229-231, written back as read.
    pub reserved: [u8; RESERVED_COUNT],
    pub rows: [DataRow; DEVICE_ROW_CAPACITY],
    pub model_name: String,
    pub servo_labels: [String; SERVO_COUNT],
    pub row_labels: [String; 4],
    pub firmware_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
}

impl ConfigurationRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            model_type: self.model_type,
            model_id: self.model_id,
            model_set: self.model_set,
        }
    }

    /// Model name without the trailing padding some firmware stores.
    pub fn display_name(&self) -> &str {
        self.model_name.trim_end()
    }

    pub fn timer_type(&self) -> Option<TimerType> {
        TimerType::from_code(self.model_type)
    }

    pub fn is_legacy_model_type(&self) -> bool {
        LEGACY_MODEL_TYPES.contains(&self.model_type)
    }

    pub fn default_temperature_celsius(&self) -> i16 {
        kelvin_plus_100_to_celsius(self.default_temperature)
    }

    /// Rows the program actually uses.
    pub fn active_rows(&self) -> &[DataRow] {
        let count = usize::from(self.number_of_data_rows).min(DEVICE_ROW_CAPACITY);
        &self.rows[..count]
    }

    pub fn config_flag(&self, flag: ConfigFlag) -> bool {
        self.configuration.get(flag)
    }

    pub fn servo_flag(&self, flag: ServoFlag) -> bool {
        self.servo_settings.get(flag)
    }

    pub fn is_switch1_reversed(&self) -> bool {
        self.config_flag(ConfigFlag::Switch1Reverse)
    }

    pub fn is_switch2_reversed(&self) -> bool {
        self.config_flag(ConfigFlag::Switch2Reverse)
    }

    pub fn is_rdt_enabled(&self) -> bool {
        self.config_flag(ConfigFlag::RdtEnabled)
    }

    pub fn is_beep_on_tow_enabled(&self) -> bool {
        self.config_flag(ConfigFlag::BeepOnTow)
    }

    pub fn is_power_down_delay_enabled(&self) -> bool {
        self.config_flag(ConfigFlag::PowerDownDelay)
    }

    pub fn is_relatch_enabled(&self) -> bool {
        self.config_flag(ConfigFlag::ReLatch)
    }

    /// `servo` is 0-based.
    pub fn is_servo_reversed(&self, servo: usize) -> bool {
        ServoFlag::reversed(servo).is_some_and(|flag| self.servo_flag(flag))
    }

    /// `servo` is 0-based.
    pub fn is_servo_in_use(&self, servo: usize) -> bool {
        ServoFlag::not_in_use(servo).is_some_and(|flag| !self.servo_flag(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_type_parse() {
        assert_eq!(TimerType::parse("f1a"), Some(TimerType::F1A));
        assert_eq!(TimerType::parse("P-30"), Some(TimerType::P30));
        assert_eq!(TimerType::parse("e36"), Some(TimerType::E36));
        assert_eq!(TimerType::parse("F2"), None);
        assert_eq!(TimerType::from_code(5), Some(TimerType::F1Q));
        assert_eq!(TimerType::from_code(6), None);
    }

    #[test]
    fn test_tenths() {
        assert_eq!(Tenths::from_f64(7.2), Tenths(72));
        assert_eq!(Tenths::from_f64(0.3).as_f64(), 0.3);
        assert_eq!(Tenths(123).to_string(), "12.3");
        assert_eq!(Tenths::from_f64(-1.0), Tenths(0));
    }

    #[test]
    fn test_tenths_json_is_decimal() {
        let row = DataRow {
            time: Tenths(25),
            servo: [1, 2, 3, 4],
            step: 0,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"time\":2.5"));

        let parsed: DataRow = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn test_identity_mismatch_lists_only_differences() {
        let device = Identity {
            model_type: 2,
            model_id: 7,
            model_set: 0,
        };
        assert!(IdentityMismatch::between(device, device).is_none());

        let intended = Identity {
            model_set: 1,
            ..device
        };
        let mismatch = IdentityMismatch::between(device, intended).unwrap();
        assert_eq!(
            mismatch.differences(),
            vec![(IdentityField::ModelSet, 0, 1)]
        );

        let text = mismatch.to_string();
        assert!(text.contains("set: 0 <> 1"));
        assert!(!text.contains("type:"));
        assert!(!text.contains("id:"));
    }

    #[test]
    fn test_temperature_conversion() {
        assert_eq!(kelvin_plus_100_to_celsius(200), 27);
        assert_eq!(kelvin_plus_100_to_celsius(173), 0);
        assert_eq!(kelvin_plus_100_to_celsius(0), -173);
    }

    #[test]
    fn test_servo_accessors() {
        let record = ConfigurationRecord {
            servo_settings: ServoBits(0b0100_0010),
            ..ConfigurationRecord::default()
        };
        assert!(record.is_servo_reversed(1));
        assert!(!record.is_servo_reversed(0));
        assert!(!record.is_servo_in_use(2));
        assert!(record.is_servo_in_use(3));
        assert!(!record.is_servo_in_use(9));
    }
}
