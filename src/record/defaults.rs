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

//! Factory default records per timer type.

use super::{ConfigurationBits, ConfigurationRecord, DataRow, ServoBits, Tenths, TimerType};
use crate::codec::layout::{DEVICE_ROW_CAPACITY, NAME_START_LIMIT, RESERVED_COUNT};

impl Default for ConfigurationRecord {
    fn default() -> Self {
        Self {
            model_type: TimerType::F1A.code(),
            model_id: 0,
            model_set: 0,
            configuration: ConfigurationBits(1),
            battery_warning_voltage: Tenths(72),
            number_of_data_rows: 8,
            servo_settings: ServoBits(1),
            default_temperature: 198,
            bunt_status: 0,
            startup_cycle_count: 0,
            servo_mid_position: [127; 4],
            servo_range: [127; 4],
            motor_run_time: [0; 2],
            servo_temperature_mid_position: [127; 4],
            servo_temperature_range: [127; 4],
            calibration_ms: 15,
            calibration_us: [1, 150],
            max_data_rows: DEVICE_ROW_CAPACITY as u8,
            name_start: NAME_START_LIMIT,
            max_skip_bunt_time: 80,
            min_skip_bunt_time: 0,
            skip_to_row: 8,
            power_down_delay: 0,
            reserved: [0; RESERVED_COUNT],
            rows: std::array::from_fn(|i| DataRow {
                time: Tenths(i as u16 * 10),
                servo: [125, 126, 127, 128],
                step: 0,
            }),
            model_name: "Default Name".to_string(),
            servo_labels: labels(["S1", "S2", "S3", "S4"]),
            row_labels: labels(["Row 1", "Row 2", "Row 3", "Row 4"]),
            firmware_version: "v2.1".to_string(),
            telemetry: None,
        }
    }
}

impl ConfigurationRecord {
    /// Create a fresh example record for a timer type.
    pub fn new_for(timer_type: TimerType) -> Self {
        let base = Self {
            model_type: timer_type.code(),
            configuration: ConfigurationBits(4),
            servo_settings: ServoBits(0),
            number_of_data_rows: 6,
            servo_labels: labels(["EL", "RD", "WW", "--"]),
            row_labels: labels(["DT   ", "ARM  ", "START", "     "]),
            ..Self::default()
        };

        match timer_type {
            TimerType::F1A => Self {
                model_name: "F1A Timer Example".to_string(),
                configuration: ConfigurationBits(37),
                number_of_data_rows: 8,
                row_labels: labels(["DT   ", "CIRC ", "FWD  ", "ACCEL"]),
                ..base
            },
            TimerType::F1B => Self {
                model_name: "F1B Timer Example".to_string(),
                ..base
            },
            TimerType::F1Q => Self {
                model_name: "F1Q Timer Example".to_string(),
                servo_labels: labels(["EL", "RD", "WW", "SC"]),
                ..base
            },
            TimerType::P30 => Self {
                model_name: "P-30 Timer Example".to_string(),
                servo_settings: ServoBits(224),
                number_of_data_rows: 5,
                max_data_rows: 7,
                name_start: 85,
                servo_labels: labels(["S1", "--", "--", "--"]),
                ..base
            },
            TimerType::E36 => Self {
                model_name: "E-36 Timer Example".to_string(),
                servo_settings: ServoBits(192),
                number_of_data_rows: 5,
                max_data_rows: 7,
                name_start: 85,
                servo_labels: labels(["SC", "S1", "--", "--"]),
                ..base
            },
        }
    }
}

fn labels<const N: usize>(values: [&str; N]) -> [String; N] {
    values.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record() {
        let record = ConfigurationRecord::default();
        assert_eq!(record.timer_type(), Some(TimerType::F1A));
        assert_eq!(record.battery_warning_voltage.to_string(), "7.2");
        assert_eq!(record.rows[3].time, Tenths(30));
        assert_eq!(record.active_rows().len(), 8);
        assert!(record.telemetry.is_none());
    }

    #[test]
    fn test_new_for_each_type() {
        let f1a = ConfigurationRecord::new_for(TimerType::F1A);
        assert_eq!(f1a.model_type, 2);
        assert!(f1a.is_rdt_enabled());
        assert!(f1a.is_beep_on_tow_enabled());
        assert!(f1a.is_switch1_reversed());
        assert_eq!(f1a.row_labels[1], "CIRC ");

        let f1b = ConfigurationRecord::new_for(TimerType::F1B);
        assert_eq!(f1b.model_type, 1);
        assert_eq!(f1b.number_of_data_rows, 6);
        assert_eq!(f1b.configuration, ConfigurationBits(4));

        let p30 = ConfigurationRecord::new_for(TimerType::P30);
        assert_eq!(p30.name_start, 85);
        assert_eq!(p30.max_data_rows, 7);
        assert!(!p30.is_servo_in_use(1));
        assert!(p30.is_servo_in_use(0));

        let e36 = ConfigurationRecord::new_for(TimerType::E36);
        assert!(e36.is_servo_in_use(1));
        assert!(!e36.is_servo_in_use(2));

        let f1q = ConfigurationRecord::new_for(TimerType::F1Q);
        assert_eq!(f1q.servo_labels[3], "SC");
    }
}
