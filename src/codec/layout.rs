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

//! Byte offsets of the timer record.
//!
//! Offsets follow the device convention: offset 0 is reserved and never
//! transmitted, fields start at 1.

use std::ops::Range;

/// Full status + data dump produced by the device.
pub const DUMP_FRAME_LEN: usize = 262;

/// Echo returned by the device after a completed write.
pub const ECHO_FRAME_LEN: usize = 256;

/// Writable body (offsets 0..=252). Telemetry beyond it is receive-only.
pub const WRITE_BODY_LEN: usize = 253;

/// Number of program rows the device stores.
pub const DEVICE_ROW_CAPACITY: usize = 16;

/// Largest name start offset that keeps the name clear of the trailer fields.
pub const NAME_START_LIMIT: u8 = 160;

/// Last byte of the model name field (inclusive).
pub const NAME_END: usize = 220;

pub const MODEL_TYPE: usize = 1;
pub const MODEL_ID: usize = 2;
pub const MODEL_SET: usize = 3;
pub const CONFIGURATION: usize = 4;
pub const BATTERY_WARNING: usize = 5;
pub const DATA_ROWS: usize = 6;
pub const SERVO_SETTINGS: usize = 7;
pub const DEFAULT_TEMPERATURE: usize = 8;
pub const BUNT_STATUS: usize = 9;
pub const STARTUP_CYCLES: usize = 10;
pub const SERVO_MID: usize = 11;
pub const SERVO_RANGE: usize = 15;
pub const MOTOR_RUN_TIME: usize = 19;
pub const SERVO_TEMP_MID: usize = 21;
pub const SERVO_TEMP_RANGE: usize = 25;
pub const CALIBRATION_MS: usize = 31;
pub const CALIBRATION_US: usize = 32;
pub const MAX_DATA_ROWS: usize = 34;
pub const NAME_START: usize = 35;
pub const MAX_SKIP_BUNT: usize = 36;
pub const MIN_SKIP_BUNT: usize = 37;
pub const SKIP_TO_ROW: usize = 38;
pub const POWER_DOWN_DELAY: usize = 39;

/// Bytes with no assigned meaning, in record order.
pub const RESERVED: [usize; RESERVED_COUNT] = [29, 30, 40, 229, 230, 231];
pub const RESERVED_COUNT: usize = 6;

/// First grid byte; each row is time (2) + servo 1-4 (4) + step (1).
pub const GRID_START: usize = 41;
pub const ROW_STRIDE: usize = 7;

pub const SERVO_LABELS: usize = 221;
pub const SERVO_LABEL_WIDTH: usize = 2;
pub const ROW_LABELS: usize = 232;
pub const ROW_LABEL_WIDTH: usize = 5;
pub const FIRMWARE_VERSION: Range<usize> = 252..256;

// Telemetry, read only.
pub const BATTERY_VOLTAGE: usize = 257;
pub const LOWEST_BATTERY_VOLTAGE: usize = 258;
pub const TEMPERATURE: usize = 259;
pub const DT_USAGE: usize = 260;

/// Offset of the first byte of grid row `row` (0-based).
pub const fn row_offset(row: usize) -> usize {
    GRID_START + row * ROW_STRIDE
}

/// Byte range of servo label `servo` (0-based).
pub fn servo_label(servo: usize) -> Range<usize> {
    let start = SERVO_LABELS + servo * SERVO_LABEL_WIDTH;
    start..start + SERVO_LABEL_WIDTH
}

/// Byte range of row label `label` (0-based).
pub fn row_label(label: usize) -> Range<usize> {
    let start = ROW_LABELS + label * ROW_LABEL_WIDTH;
    start..start + ROW_LABEL_WIDTH
}

/// Byte range of the model name for a (clamped) start offset.
pub fn model_name(start: u8) -> Range<usize> {
    start.min(NAME_START_LIMIT) as usize..NAME_END + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_fits_before_name_limit() {
        let grid_end = row_offset(DEVICE_ROW_CAPACITY);
        assert_eq!(grid_end, 153);
        assert!(grid_end <= NAME_START_LIMIT as usize);
    }

    #[test]
    fn test_label_ranges() {
        assert_eq!(servo_label(0), 221..223);
        assert_eq!(servo_label(3), 227..229);
        assert_eq!(row_label(0), 232..237);
        assert_eq!(row_label(3), 247..252);
    }

    #[test]
    fn test_name_range_is_clamped() {
        assert_eq!(model_name(160), 160..221);
        assert_eq!(model_name(250), 160..221);
        assert_eq!(model_name(85), 85..221);
    }
}
