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

//! Packet codec for the timer record.
//!
//! `decode` turns a 262-byte device dump into a [`ConfigurationRecord`];
//! `encode` produces the 253-byte writable body. Both use the offsets in
//! [`layout`], so every writable field round-trips except the step column
//! (always written as zero) and the receive-only telemetry. Bytes no field
//! owns, such as text past its terminator, are written as zero.

pub mod layout;

use std::ops::Range;
use tracing::{debug, warn};

use crate::error::CodecError;
use crate::record::{
    ConfigurationBits, ConfigurationRecord, DataRow, Identity, ServoBits, Telemetry, Tenths,
    SERVO_COUNT,
};
use layout::*;

/// Result of decoding a device dump.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub record: ConfigurationRecord,
    /// Advisory: the dump uses features or sizes this tool does not support.
    pub needs_legacy_warning: bool,
}

/// Encoded writable body, ready to stream to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePacket(Vec<u8>);

impl WritePacket {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identity tuple embedded in the packet.
    pub fn identity(&self) -> Identity {
        Identity {
            model_type: self.0[MODEL_TYPE],
            model_id: self.0[MODEL_ID],
            model_set: self.0[MODEL_SET],
        }
    }
}

/// Decode a full device dump.
pub fn decode(bytes: &[u8]) -> Result<DecodedRecord, CodecError> {
    if bytes.len() != DUMP_FRAME_LEN {
        return Err(CodecError::MalformedPacket {
            expected: DUMP_FRAME_LEN,
            actual: bytes.len(),
        });
    }

    let byte = |index: usize| bytes[index];
    let quad = |start: usize| -> [u8; SERVO_COUNT] {
        std::array::from_fn(|i| bytes[start + i])
    };
    let capacity = DEVICE_ROW_CAPACITY as u8;

    let rows: [DataRow; DEVICE_ROW_CAPACITY] = std::array::from_fn(|i| {
        let base = row_offset(i);
        DataRow {
            time: Tenths(word(bytes, base)),
            servo: quad(base + 2),
            step: byte(base + 6),
        }
    });

    let declared_rows = byte(DATA_ROWS);
    let declared_max_rows = byte(MAX_DATA_ROWS);
    let declared_name_start = byte(NAME_START);
    let steps_in_use = rows.iter().any(|row| row.step != 0);

    let record = ConfigurationRecord {
        model_type: byte(MODEL_TYPE),
        model_id: byte(MODEL_ID),
        model_set: byte(MODEL_SET),
        configuration: ConfigurationBits(byte(CONFIGURATION)),
        battery_warning_voltage: Tenths(u16::from(byte(BATTERY_WARNING))),
        number_of_data_rows: declared_rows.min(capacity),
        servo_settings: ServoBits(byte(SERVO_SETTINGS)),
        default_temperature: byte(DEFAULT_TEMPERATURE),
        bunt_status: byte(BUNT_STATUS),
        startup_cycle_count: byte(STARTUP_CYCLES),
        servo_mid_position: quad(SERVO_MID),
        servo_range: quad(SERVO_RANGE),
        motor_run_time: [byte(MOTOR_RUN_TIME), byte(MOTOR_RUN_TIME + 1)],
        servo_temperature_mid_position: quad(SERVO_TEMP_MID),
        servo_temperature_range: quad(SERVO_TEMP_RANGE),
        calibration_ms: byte(CALIBRATION_MS),
        calibration_us: [byte(CALIBRATION_US), byte(CALIBRATION_US + 1)],
        max_data_rows: declared_max_rows.min(capacity),
        name_start: declared_name_start.min(NAME_START_LIMIT),
        max_skip_bunt_time: byte(MAX_SKIP_BUNT),
        min_skip_bunt_time: byte(MIN_SKIP_BUNT),
        skip_to_row: byte(SKIP_TO_ROW),
        power_down_delay: byte(POWER_DOWN_DELAY),
        reserved: RESERVED.map(byte),
        rows,
        model_name: read_text(bytes, model_name(declared_name_start)),
        servo_labels: std::array::from_fn(|i| read_text(bytes, servo_label(i))),
        row_labels: std::array::from_fn(|i| read_text(bytes, row_label(i))),
        firmware_version: read_text(bytes, FIRMWARE_VERSION),
        telemetry: Some(Telemetry {
            battery_voltage: byte(BATTERY_VOLTAGE),
            lowest_battery_voltage: byte(LOWEST_BATTERY_VOLTAGE),
            temperature_raw: byte(TEMPERATURE),
            dt_usage: word(bytes, DT_USAGE) / 10,
        }),
    };

    let needs_legacy_warning = declared_rows > capacity
        || declared_max_rows > capacity
        || steps_in_use
        || record.is_legacy_model_type();

    if needs_legacy_warning {
        warn!(
            "Old data format: rows={}, max rows={}, steps in use={}, model type={}",
            declared_rows, declared_max_rows, steps_in_use, record.model_type
        );
    }
    if declared_name_start > NAME_START_LIMIT {
        debug!(
            "Name start {} clamped to {}",
            declared_name_start, NAME_START_LIMIT
        );
    }

    Ok(DecodedRecord {
        record,
        needs_legacy_warning,
    })
}

/// Encode the writable body of a record.
///
/// Values are not range-checked: each numeric field is narrowed to its
/// wire width.
pub fn encode(record: &ConfigurationRecord) -> WritePacket {
    let mut packet = vec![0u8; WRITE_BODY_LEN];

    packet[MODEL_TYPE] = record.model_type;
    packet[MODEL_ID] = record.model_id;
    packet[MODEL_SET] = record.model_set;
    packet[CONFIGURATION] = record.configuration.0;
    packet[BATTERY_WARNING] = record.battery_warning_voltage.raw() as u8;
    packet[DATA_ROWS] = record.number_of_data_rows;
    packet[SERVO_SETTINGS] = record.servo_settings.0;
    packet[DEFAULT_TEMPERATURE] = record.default_temperature;
    packet[BUNT_STATUS] = record.bunt_status;
    packet[STARTUP_CYCLES] = record.startup_cycle_count;
    packet[SERVO_MID..SERVO_MID + SERVO_COUNT].copy_from_slice(&record.servo_mid_position);
    packet[SERVO_RANGE..SERVO_RANGE + SERVO_COUNT].copy_from_slice(&record.servo_range);
    packet[MOTOR_RUN_TIME..MOTOR_RUN_TIME + 2].copy_from_slice(&record.motor_run_time);
    packet[SERVO_TEMP_MID..SERVO_TEMP_MID + SERVO_COUNT]
        .copy_from_slice(&record.servo_temperature_mid_position);
    packet[SERVO_TEMP_RANGE..SERVO_TEMP_RANGE + SERVO_COUNT]
        .copy_from_slice(&record.servo_temperature_range);
    packet[CALIBRATION_MS] = record.calibration_ms;
    packet[CALIBRATION_US..CALIBRATION_US + 2].copy_from_slice(&record.calibration_us);
    packet[MAX_DATA_ROWS] = record.max_data_rows;
    packet[NAME_START] = record.name_start;
    packet[MAX_SKIP_BUNT] = record.max_skip_bunt_time;
    packet[MIN_SKIP_BUNT] = record.min_skip_bunt_time;
    packet[SKIP_TO_ROW] = record.skip_to_row;
    packet[POWER_DOWN_DELAY] = record.power_down_delay;
    for (&offset, &value) in RESERVED.iter().zip(&record.reserved) {
        packet[offset] = value;
    }

    for (i, row) in record.rows.iter().enumerate() {
        let base = row_offset(i);
        packet[base..base + 2].copy_from_slice(&row.time.raw().to_be_bytes());
        packet[base + 2..base + 6].copy_from_slice(&row.servo);
        // step column is never written
    }

    // Text goes after the grid; a low name start overlays grid bytes.
    write_name(&mut packet, record);
    for (i, label) in record.servo_labels.iter().enumerate() {
        write_text(&mut packet, servo_label(i), label.as_bytes());
    }
    for (i, label) in record.row_labels.iter().enumerate() {
        write_text(&mut packet, row_label(i), label.as_bytes());
    }
    write_text(&mut packet, FIRMWARE_VERSION, record.firmware_version.as_bytes());

    WritePacket(packet)
}

/// Identity tuple of a raw dump, without a full decode.
pub fn dump_identity(bytes: &[u8]) -> Result<Identity, CodecError> {
    if bytes.len() != DUMP_FRAME_LEN {
        return Err(CodecError::MalformedPacket {
            expected: DUMP_FRAME_LEN,
            actual: bytes.len(),
        });
    }
    Ok(Identity {
        model_type: bytes[MODEL_TYPE],
        model_id: bytes[MODEL_ID],
        model_set: bytes[MODEL_SET],
    })
}

/// High byte first.
fn word(bytes: &[u8], start: usize) -> u16 {
    u16::from_be_bytes([bytes[start], bytes[start + 1]])
}

/// Text up to the first zero byte of the range.
fn read_text(bytes: &[u8], range: Range<usize>) -> String {
    let field = &bytes[range];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// The model name never overwrites the header, whatever its start offset.
fn write_name(packet: &mut [u8], record: &ConfigurationRecord) {
    let range = model_name(record.name_start);
    let name = record.model_name.as_bytes();
    let skip = GRID_START.saturating_sub(range.start);
    if skip == 0 || name.len() > skip {
        write_text(packet, range.start + skip..range.end, &name[skip..]);
    }
}

/// Copy text into its field, zero-terminated when shorter than the field
/// and silently truncated to the field width and the packet end. Bytes
/// past the terminator are left untouched.
fn write_text(packet: &mut [u8], range: Range<usize>, text: &[u8]) {
    let end = range.end.min(packet.len());
    if range.start >= end {
        return;
    }
    let field = &mut packet[range.start..end];
    let len = text.len().min(field.len());
    field[..len].copy_from_slice(&text[..len]);
    if let Some(terminator) = field.get_mut(len) {
        *terminator = 0;
    }
}
