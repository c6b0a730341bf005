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

//! Record edit transforms.
//!
//! Every edit consumes a record and returns the edited copy. Row numbers
//! are 1-based, matching the row numbers shown to the user and stored in
//! `skip_to_row`.

use tracing::debug;

use super::{ConfigFlag, ConfigurationRecord, ServoFlag, Tenths, TimerType, SERVO_COUNT};
use crate::codec::layout::DEVICE_ROW_CAPACITY;
use crate::error::EditError;

impl ConfigurationRecord {
    pub fn with_config_flag(mut self, flag: ConfigFlag, enabled: bool) -> Self {
        self.configuration = self.configuration.with(flag, enabled);
        self
    }

    pub fn with_servo_flag(mut self, flag: ServoFlag, enabled: bool) -> Self {
        self.servo_settings = self.servo_settings.with(flag, enabled);
        self
    }

    /// Set the time of `row`.
    pub fn with_time(mut self, row: usize, time: Tenths) -> Result<Self, EditError> {
        let index = self.row_index(row)?;
        self.rows[index].time = time;
        Ok(self)
    }

    /// Set the position of 1-based `servo` in `row`.
    pub fn with_servo_position(
        mut self,
        row: usize,
        servo: usize,
        value: u8,
    ) -> Result<Self, EditError> {
        let index = self.row_index(row)?;
        if !(1..=SERVO_COUNT).contains(&servo) {
            return Err(EditError::ServoOutOfRange { servo });
        }
        self.rows[index].servo[servo - 1] = value;
        Ok(self)
    }

    /// Insert a copy of `row` below it, shifting later rows down.
    pub fn insert_row(mut self, row: usize) -> Result<Self, EditError> {
        let rows = self.stored_rows();
        if row == 0 || row > rows {
            return Err(EditError::RowOutOfRange { row, rows });
        }
        if row <= self.protected_rows(RowEdit::Insert) {
            return Err(EditError::ProtectedRow { row });
        }
        if rows + 1 > DEVICE_ROW_CAPACITY {
            return Err(EditError::CapacityExceeded {
                capacity: DEVICE_ROW_CAPACITY,
            });
        }

        debug!("Inserting row {}", row);
        for i in (row - 1..rows).rev() {
            self.rows[i + 1] = self.rows[i];
        }
        self.number_of_data_rows = (rows + 1) as u8;
        if usize::from(self.skip_to_row) > row {
            self.skip_to_row = self.skip_to_row.saturating_add(1);
        }
        Ok(self)
    }

    /// Remove `row`, shifting later rows up.
    pub fn delete_row(mut self, row: usize) -> Result<Self, EditError> {
        let rows = self.stored_rows();
        if row == 0 || row > rows {
            return Err(EditError::RowOutOfRange { row, rows });
        }
        if row <= self.protected_rows(RowEdit::Delete) {
            return Err(EditError::ProtectedRow { row });
        }

        debug!("Deleting row {}", row);
        let remaining = rows - 1;
        for i in row - 1..remaining {
            self.rows[i] = self.rows[i + 1];
        }
        self.number_of_data_rows = remaining as u8;
        if usize::from(self.skip_to_row) > row {
            self.skip_to_row -= 1;
        }
        Ok(self)
    }

    /// Row count as far as the grid can hold it. Loaded documents are not
    /// clamped.
    fn stored_rows(&self) -> usize {
        usize::from(self.number_of_data_rows).min(DEVICE_ROW_CAPACITY)
    }

    fn row_index(&self, row: usize) -> Result<usize, EditError> {
        if row == 0 || row > DEVICE_ROW_CAPACITY {
            return Err(EditError::RowOutOfRange {
                row,
                rows: DEVICE_ROW_CAPACITY,
            });
        }
        Ok(row - 1)
    }

    /// Leading rows with a fixed meaning (DT, circle/arm, ...).
    fn protected_rows(&self, edit: RowEdit) -> usize {
        match (self.timer_type(), edit) {
            (Some(TimerType::F1A), RowEdit::Insert) => 3,
            (Some(TimerType::F1A), RowEdit::Delete) => 4,
            (Some(TimerType::F1B), RowEdit::Insert) => 2,
            (Some(TimerType::F1B), RowEdit::Delete) => 3,
            _ => 0,
        }
    }
}

#[derive(Clone, Copy)]
enum RowEdit {
    Insert,
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f1a() -> ConfigurationRecord {
        ConfigurationRecord::new_for(TimerType::F1A)
    }

    #[test]
    fn test_insert_row_shifts_down() {
        let record = f1a();
        let before = record.rows;
        let edited = record.insert_row(5).unwrap();

        assert_eq!(edited.number_of_data_rows, 9);
        assert_eq!(edited.rows[4], before[4]);
        assert_eq!(edited.rows[5], before[4]);
        assert_eq!(edited.rows[8], before[7]);
        // skip_to_row was 8, below the insert point
        assert_eq!(edited.skip_to_row, 9);
    }

    #[test]
    fn test_delete_row_shifts_up() {
        let record = f1a();
        let before = record.rows;
        let edited = record.delete_row(6).unwrap();

        assert_eq!(edited.number_of_data_rows, 7);
        assert_eq!(edited.rows[5], before[6]);
        assert_eq!(edited.rows[6], before[7]);
        assert_eq!(edited.skip_to_row, 7);
    }

    #[test]
    fn test_skip_row_untouched_above_edit() {
        let record = ConfigurationRecord {
            skip_to_row: 2,
            ..f1a()
        };
        let edited = record.delete_row(7).unwrap();
        assert_eq!(edited.skip_to_row, 2);
    }

    #[test]
    fn test_protected_rows() {
        assert_eq!(
            f1a().insert_row(3),
            Err(EditError::ProtectedRow { row: 3 })
        );
        assert_eq!(
            f1a().delete_row(4),
            Err(EditError::ProtectedRow { row: 4 })
        );
        assert!(f1a().insert_row(4).is_ok());

        let f1b = ConfigurationRecord::new_for(TimerType::F1B);
        assert!(f1b.clone().insert_row(2).is_err());
        assert!(f1b.clone().delete_row(3).is_err());
        assert!(f1b.delete_row(4).is_ok());

        // P-30 has no fixed rows
        let p30 = ConfigurationRecord::new_for(TimerType::P30);
        assert!(p30.delete_row(1).is_ok());
    }

    #[test]
    fn test_insert_at_capacity() {
        let record = ConfigurationRecord {
            number_of_data_rows: 16,
            ..f1a()
        };
        assert_eq!(
            record.insert_row(10),
            Err(EditError::CapacityExceeded { capacity: 16 })
        );
    }

    #[test]
    fn test_oversized_row_count_from_document() {
        let record: ConfigurationRecord =
            serde_json::from_str(r#"{"model_type": 5, "number_of_data_rows": 20}"#).unwrap();

        assert!(matches!(
            record.clone().delete_row(17),
            Err(EditError::RowOutOfRange { row: 17, rows: 16 })
        ));
        assert_eq!(
            record.clone().insert_row(16),
            Err(EditError::CapacityExceeded { capacity: 16 })
        );

        let edited = record.delete_row(16).unwrap();
        assert_eq!(edited.number_of_data_rows, 15);
    }

    #[test]
    fn test_insert_with_skip_row_at_max() {
        let record = ConfigurationRecord {
            skip_to_row: 255,
            ..f1a()
        };
        let edited = record.insert_row(5).unwrap();
        assert_eq!(edited.skip_to_row, 255);
        assert_eq!(edited.number_of_data_rows, 9);
    }

    #[test]
    fn test_row_out_of_range() {
        assert!(matches!(
            f1a().delete_row(9),
            Err(EditError::RowOutOfRange { row: 9, rows: 8 })
        ));
        assert!(f1a().with_time(0, Tenths(5)).is_err());
        assert!(f1a().with_time(17, Tenths(5)).is_err());
    }

    #[test]
    fn test_cell_edits() {
        let edited = f1a()
            .with_time(2, Tenths(35))
            .and_then(|r| r.with_servo_position(2, 4, 200))
            .unwrap();
        assert_eq!(edited.rows[1].time, Tenths(35));
        assert_eq!(edited.rows[1].servo[3], 200);

        assert_eq!(
            f1a().with_servo_position(1, 5, 0),
            Err(EditError::ServoOutOfRange { servo: 5 })
        );
    }

    #[test]
    fn test_flag_edits_are_pure() {
        let original = f1a();
        let edited = original
            .clone()
            .with_config_flag(ConfigFlag::RdtEnabled, false)
            .with_servo_flag(ServoFlag::Reversed2, true);
        assert!(original.is_rdt_enabled());
        assert!(!edited.is_rdt_enabled());
        assert!(edited.is_servo_reversed(1));
    }
}
