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

//! Application state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::SessionState;
use crate::record::ConfigurationRecord;

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// The record being edited.
    pub record: RwLock<ConfigurationRecord>,

    /// The last read used an unsupported format.
    pub legacy_warning: RwLock<bool>,

    /// State of the active session, if any.
    pub session_state: RwLock<SessionState>,

    /// Name of the selected timer.
    pub selected_device: RwLock<Option<String>>,

    /// Last reported failure.
    pub last_error: RwLock<Option<String>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            record: RwLock::new(ConfigurationRecord::default()),
            legacy_warning: RwLock::new(false),
            session_state: RwLock::new(SessionState::Idle),
            selected_device: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get_record(&self) -> ConfigurationRecord {
        self.record.read().clone()
    }

    /// Replace the edit buffer, e.g. after a read or a load.
    pub fn set_record(&self, record: ConfigurationRecord, legacy_warning: bool) {
        *self.record.write() = record;
        *self.legacy_warning.write() = legacy_warning;
    }

    /// Apply an edit to the buffer.
    pub fn update_record<F>(&self, edit: F)
    where
        F: FnOnce(ConfigurationRecord) -> ConfigurationRecord,
    {
        let mut guard = self.record.write();
        let current = std::mem::take(&mut *guard);
        *guard = edit(current);
    }

    /// Apply a fallible edit; the buffer is unchanged on error.
    pub fn try_update_record<F, E>(&self, edit: F) -> Result<(), E>
    where
        F: FnOnce(ConfigurationRecord) -> Result<ConfigurationRecord, E>,
    {
        let mut guard = self.record.write();
        *guard = edit(guard.clone())?;
        Ok(())
    }

    pub fn needs_legacy_warning(&self) -> bool {
        *self.legacy_warning.read()
    }

    pub fn set_session_state(&self, state: SessionState) {
        *self.session_state.write() = state;
    }

    pub fn get_session_state(&self) -> SessionState {
        *self.session_state.read()
    }

    pub fn set_selected_device(&self, name: Option<String>) {
        *self.selected_device.write() = name;
    }

    pub fn get_selected_device(&self) -> Option<String> {
        self.selected_device.read().clone()
    }

    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    pub fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditError;
    use crate::record::{Tenths, TimerType};

    #[test]
    fn test_update_record() {
        let state = AppState::new();
        state.update_record(|r| r.with_config_flag(crate::record::ConfigFlag::BeepOnTow, true));
        assert!(state.get_record().is_beep_on_tow_enabled());
    }

    #[test]
    fn test_failed_edit_keeps_buffer() {
        let state = AppState::new();
        state.set_record(ConfigurationRecord::new_for(TimerType::F1A), false);

        let result: Result<(), EditError> = state.try_update_record(|r| r.delete_row(2));
        assert_eq!(result, Err(EditError::ProtectedRow { row: 2 }));
        assert_eq!(state.get_record().number_of_data_rows, 8);

        state
            .try_update_record(|r| r.with_time(1, Tenths(12)))
            .unwrap();
        assert_eq!(state.get_record().rows[0].time, Tenths(12));
    }

    #[test]
    fn test_reads_are_copies() {
        let state = AppState::new();
        let mut copy = state.get_record();
        copy.model_name = "changed".to_string();
        assert_eq!(state.get_record().model_name, "Default Name");
    }
}
