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

//! Event processing for timer sessions.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bluetooth::{Confirmation, SessionEvent};
use crate::record::IdentityMismatch;
use crate::state::AppState;
use crate::storage::RecordLibrary;

/// Asks the user whether to overwrite a different record.
pub trait ConfirmationPrompt: Send {
    fn confirm(&self, mismatch: &IdentityMismatch) -> bool;
}

/// Applies session events to the application state.
pub struct EventProcessor {
    state: Arc<AppState>,
    prompt: Box<dyn ConfirmationPrompt>,
    autosave: Option<RecordLibrary>,
}

impl EventProcessor {
    /// Create a new event processor.
    pub fn new(state: Arc<AppState>, prompt: Box<dyn ConfirmationPrompt>) -> Self {
        Self {
            state,
            prompt,
            autosave: None,
        }
    }

    /// Save every record read from the timer to `library`.
    pub fn with_autosave(mut self, library: RecordLibrary) -> Self {
        self.autosave = Some(library);
        self
    }

    /// Process a single event. Returns true once the operation is over.
    pub fn process_event(&mut self, event: SessionEvent) -> bool {
        let terminal = event.is_terminal();

        match event {
            SessionEvent::StateChanged(session_state) => {
                debug!("Session {}", session_state);
                self.state.set_session_state(session_state);
            }
            SessionEvent::WriteProgress { written, total } => {
                info!("Writing {}/{}", written, total);
            }
            SessionEvent::ConfirmationRequired { mismatch, reply } => {
                warn!("Warning: {}", mismatch);
                let answer = if self.prompt.confirm(&mismatch) {
                    Confirmation::Confirm
                } else {
                    Confirmation::Cancel
                };
                if reply.send(answer).is_err() {
                    error!("Session ended before the confirmation was delivered");
                }
            }
            SessionEvent::RecordRead {
                record,
                needs_legacy_warning,
            } => {
                info!("Timer read: {}", record.display_name());
                if needs_legacy_warning {
                    warn!("Old data format, some settings are not supported. Check before writing.");
                }
                if let Some(library) = &self.autosave {
                    if let Err(e) = library.save(&record) {
                        error!("Failed to save record: {:#}", e);
                    }
                }
                self.state.set_record(record, needs_legacy_warning);
                self.state.clear_error();
            }
            SessionEvent::WriteVerified(report) => {
                info!(
                    "Write successful: {} bytes ({})",
                    report.bytes_written, report.identity
                );
                self.state.clear_error();
            }
            SessionEvent::WriteCancelled => {
                info!("Write cancelled, timer unchanged");
            }
            SessionEvent::Failed(e) => {
                error!("ERROR: {}", e);
                self.state.set_error(e.to_string());
            }
        }

        terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::SessionState;
    use crate::error::{TransportError, VerificationFailure};
    use crate::record::{ConfigurationRecord, Identity, TimerType};
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    struct FixedAnswer(bool);

    impl ConfirmationPrompt for FixedAnswer {
        fn confirm(&self, _mismatch: &IdentityMismatch) -> bool {
            self.0
        }
    }

    fn processor(answer: bool) -> (Arc<AppState>, EventProcessor) {
        let state = AppState::new();
        let processor = EventProcessor::new(state.clone(), Box::new(FixedAnswer(answer)));
        (state, processor)
    }

    fn mismatch() -> IdentityMismatch {
        let device = Identity {
            model_type: 2,
            model_id: 1,
            model_set: 0,
        };
        IdentityMismatch {
            on_device: device,
            intended: Identity {
                model_id: 2,
                ..device
            },
        }
    }

    #[test]
    fn test_record_read_replaces_buffer() {
        let (state, mut processor) = processor(false);
        let record = ConfigurationRecord::new_for(TimerType::P30);

        let done = processor.process_event(SessionEvent::RecordRead {
            record: record.clone(),
            needs_legacy_warning: true,
        });

        assert!(done);
        assert_eq!(state.get_record(), record);
        assert!(state.needs_legacy_warning());
    }

    #[test]
    fn test_failure_is_recorded() {
        let (state, mut processor) = processor(false);
        processor.process_event(SessionEvent::StateChanged(SessionState::Verifying));

        let done = processor.process_event(SessionEvent::Failed(
            TransportError::WriteVerification(VerificationFailure::Mismatch {
                offset: 5,
                expected: 100,
                actual: 99,
            }),
        ));

        assert!(done);
        assert_eq!(state.get_session_state(), SessionState::Verifying);
        assert!(state.get_last_error().unwrap().contains("offset 5"));
    }

    #[test]
    fn test_confirmation_answers() {
        for (answer, expected) in [(true, Confirmation::Confirm), (false, Confirmation::Cancel)] {
            let (_state, mut processor) = processor(answer);
            let (reply, mut rx) = oneshot::channel();

            let done = processor.process_event(SessionEvent::ConfirmationRequired {
                mismatch: mismatch(),
                reply,
            });

            assert!(!done);
            assert_eq!(rx.try_recv().unwrap(), expected);
        }
    }

    #[test]
    fn test_autosave() {
        let dir = TempDir::new().unwrap();
        let library = RecordLibrary::new(dir.path()).unwrap();
        let (_state, processor) = processor(false);
        let mut processor = processor.with_autosave(library.clone());

        processor.process_event(SessionEvent::RecordRead {
            record: ConfigurationRecord::new_for(TimerType::F1Q),
            needs_legacy_warning: false,
        });

        assert!(library.load("F1Q_Timer_Example.json").is_ok());
    }
}
