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

//! Runs one read or write end to end and reports it as events.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::connector::DeviceConnector;
use super::protocol::{ProtocolTimings, WritePacing};
use super::session::{SessionState, TransportSession, WriteReport, WriteStep};
use crate::codec::WritePacket;
use crate::error::TransportError;
use crate::record::{ConfigurationRecord, IdentityMismatch};

/// What a session should do once connected.
#[derive(Debug, Clone)]
pub enum Operation {
    Read,
    Write {
        packet: WritePacket,
        pacing: WritePacing,
    },
}

/// Answer to a [`SessionEvent::ConfirmationRequired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirm,
    Cancel,
}

/// Events emitted while an operation runs.
#[derive(Debug)]
pub enum SessionEvent {
    StateChanged(SessionState),
    WriteProgress {
        written: usize,
        total: usize,
    },
    /// The device holds a different record. Dropping `reply` cancels.
    ConfirmationRequired {
        mismatch: IdentityMismatch,
        reply: oneshot::Sender<Confirmation>,
    },
    RecordRead {
        record: ConfigurationRecord,
        needs_legacy_warning: bool,
    },
    WriteVerified(WriteReport),
    WriteCancelled,
    Failed(TransportError),
}

impl SessionEvent {
    /// Whether this event ends the operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RecordRead { .. } | Self::WriteVerified(_) | Self::WriteCancelled | Self::Failed(_)
        )
    }
}

/// Connect, run `operation` and post exactly one terminal event.
pub async fn run_operation<C: DeviceConnector>(
    connector: &C,
    device: &str,
    connect_timeout: Duration,
    timings: ProtocolTimings,
    operation: Operation,
    events: mpsc::Sender<SessionEvent>,
) {
    let terminal = match execute(connector, device, connect_timeout, timings, operation, &events).await
    {
        Ok(event) => event,
        Err(e) => {
            error!("Operation failed: {}", e);
            SessionEvent::Failed(e)
        }
    };

    if events.send(terminal).await.is_err() {
        error!("Event receiver dropped before the operation finished");
    }
}

/// Run an operation on its own task.
pub fn spawn_operation<C>(
    connector: Arc<C>,
    device: String,
    connect_timeout: Duration,
    timings: ProtocolTimings,
    operation: Operation,
    events: mpsc::Sender<SessionEvent>,
) -> JoinHandle<()>
where
    C: DeviceConnector + 'static,
{
    tokio::spawn(async move {
        run_operation(
            connector.as_ref(),
            &device,
            connect_timeout,
            timings,
            operation,
            events,
        )
        .await;
    })
}

async fn execute<C: DeviceConnector>(
    connector: &C,
    device: &str,
    connect_timeout: Duration,
    timings: ProtocolTimings,
    operation: Operation,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<SessionEvent, TransportError> {
    let _ = events
        .send(SessionEvent::StateChanged(SessionState::Connecting))
        .await;

    let link = match connector.open(device, connect_timeout).await {
        Ok(link) => link,
        Err(e) => {
            let _ = events
                .send(SessionEvent::StateChanged(SessionState::Closed))
                .await;
            return Err(e.into());
        }
    };
    let session = TransportSession::new(link, timings).with_events(events.clone());

    match operation {
        Operation::Read => {
            let decoded = session.read().await?;
            Ok(SessionEvent::RecordRead {
                record: decoded.record,
                needs_legacy_warning: decoded.needs_legacy_warning,
            })
        }
        Operation::Write { packet, pacing } => match session.write(packet, pacing).await? {
            WriteStep::Completed(report) => Ok(SessionEvent::WriteVerified(report)),
            WriteStep::AwaitingConfirmation(pending) => {
                let (reply, answer) = oneshot::channel();
                let _ = events
                    .send(SessionEvent::ConfirmationRequired {
                        mismatch: pending.mismatch().clone(),
                        reply,
                    })
                    .await;

                match answer.await {
                    Ok(Confirmation::Confirm) => {
                        Ok(SessionEvent::WriteVerified(pending.confirm().await?))
                    }
                    Ok(Confirmation::Cancel) | Err(_) => {
                        info!("Overwrite declined");
                        pending.cancel().await;
                        Ok(SessionEvent::WriteCancelled)
                    }
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::session::tests::{dump_of, echo_of, ScriptedLink};
    use crate::codec;
    use crate::codec::layout::{DUMP_FRAME_LEN, ECHO_FRAME_LEN};
    use crate::error::ConnectionError;

    struct FakeConnector {
        link: ScriptedLink,
        devices: Vec<String>,
    }

    impl DeviceConnector for FakeConnector {
        type Link = ScriptedLink;

        async fn paired_device_names(&self) -> Result<Vec<String>, ConnectionError> {
            Ok(self.devices.clone())
        }

        async fn open(&self, name: &str, _timeout: Duration) -> Result<ScriptedLink, ConnectionError> {
            if name.is_empty() {
                return Err(ConnectionError::NoDeviceSelected);
            }
            if !self.devices.iter().any(|d| d == name) {
                return Err(ConnectionError::DeviceNotFound {
                    name: name.to_string(),
                    attempts: 1,
                });
            }
            Ok(self.link.clone())
        }
    }

    fn connector(link: &ScriptedLink) -> FakeConnector {
        FakeConnector {
            link: link.clone(),
            devices: vec!["PT-Timer".to_string()],
        }
    }

    async fn terminal_events(mut rx: mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut terminal = Vec::new();
        while let Some(event) = rx.recv().await {
            if event.is_terminal() {
                terminal.push(event);
            }
        }
        terminal
    }

    #[tokio::test]
    async fn test_read_posts_record() {
        let record = ConfigurationRecord::default();
        let link = ScriptedLink::new(&[DUMP_FRAME_LEN], vec![dump_of(&record)]);
        let (tx, rx) = mpsc::channel(64);

        run_operation(
            &connector(&link),
            "PT-Timer",
            Duration::from_secs(1),
            ProtocolTimings::immediate(),
            Operation::Read,
            tx,
        )
        .await;

        let terminal = terminal_events(rx).await;
        assert_eq!(terminal.len(), 1);
        let SessionEvent::RecordRead { record: read, .. } = &terminal[0] else {
            panic!("expected a record, got {:?}", terminal[0]);
        };
        assert_eq!(read.model_name, record.model_name);
    }

    #[tokio::test]
    async fn test_connection_failure_runs_no_protocol() {
        let link = ScriptedLink::new(&[0], vec![]);
        let (tx, rx) = mpsc::channel(64);

        run_operation(
            &connector(&link),
            "Other timer",
            Duration::from_secs(1),
            ProtocolTimings::immediate(),
            Operation::Read,
            tx,
        )
        .await;

        let terminal = terminal_events(rx).await;
        assert!(matches!(
            terminal.as_slice(),
            [SessionEvent::Failed(TransportError::Connection(
                ConnectionError::DeviceNotFound { .. }
            ))]
        ));
        assert!(link.written().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_round_trip() {
        let on_device = ConfigurationRecord::default();
        let intended = ConfigurationRecord {
            model_type: 1,
            ..on_device.clone()
        };
        let packet = codec::encode(&intended);
        let link = ScriptedLink::new(
            &[DUMP_FRAME_LEN, ECHO_FRAME_LEN, ECHO_FRAME_LEN],
            vec![dump_of(&on_device), echo_of(&packet)],
        );
        let (tx, mut rx) = mpsc::channel(64);

        let handle = spawn_operation(
            Arc::new(connector(&link)),
            "PT-Timer".to_string(),
            Duration::from_secs(1),
            ProtocolTimings::immediate(),
            Operation::Write {
                packet,
                pacing: WritePacing::from_millis(0),
            },
            tx,
        );

        let mut verified = None;
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::ConfirmationRequired { mismatch, reply } => {
                    assert_eq!(mismatch.intended.model_type, 1);
                    reply.send(Confirmation::Confirm).unwrap();
                }
                SessionEvent::WriteVerified(report) => verified = Some(report),
                SessionEvent::Failed(e) => panic!("write failed: {}", e),
                _ => {}
            }
        }
        handle.await.unwrap();

        assert_eq!(verified.unwrap().identity, intended.identity());
    }

    #[tokio::test]
    async fn test_dropped_reply_cancels() {
        let on_device = ConfigurationRecord::default();
        let intended = ConfigurationRecord {
            model_id: 9,
            ..on_device.clone()
        };
        let link = ScriptedLink::new(&[DUMP_FRAME_LEN], vec![dump_of(&on_device)]);
        let (tx, mut rx) = mpsc::channel(64);

        spawn_operation(
            Arc::new(connector(&link)),
            "PT-Timer".to_string(),
            Duration::from_secs(1),
            ProtocolTimings::immediate(),
            Operation::Write {
                packet: codec::encode(&intended),
                pacing: WritePacing::default(),
            },
            tx,
        );

        let mut cancelled = false;
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::ConfirmationRequired { reply, .. } => drop(reply),
                SessionEvent::WriteCancelled => cancelled = true,
                _ => {}
            }
        }

        assert!(cancelled);
        assert_eq!(link.written(), b" ");
        assert!(link.is_closed());
    }

    fn assert_task_safe<L: crate::bluetooth::SerialLink + 'static>() {
        fn shareable<T: Send + Sync>() {}
        shareable::<L>();
    }

    #[test]
    fn test_links_move_to_spawned_tasks() {
        assert_task_safe::<crate::bluetooth::RfcommLink>();
        assert_task_safe::<ScriptedLink>();
    }
}
