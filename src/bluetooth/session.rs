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

//! Timer protocol state machine.
//!
//! A session owns one open link for one read or write. It polls the
//! device until a full dump is available, then either decodes it (read)
//! or streams a new record and verifies the echo (write). Every path out
//! of the session sends the terminate byte and closes the link.

use std::fmt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::link::SerialLink;
use super::operation::SessionEvent;
use super::protocol::{control, ProtocolTimings, WritePacing};
use crate::codec::layout::{DUMP_FRAME_LEN, ECHO_FRAME_LEN};
use crate::codec::{self, DecodedRecord, WritePacket};
use crate::error::{TransportError, VerificationFailure};
use crate::record::{Identity, IdentityMismatch};

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Polling,
    Reading,
    Writing,
    AwaitingConfirmation,
    Verifying,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Polling => "polling",
            Self::Reading => "reading",
            Self::Writing => "writing",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Verifying => "verifying",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a verified write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub identity: Identity,
    pub bytes_written: usize,
}

/// Result of [`TransportSession::write`].
pub enum WriteStep<L: SerialLink> {
    Completed(WriteReport),
    /// The device holds a different record; the caller must decide.
    AwaitingConfirmation(PendingWrite<L>),
}

/// Write suspended on an identity mismatch.
///
/// The link stays open and untouched until [`confirm`](Self::confirm) or
/// [`cancel`](Self::cancel) is called.
pub struct PendingWrite<L: SerialLink> {
    session: TransportSession<L>,
    packet: WritePacket,
    pacing: WritePacing,
    mismatch: IdentityMismatch,
}

impl<L: SerialLink> PendingWrite<L> {
    pub fn mismatch(&self) -> &IdentityMismatch {
        &self.mismatch
    }

    /// Write anyway.
    pub async fn confirm(mut self) -> Result<WriteReport, TransportError> {
        info!("Overwrite confirmed ({})", self.mismatch.intended);
        let result = self
            .session
            .write_and_verify(&self.packet, self.pacing)
            .await;
        self.session.finish(result).await
    }

    /// Close the session without writing.
    pub async fn cancel(mut self) {
        info!("Write cancelled");
        self.session.terminate().await;
    }
}

/// One read or write against an open link.
pub struct TransportSession<L: SerialLink> {
    link: L,
    timings: ProtocolTimings,
    state: SessionState,
    events: Option<mpsc::Sender<SessionEvent>>,
}

impl<L: SerialLink> TransportSession<L> {
    pub fn new(link: L, timings: ProtocolTimings) -> Self {
        Self {
            link,
            timings,
            state: SessionState::Idle,
            events: None,
        }
    }

    /// Report state changes and write progress on `events`.
    pub fn with_events(mut self, events: mpsc::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read and decode the record currently on the device.
    pub async fn read(mut self) -> Result<DecodedRecord, TransportError> {
        let result = self.read_record().await;
        self.finish(result).await
    }

    /// Write `packet` if the device holds the same record identity.
    ///
    /// On an identity mismatch nothing is written and the session is
    /// handed back as a [`PendingWrite`].
    pub async fn write(
        mut self,
        packet: WritePacket,
        pacing: WritePacing,
    ) -> Result<WriteStep<L>, TransportError> {
        let current = match self.read_record().await {
            Ok(decoded) => decoded.record,
            Err(e) => return self.finish(Err(e)).await,
        };

        match IdentityMismatch::between(current.identity(), packet.identity()) {
            None => {
                info!("Model matches: {}", current.identity());
                let result = self.write_and_verify(&packet, pacing).await;
                self.finish(result).await.map(WriteStep::Completed)
            }
            Some(mismatch) => {
                warn!("{}", mismatch);
                self.set_state(SessionState::AwaitingConfirmation).await;
                Ok(WriteStep::AwaitingConfirmation(PendingWrite {
                    session: self,
                    packet,
                    pacing,
                    mismatch,
                }))
            }
        }
    }

    async fn read_record(&mut self) -> Result<DecodedRecord, TransportError> {
        let dump = self.poll_for_dump().await?;
        let decoded = codec::decode(&dump)?;
        info!(
            "Timer read: '{}' ({})",
            decoded.record.model_name,
            decoded.record.identity()
        );
        Ok(decoded)
    }

    /// Probe the device until it presents a full dump, then read it.
    async fn poll_for_dump(&mut self) -> Result<Vec<u8>, TransportError> {
        self.set_state(SessionState::Polling).await;
        let mut attempts = 0u32;

        loop {
            sleep(self.timings.poll_interval).await;
            let available = self.link.available().await?;
            debug!("Bytes available: {}", available);

            match available {
                0 => self.send_control(control::IDLE_PROBE).await?,
                1 => self.send_control(control::INTERMEDIATE_PROBE).await?,
                DUMP_FRAME_LEN => {
                    self.set_state(SessionState::Reading).await;
                    let mut dump = vec![0u8; DUMP_FRAME_LEN];
                    self.link.read_exact(&mut dump).await?;
                    return Ok(dump);
                }
                _ => {}
            }

            attempts += 1;
            if attempts > self.timings.poll_attempts {
                if available > 0 {
                    let mut discard = vec![0u8; available];
                    self.link.read_exact(&mut discard).await?;
                }
                error!(
                    "Timer communication failed after {} polls, {} bytes discarded",
                    attempts, available
                );
                return Err(TransportError::CommunicationTimeout {
                    attempts,
                    pending: available,
                });
            }
        }
    }

    async fn write_and_verify(
        &mut self,
        packet: &WritePacket,
        pacing: WritePacing,
    ) -> Result<WriteReport, TransportError> {
        self.set_state(SessionState::Writing).await;

        sleep(self.timings.settle_delay).await;
        self.send_control(control::BEGIN_DUMP).await?;
        sleep(self.timings.settle_delay).await;

        let bytes = packet.as_bytes();
        let total = bytes.len() - 1;
        let interval = pacing.progress_interval();
        info!(
            "Writing {} bytes, {:?} per byte",
            total, pacing.byte_delay
        );

        // offset 0 is reserved and never sent
        for (offset, &byte) in bytes.iter().enumerate().skip(1) {
            self.link.write_all(&[byte]).await?;
            self.link.flush().await?;
            if offset % interval == 0 {
                self.emit(SessionEvent::WriteProgress {
                    written: offset,
                    total,
                })
                .await;
            }
            sleep(pacing.byte_delay).await;
        }
        if total % interval != 0 {
            self.emit(SessionEvent::WriteProgress {
                written: total,
                total,
            })
            .await;
        }

        self.set_state(SessionState::Verifying).await;
        self.verify_echo(bytes).await?;

        info!("Write successful");
        Ok(WriteReport {
            identity: packet.identity(),
            bytes_written: total,
        })
    }

    /// Wait for the write echo and compare it to what was sent.
    async fn verify_echo(&mut self, sent: &[u8]) -> Result<(), TransportError> {
        for attempt in 1..=self.timings.verify_attempts {
            sleep(self.timings.verify_interval).await;
            let available = self.link.available().await?;
            debug!("{}, bytes available after write: {}", attempt, available);
            if available == ECHO_FRAME_LEN {
                break;
            }
        }

        let available = self.link.available().await?;
        if available != ECHO_FRAME_LEN {
            error!("Write verification failed, only {} bytes available", available);
            return Err(VerificationFailure::IncompleteEcho { available }.into());
        }

        let mut echo = vec![0u8; ECHO_FRAME_LEN];
        self.link.read_exact(&mut echo).await?;

        for offset in 1..sent.len() {
            if echo[offset] != sent[offset] {
                error!(
                    "Write verification mismatch at offset {}: sent {}, echoed {}",
                    offset, sent[offset], echo[offset]
                );
                return Err(VerificationFailure::Mismatch {
                    offset,
                    expected: sent[offset],
                    actual: echo[offset],
                }
                .into());
            }
        }
        Ok(())
    }

    async fn send_control(&mut self, byte: u8) -> Result<(), TransportError> {
        debug!("Sending {} ({:?})", control::name(byte), byte as char);
        self.link.write_all(&[byte]).await?;
        self.link.flush().await?;
        Ok(())
    }

    /// Terminate, then pass `result` through.
    async fn finish<T>(&mut self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if let Err(ref e) = result {
            error!("Session failed: {}", e);
        }
        self.terminate().await;
        result
    }

    /// Best effort: send the terminate byte and close the link.
    async fn terminate(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if let Err(e) = self.send_control(control::TERMINATE).await {
            warn!("Could not send terminate byte: {}", e);
        }
        if let Err(e) = self.link.close().await {
            error!("Could not close the link: {}", e);
        }
        self.set_state(SessionState::Closed).await;
    }

    async fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state: {} -> {}", self.state, state);
            self.state = state;
            self.emit(SessionEvent::StateChanged(state)).await;
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}
