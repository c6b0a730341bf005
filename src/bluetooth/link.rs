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

//! Byte stream to the timer.
//!
//! The polling protocol needs to know how many bytes the device has sent
//! without consuming them. [`RfcommLink`] gets this by draining the socket
//! from a background task into a shared buffer.

use bluer::rfcomm::stream::{OwnedReadHalf, OwnedWriteHalf};
use bluer::rfcomm::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Exclusive byte stream used by one transport session.
///
/// Sessions run on spawned tasks and hold `&self` across awaits, so links
/// must be `Sync` as well as `Send`.
pub trait SerialLink: Send + Sync {
    /// Number of received bytes that can be read without waiting.
    fn available(&mut self) -> impl Future<Output = io::Result<usize>> + Send;

    /// Fill `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<()>> + Send;

    fn write_all(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Close the stream. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

#[derive(Default)]
struct Inbound {
    buffer: VecDeque<u8>,
    /// Set once the read half hit EOF or an error.
    closed: Option<(io::ErrorKind, String)>,
}

impl Inbound {
    fn closed_error(&self) -> Option<io::Error> {
        self.closed
            .as_ref()
            .map(|(kind, message)| io::Error::new(*kind, message.clone()))
    }
}

/// SPP link over a BlueZ RFCOMM socket.
pub struct RfcommLink {
    writer: Option<OwnedWriteHalf>,
    inbound: Arc<Mutex<Inbound>>,
    data_ready: Arc<Notify>,
    reader_task: JoinHandle<()>,
}

impl RfcommLink {
    /// Take ownership of a connected stream and start draining it.
    pub fn new(stream: Stream) -> Self {
        let (reader, writer) = stream.into_split();
        let inbound = Arc::new(Mutex::new(Inbound::default()));
        let data_ready = Arc::new(Notify::new());

        let reader_task = tokio::spawn(Self::read_loop(
            reader,
            inbound.clone(),
            data_ready.clone(),
        ));

        Self {
            writer: Some(writer),
            inbound,
            data_ready,
            reader_task,
        }
    }

    async fn read_loop(mut reader: OwnedReadHalf, inbound: Arc<Mutex<Inbound>>, ready: Arc<Notify>) {
        let mut chunk = [0u8; 512];

        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!("RFCOMM stream closed by remote");
                    inbound.lock().closed =
                        Some((io::ErrorKind::UnexpectedEof, "stream closed by device".into()));
                    break;
                }
                Ok(n) => {
                    inbound.lock().buffer.extend(&chunk[..n]);
                }
                Err(e) => {
                    warn!("RFCOMM read error: {}", e);
                    inbound.lock().closed = Some((e.kind(), e.to_string()));
                    break;
                }
            }
            ready.notify_one();
        }
        ready.notify_one();
    }

    fn writer(&mut self) -> io::Result<&mut OwnedWriteHalf> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "link closed"))
    }
}

impl SerialLink for RfcommLink {
    async fn available(&mut self) -> io::Result<usize> {
        let inbound = self.inbound.lock();
        if inbound.buffer.is_empty() {
            if let Some(e) = inbound.closed_error() {
                return Err(e);
            }
        }
        Ok(inbound.buffer.len())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        loop {
            {
                let mut inbound = self.inbound.lock();
                let wanted = buf.len();
                if inbound.buffer.len() >= wanted {
                    for (slot, byte) in buf.iter_mut().zip(inbound.buffer.drain(..wanted)) {
                        *slot = byte;
                    }
                    return Ok(());
                }
                if let Some(e) = inbound.closed_error() {
                    return Err(e);
                }
            }
            self.data_ready.notified().await;
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(bytes).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        self.reader_task.abort();
        writer.shutdown().await
    }
}

impl Drop for RfcommLink {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
