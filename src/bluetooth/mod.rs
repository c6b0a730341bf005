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

//! Bluetooth communication module.
//!
//! Talks to the timer over an RFCOMM (SPP) stream.

mod connector;
mod link;
mod operation;
pub mod protocol;
mod session;

pub use connector::{BluetoothConnector, ConnectorSettings, DeviceConnector, PairedDevice, SPP_UUID};
pub use link::{RfcommLink, SerialLink};
pub use operation::{run_operation, spawn_operation, Confirmation, Operation, SessionEvent};
pub use protocol::{ProtocolTimings, WritePacing, DEFAULT_WRITE_DELAY_MS};
pub use session::{PendingWrite, SessionState, TransportSession, WriteReport, WriteStep};
