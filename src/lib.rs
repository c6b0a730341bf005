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

//! PT timer configurator.
//!
//! Reads and writes the configuration record of a model aircraft
//! competition timer over Bluetooth SPP.

pub mod bluetooth;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod record;
pub mod state;
pub mod storage;

pub use codec::{decode, encode, DecodedRecord, WritePacket};
pub use error::{CodecError, ConnectionError, EditError, TransportError, VerificationFailure};
pub use record::{ConfigurationRecord, Identity, IdentityMismatch, Tenths, TimerType};
