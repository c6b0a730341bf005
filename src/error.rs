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

//! Error types shared by the codec, the record editor and the transport.

use std::io;
use std::time::Duration;

/// Errors produced while decoding a device packet.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The wire buffer does not have the fixed dump size.
    #[error("malformed packet: expected {expected} bytes, got {actual}")]
    MalformedPacket { expected: usize, actual: usize },
}

/// Errors produced while establishing the Bluetooth stream.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// No device name was configured or supplied.
    #[error("no Bluetooth device selected")]
    NoDeviceSelected,

    /// The named device is not among the paired devices.
    #[error("device '{name}' not found in paired devices after {attempts} attempts")]
    DeviceNotFound { name: String, attempts: u32 },

    /// The RFCOMM connect did not finish in time.
    #[error("connection to '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// BlueZ reported an error (adapter missing, permission denied, ...).
    #[error("Bluetooth adapter error: {0}")]
    Adapter(#[from] bluer::Error),

    /// Socket level failure while connecting.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Reasons a write was not confirmed by the device echo.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    /// The echo never reached the expected size within the verify budget.
    #[error("write verification failed: only {available} bytes available")]
    IncompleteEcho { available: usize },

    /// The echo differs from what was sent.
    #[error("write verification failed at offset {offset}: expected {expected}, got {actual}")]
    Mismatch { offset: usize, expected: u8, actual: u8 },
}

/// Errors terminating a transport session.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Polling exhausted its attempt budget.
    #[error("timer communication timed out after {attempts} polls ({pending} bytes pending)")]
    CommunicationTimeout { attempts: u32, pending: usize },

    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// The device state after this error is undefined.
    #[error(transparent)]
    WriteVerification(#[from] VerificationFailure),

    #[error("stream I/O failure: {0}")]
    Io(#[from] io::Error),
}

/// Errors produced by record edit transforms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("row {row} is outside 1..={rows}")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("servo {servo} is outside 1..=4")]
    ServoOutOfRange { servo: usize },

    /// Leading rows of F1A/F1B programs have a fixed meaning.
    #[error("row {row} is protected for this timer type")]
    ProtectedRow { row: usize },

    #[error("cannot add more than {capacity} rows")]
    CapacityExceeded { capacity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_messages() {
        let err = TransportError::from(VerificationFailure::Mismatch {
            offset: 5,
            expected: 100,
            actual: 99,
        });
        assert_eq!(
            err.to_string(),
            "write verification failed at offset 5: expected 100, got 99"
        );

        let err = VerificationFailure::IncompleteEcho { available: 12 };
        assert!(err.to_string().contains("only 12 bytes"));
    }

    #[test]
    fn test_codec_message() {
        let err = CodecError::MalformedPacket {
            expected: 262,
            actual: 10,
        };
        assert_eq!(err.to_string(), "malformed packet: expected 262 bytes, got 10");
    }
}
