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

//! Timer protocol constants and tuning parameters.

use std::time::Duration;

/// Single-byte control signals understood by the timer firmware.
pub mod control {
    /// Sent while the device has nothing pending.
    pub const IDLE_PROBE: u8 = b'P';
    /// Sent while the device sits in its intermediate (one byte) state.
    pub const INTERMEDIATE_PROBE: u8 = b's';
    /// Announces that a data dump follows.
    pub const BEGIN_DUMP: u8 = b'D';
    /// Ends the session.
    pub const TERMINATE: u8 = b' ';

    /// Human readable name for logging.
    pub fn name(byte: u8) -> &'static str {
        match byte {
            IDLE_PROBE => "idle probe",
            INTERMEDIATE_PROBE => "intermediate probe",
            BEGIN_DUMP => "begin dump",
            TERMINATE => "terminate",
            _ => "data",
        }
    }
}

/// Default per-byte write pacing in milliseconds.
pub const DEFAULT_WRITE_DELAY_MS: u64 = 100;

/// Pacing above this reports progress less often.
const SLOW_PACING: Duration = Duration::from_millis(200);

/// Timing budgets of the polling and verification loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTimings {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// Delay before and after the begin-dump marker.
    pub settle_delay: Duration,
    pub verify_interval: Duration,
    pub verify_attempts: u32,
}

impl Default for ProtocolTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            poll_attempts: 100,
            settle_delay: Duration::from_millis(1000),
            verify_interval: Duration::from_millis(500),
            verify_attempts: 20,
        }
    }
}

impl ProtocolTimings {
    /// All waits disabled. Budgets are kept.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            verify_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Per-byte pacing of the write sub-protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePacing {
    pub byte_delay: Duration,
}

impl WritePacing {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            byte_delay: Duration::from_millis(ms),
        }
    }

    /// Bytes between two progress reports.
    pub fn progress_interval(&self) -> usize {
        if self.byte_delay > SLOW_PACING {
            20
        } else {
            50
        }
    }
}

impl Default for WritePacing {
    fn default() -> Self {
        Self::from_millis(DEFAULT_WRITE_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_bytes_are_distinct() {
        let bytes = [
            control::IDLE_PROBE,
            control::INTERMEDIATE_PROBE,
            control::BEGIN_DUMP,
            control::TERMINATE,
        ];
        for (i, a) in bytes.iter().enumerate() {
            for b in &bytes[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(control::name(b'P'), "idle probe");
        assert_eq!(control::name(0x42), "data");
    }

    #[test]
    fn test_progress_interval_follows_pacing() {
        assert_eq!(WritePacing::from_millis(100).progress_interval(), 50);
        assert_eq!(WritePacing::from_millis(200).progress_interval(), 50);
        assert_eq!(WritePacing::from_millis(201).progress_interval(), 20);
        assert_eq!(WritePacing::from_millis(500).progress_interval(), 20);
    }

    #[test]
    fn test_default_timings() {
        let timings = ProtocolTimings::default();
        assert_eq!(timings.poll_attempts, 100);
        assert_eq!(timings.poll_interval * timings.poll_attempts, Duration::from_secs(20));
        assert_eq!(timings.verify_interval * timings.verify_attempts, Duration::from_secs(10));
        assert_eq!(ProtocolTimings::immediate().verify_attempts, 20);
    }
}
