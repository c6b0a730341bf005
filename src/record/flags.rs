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

//! Settings bytes and their per-bit feature flags.
//!
//! The (byte, bit) mapping is fixed by the device firmware.

use serde::{Deserialize, Serialize};

/// Bits of the configuration byte (offset 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFlag {
    /// Hook tow switch reverse (F1B: motor switch reverse).
    Switch1Reverse,
    /// Hook latch switch reverse (unused on F1B).
    Switch2Reverse,
    RdtEnabled,
    TemperatureCorrection,
    /// Temperature sensor on the RDT module instead of S4.
    TemperatureSensorOnRdt,
    BeepOnTow,
    /// Keep the logger powered after DT (extended power).
    PowerDownDelay,
    /// Re-latch hook instead of a conventional hook.
    ReLatch,
}

impl ConfigFlag {
    pub const ALL: [ConfigFlag; 8] = [
        Self::Switch1Reverse,
        Self::Switch2Reverse,
        Self::RdtEnabled,
        Self::TemperatureCorrection,
        Self::TemperatureSensorOnRdt,
        Self::BeepOnTow,
        Self::PowerDownDelay,
        Self::ReLatch,
    ];

    pub fn mask(&self) -> u8 {
        match self {
            Self::Switch1Reverse => 1,
            Self::Switch2Reverse => 2,
            Self::RdtEnabled => 4,
            Self::TemperatureCorrection => 8,
            Self::TemperatureSensorOnRdt => 16,
            Self::BeepOnTow => 32,
            Self::PowerDownDelay => 64,
            Self::ReLatch => 128,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Switch1Reverse => "switch 1 reverse",
            Self::Switch2Reverse => "switch 2 reverse",
            Self::RdtEnabled => "RDT",
            Self::TemperatureCorrection => "temperature correction",
            Self::TemperatureSensorOnRdt => "temperature sensor on RDT",
            Self::BeepOnTow => "beep on tow",
            Self::PowerDownDelay => "DT power down delay",
            Self::ReLatch => "re-latch hook",
        }
    }
}

/// Bits of the servo settings byte (offset 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoFlag {
    Reversed1,
    Reversed2,
    Reversed3,
    Reversed4,
    NotInUse1,
    NotInUse2,
    NotInUse3,
    NotInUse4,
}

impl ServoFlag {
    /// Reverse flag for a 0-based servo index.
    pub fn reversed(servo: usize) -> Option<Self> {
        [
            Self::Reversed1,
            Self::Reversed2,
            Self::Reversed3,
            Self::Reversed4,
        ]
        .get(servo)
        .copied()
    }

    /// Not-in-use flag for a 0-based servo index.
    pub fn not_in_use(servo: usize) -> Option<Self> {
        [
            Self::NotInUse1,
            Self::NotInUse2,
            Self::NotInUse3,
            Self::NotInUse4,
        ]
        .get(servo)
        .copied()
    }

    pub fn mask(&self) -> u8 {
        match self {
            Self::Reversed1 => 1,
            Self::Reversed2 => 2,
            Self::Reversed3 => 4,
            Self::Reversed4 => 8,
            Self::NotInUse1 => 16,
            Self::NotInUse2 => 32,
            Self::NotInUse3 => 64,
            Self::NotInUse4 => 128,
        }
    }
}

/// Configuration settings byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationBits(pub u8);

impl ConfigurationBits {
    pub fn get(&self, flag: ConfigFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn with(self, flag: ConfigFlag, enabled: bool) -> Self {
        Self(apply(self.0, flag.mask(), enabled))
    }
}

/// Servo settings byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServoBits(pub u8);

impl ServoBits {
    pub fn get(&self, flag: ServoFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn with(self, flag: ServoFlag, enabled: bool) -> Self {
        Self(apply(self.0, flag.mask(), enabled))
    }
}

fn apply(byte: u8, mask: u8, enabled: bool) -> u8 {
    if enabled {
        byte | mask
    } else {
        byte & !mask
    }
}
