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

//! PT Timer command line configurator

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pt_timer::bluetooth::{spawn_operation, BluetoothConnector, Operation, WritePacing};
use pt_timer::config::Config;
use pt_timer::events::{ConfirmationPrompt, EventProcessor};
use pt_timer::record::{ConfigurationRecord, IdentityMismatch, TimerType};
use pt_timer::state::AppState;
use pt_timer::storage::RecordLibrary;

#[derive(Parser)]
#[command(name = "pt-timer", version, about = "Read and write PT competition timers over Bluetooth")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List paired Bluetooth devices
    Devices,
    /// Select the timer to talk to
    Select { name: String },
    /// Set the delay after each written byte
    SetDelay { ms: u64 },
    /// Read the record from the timer
    Read {
        /// Save the record to the library
        #[arg(long)]
        save: bool,
    },
    /// Write a record file (or library entry) to the timer
    Write {
        file: String,
        /// Override the configured per-byte delay
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Create a record for a timer type (F1A, F1B, F1Q, P-30, E-36)
    New {
        timer_type: String,
        /// Write to this path instead of the library
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List saved records
    List,
    /// Print a record file or library entry
    Show { file: String },
}

/// Asks on the terminal.
struct StdinPrompt;

impl ConfirmationPrompt for StdinPrompt {
    fn confirm(&self, mismatch: &IdentityMismatch) -> bool {
        println!("{}", mismatch);
        print!("Write anyway? [y/N] ");
        let _ = std::io::stdout().flush();

        // blocking read on a runtime worker
        tokio::task::block_in_place(|| read_answer(std::io::stdin().lock()))
    }
}

fn read_answer(mut input: impl BufRead) -> bool {
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "pt_timer=debug" } else { "pt_timer=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    // Load configuration
    let mut config = Config::load()?;
    let library = RecordLibrary::new(&config.records_dir())?;

    match cli.command {
        Command::Devices => {
            let connector = BluetoothConnector::new(config.bluetooth.connector_settings()).await?;
            for device in connector.paired_devices().await? {
                let marker = if device.name == config.bluetooth.selected_device {
                    "*"
                } else {
                    " "
                };
                println!("{} {}  {}", marker, device.address, device.name);
            }
        }
        Command::Select { name } => {
            config.bluetooth.selected_device = name;
            config.save()?;
            info!("Selected device: {}", config.bluetooth.selected_device);
        }
        Command::SetDelay { ms } => {
            config.transfer.write_delay_ms = ms;
            config.save()?;
            info!("Write delay set to {} ms", ms);
        }
        Command::Read { save } => {
            let state = AppState::new();
            let mut processor = EventProcessor::new(state.clone(), Box::new(StdinPrompt));
            if save {
                processor = processor.with_autosave(library.clone());
            }
            run_session(&config, &state, processor, Operation::Read).await?;
            print_record(&state.get_record(), state.needs_legacy_warning());
        }
        Command::Write { file, delay_ms } => {
            let record = open_record(&library, &file)?;
            let pacing = match delay_ms {
                Some(ms) => WritePacing::from_millis(ms),
                None => config.transfer.pacing(),
            };
            let state = AppState::new();
            state.set_record(record, false);
            let processor = EventProcessor::new(state.clone(), Box::new(StdinPrompt));
            let operation = Operation::Write {
                packet: pt_timer::encode(&state.get_record()),
                pacing,
            };
            run_session(&config, &state, processor, operation).await?;
        }
        Command::New { timer_type, out } => {
            let timer_type = TimerType::parse(&timer_type)
                .ok_or_else(|| anyhow!("unknown timer type: {}", timer_type))?;
            let record = ConfigurationRecord::new_for(timer_type);
            let path = match out {
                Some(path) => {
                    library.export(&record, &path)?;
                    path
                }
                None => library.save(&record)?,
            };
            println!("{}", path.display());
        }
        Command::List => {
            for entry in library.list()? {
                println!(
                    "{}  {}",
                    entry.modified.format("%Y-%m-%d %H:%M"),
                    entry.file_name
                );
            }
        }
        Command::Show { file } => {
            print_record(&open_record(&library, &file)?, false);
        }
    }

    Ok(())
}

/// Run one operation and apply its events until it ends.
async fn run_session(
    config: &Config,
    state: &Arc<AppState>,
    mut processor: EventProcessor,
    operation: Operation,
) -> Result<()> {
    let device = config.bluetooth.selected_device.clone();
    state.set_selected_device(Some(device.clone()));
    let connector = Arc::new(BluetoothConnector::new(config.bluetooth.connector_settings()).await?);

    let (tx, mut rx) = mpsc::channel(32);
    let handle = spawn_operation(
        connector,
        device,
        config.bluetooth.connect_timeout(),
        config.protocol.timings(),
        operation,
        tx,
    );

    while let Some(event) = rx.recv().await {
        if processor.process_event(event) {
            break;
        }
    }
    handle.await?;

    match state.get_last_error() {
        Some(e) => bail!(e),
        None => Ok(()),
    }
}

/// A path to a document, or the name of a library entry.
fn open_record(library: &RecordLibrary, file: &str) -> Result<ConfigurationRecord> {
    let path = Path::new(file);
    if path.exists() {
        RecordLibrary::read_document(path)
    } else {
        library.load(file)
    }
}

fn print_record(record: &ConfigurationRecord, legacy_warning: bool) {
    let timer_type = record
        .timer_type()
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| format!("type {}", record.model_type));

    println!("{} ({})", record.display_name(), timer_type);
    println!("  identity:      {}", record.identity());
    println!("  firmware:      {}", record.firmware_version);
    println!("  battery warn:  {} V", record.battery_warning_voltage);
    println!(
        "  temperature:   {} °C default",
        record.default_temperature_celsius()
    );
    println!(
        "  RDT: {}  beep on tow: {}  re-latch: {}",
        on_off(record.is_rdt_enabled()),
        on_off(record.is_beep_on_tow_enabled()),
        on_off(record.is_relatch_enabled())
    );
    println!("  skip to row:   {}", record.skip_to_row);

    let labels: Vec<String> = (0..record.servo_labels.len())
        .map(|i| {
            let mut label = record.servo_labels[i].clone();
            if !record.is_servo_in_use(i) {
                label.push('-');
            } else if record.is_servo_reversed(i) {
                label.push('R');
            }
            format!("{:>5}", label)
        })
        .collect();
    println!("  row    time {}", labels.join(""));
    for (i, row) in record.active_rows().iter().enumerate() {
        let servos: Vec<String> = row.servo.iter().map(|s| format!("{:>5}", s)).collect();
        println!("  {:>3} {:>7} {}", i + 1, row.time.to_string(), servos.join(""));
    }

    if let Some(telemetry) = &record.telemetry {
        println!(
            "  battery: {}  lowest: {}  temperature: {} °C  DT usage: {}",
            telemetry.battery_voltage,
            telemetry.lowest_battery_voltage,
            telemetry.temperature_celsius(),
            telemetry.dt_usage
        );
    }
    if legacy_warning {
        println!("  WARNING: old data format, check all settings before writing");
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_answer() {
        assert!(read_answer(Cursor::new("y\n")));
        assert!(read_answer(Cursor::new(" YES \n")));
        assert!(!read_answer(Cursor::new("n\n")));
        assert!(!read_answer(Cursor::new("")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_answer_read_on_runtime_worker() {
        let answer = tokio::task::block_in_place(|| read_answer(Cursor::new("yes\n")));
        assert!(answer);
    }
}
