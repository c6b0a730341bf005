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

//! Saved timer records as JSON documents.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::record::ConfigurationRecord;

const EXTENSION: &str = "json";

/// A saved record file.
#[derive(Debug, Clone)]
pub struct RecordEntry {
    pub file_name: String,
    pub modified: DateTime<Local>,
}

/// Directory of record documents.
#[derive(Debug, Clone)]
pub struct RecordLibrary {
    dir: PathBuf,
}

impl RecordLibrary {
    /// Open the library, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        debug!("Record library at {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name a record is saved under.
    ///
    /// Characters outside `[A-Za-z0-9.-]` become `_`.
    pub fn file_name_for(model_name: &str) -> String {
        let stem: String = model_name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = if stem.is_empty() { "unnamed".to_string() } else { stem };
        format!("{}.{}", stem, EXTENSION)
    }

    /// Save `record` under its model name, replacing any older copy.
    pub fn save(&self, record: &ConfigurationRecord) -> Result<PathBuf> {
        let path = self.dir.join(Self::file_name_for(&record.model_name));
        write_record(record, &path)?;
        info!("Saved record to {:?}", path);
        Ok(path)
    }

    pub fn load(&self, file_name: &str) -> Result<ConfigurationRecord> {
        read_record(&self.path_of(file_name)?)
    }

    /// Saved records sorted by file name.
    pub fn list(&self) -> Result<Vec<RecordEntry>> {
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let modified = entry.metadata()?.modified()?;
            entries.push(RecordEntry {
                file_name: file_name.to_string(),
                modified: DateTime::<Local>::from(modified),
            });
        }

        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    pub fn delete(&self, file_name: &str) -> Result<()> {
        let path = self.path_of(file_name)?;
        std::fs::remove_file(&path).with_context(|| format!("deleting {:?}", path))?;
        info!("Deleted {:?}", path);
        Ok(())
    }

    /// Read a document without adding it to the library.
    pub fn read_document(path: &Path) -> Result<ConfigurationRecord> {
        read_record(path)
    }

    /// Copy an external document into the library.
    pub fn import(&self, path: &Path) -> Result<ConfigurationRecord> {
        let record = read_record(path)?;
        self.save(&record)?;
        Ok(record)
    }

    /// Write `record` to an arbitrary path.
    pub fn export(&self, record: &ConfigurationRecord, path: &Path) -> Result<()> {
        write_record(record, path)?;
        info!("Exported record to {:?}", path);
        Ok(())
    }

    /// Export every saved record into `dir`. Returns (succeeded, failed).
    pub fn export_all(&self, dir: &Path) -> Result<(usize, usize)> {
        std::fs::create_dir_all(dir)?;
        let mut succeeded = 0;
        let mut failed = 0;

        for entry in self.list()? {
            let result = self
                .load(&entry.file_name)
                .and_then(|record| write_record(&record, &dir.join(&entry.file_name)));
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    warn!("Could not export {}: {:#}", entry.file_name, e);
                    failed += 1;
                }
            }
        }

        info!("Exported {} records to {:?} ({} failed)", succeeded, dir, failed);
        Ok((succeeded, failed))
    }

    /// Resolve a bare file name inside the library.
    fn path_of(&self, file_name: &str) -> Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .filter(|name| *name == std::ffi::OsStr::new(file_name))
            .ok_or_else(|| anyhow!("invalid record file name: {}", file_name))?;
        Ok(self.dir.join(name))
    }
}

fn read_record(path: &Path) -> Result<ConfigurationRecord> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {:?}", path))
}

fn write_record(record: &ConfigurationRecord, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Tenths, TimerType};
    use tempfile::TempDir;

    fn library() -> (TempDir, RecordLibrary) {
        let dir = TempDir::new().unwrap();
        let library = RecordLibrary::new(&dir.path().join("records")).unwrap();
        (dir, library)
    }

    #[test]
    fn test_file_name_sanitizing() {
        assert_eq!(RecordLibrary::file_name_for("F1A Timer Example"), "F1A_Timer_Example.json");
        assert_eq!(RecordLibrary::file_name_for("v1.2-beta/x"), "v1.2-beta_x.json");
        assert_eq!(RecordLibrary::file_name_for("  "), "unnamed.json");
    }

    #[test]
    fn test_save_load_list_delete() {
        let (_dir, library) = library();
        let record = ConfigurationRecord::new_for(TimerType::E36);

        let path = library.save(&record).unwrap();
        assert!(path.ends_with("E-36_Timer_Example.json"));

        let loaded = library.load("E-36_Timer_Example.json").unwrap();
        assert_eq!(loaded, record);

        let entries = library.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "E-36_Timer_Example.json");

        library.delete("E-36_Timer_Example.json").unwrap();
        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_paths_outside_library() {
        let (_dir, library) = library();
        assert!(library.load("../config.toml").is_err());
        assert!(library.delete("/etc/passwd").is_err());
    }

    #[test]
    fn test_import_tolerates_missing_and_unknown_keys() {
        let (dir, library) = library();
        let external = dir.path().join("shared.json");
        std::fs::write(
            &external,
            r#"{"model_name": "Shared", "battery_warning_voltage": 6.8, "colour": "red"}"#,
        )
        .unwrap();

        let record = library.import(&external).unwrap();

        assert_eq!(record.model_name, "Shared");
        assert_eq!(record.battery_warning_voltage, Tenths(68));
        assert_eq!(record.rows, ConfigurationRecord::default().rows);
        assert!(library.load("Shared.json").is_ok());
    }

    #[test]
    fn test_export_all_counts_failures() {
        let (dir, library) = library();
        library.save(&ConfigurationRecord::new_for(TimerType::F1A)).unwrap();
        library.save(&ConfigurationRecord::new_for(TimerType::F1B)).unwrap();
        std::fs::write(library.dir().join("broken.json"), "{ not json").unwrap();

        let out = dir.path().join("export");
        let (succeeded, failed) = library.export_all(&out).unwrap();

        assert_eq!((succeeded, failed), (2, 1));
        assert!(out.join("F1B_Timer_Example.json").exists());
    }

    #[test]
    fn test_export_single() {
        let (dir, library) = library();
        let record = ConfigurationRecord::default();
        let path = dir.path().join("copy.json");

        library.export(&record, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"battery_warning_voltage\": 7.2"));
        assert!(!text.contains("telemetry"));
    }
}
