// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry store.
//!
//! Pure IPC sink persisting capture records to a JSON file. Every save is
//! checked against the region table first: a sender without a region, or one
//! failing its access check, gets an error reply and nothing is stored. Disk
//! writes go through a temp file and rename so the store file is never
//! half-written; a store file that fails to parse on open is reset to empty.

#![forbid(unsafe_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use apogee::ipc::{Hub, Message};
use apogee::mm::RegionTable;

/// Name the service registers under on the hub.
pub const NAME: &str = "telemd";

/// One stored capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stored filename.
    pub filename: String,
    /// Producer-supplied record kind.
    pub kind: String,
}

/// Errors while reading or writing the store file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The store file holds something other than a record list.
    #[error("bad telemetry store {}: {source}", .path.display())]
    Json {
        /// Offending path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Capture archive with region-checked writes.
pub struct TelemetryStore {
    hub: Arc<Hub>,
    mm: Arc<RegionTable>,
    path: PathBuf,
    records: Mutex<Vec<Record>>,
}

impl TelemetryStore {
    /// Opens the store at `path`, loading any existing records, and registers
    /// its message handler.
    pub fn spawn(
        hub: Arc<Hub>,
        mm: Arc<RegionTable>,
        path: impl Into<PathBuf>,
    ) -> Result<Arc<Self>, StoreError> {
        let path = path.into();
        let records = load_records(&path)?;
        log::info!(
            "telemd: store online, {} records at {}",
            records.len(),
            path.display()
        );
        let service = Arc::new(TelemetryStore {
            hub,
            mm,
            path,
            records: Mutex::new(records),
        });
        let handler = Arc::clone(&service);
        service
            .hub
            .register(NAME, Arc::new(move |msg| handler.receive(msg)));
        Ok(service)
    }

    /// All stored records, oldest first.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    fn receive(&self, msg: Message) {
        if msg.payload["action"] != "save" {
            return;
        }
        let Some(region) = self.mm.region(&msg.from) else {
            log::warn!("telemd: rejected save from '{}', no region", msg.from);
            self.hub.send(
                NAME,
                &msg.from,
                json!({"status": "error", "reason": "no_region"}),
            );
            return;
        };
        if !self.mm.check_access(&msg.from, region.base) {
            self.hub.send(
                NAME,
                &msg.from,
                json!({"status": "error", "reason": "access_violation"}),
            );
            return;
        }

        let filename = msg.payload["filename"].as_str().unwrap_or("unnamed").to_string();
        let kind = msg.payload["kind"].as_str().unwrap_or("generic").to_string();
        self.records.lock().push(Record {
            filename: filename.clone(),
            kind,
        });

        if let Err(err) = self.save() {
            log::error!("telemd: persist failed: {err}");
            self.hub.send(
                NAME,
                &msg.from,
                json!({"status": "error", "reason": "store_failure"}),
            );
            return;
        }
        log::debug!("telemd: stored {filename} for '{}'", msg.from);
        self.hub
            .send(NAME, &msg.from, json!({"status": "ok", "filename": filename}));
    }

    fn save(&self) -> Result<(), StoreError> {
        let records = self.records.lock().clone();
        save_atomic(&self.path, &records)
    }
}

fn load_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    match serde_json::from_str(&raw) {
        Ok(records) => Ok(records),
        Err(err) => {
            log::warn!(
                "telemd: corrupt store {}, starting empty: {err}",
                path.display()
            );
            Ok(Vec::new())
        }
    }
}

fn save_atomic(path: &Path, records: &[Record]) -> Result<(), StoreError> {
    let io = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io)?;
        }
    }
    let encoded = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(io)?;
    file.write_all(&encoded).map_err(io)?;
    file.sync_all().map_err(io)?;
    fs::rename(&tmp, path).map_err(io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(hub: &Hub, name: &str) -> Arc<Mutex<Vec<Message>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.register(name, Arc::new(move |msg: Message| sink.lock().push(msg)));
        seen
    }

    fn save_msg(filename: &str) -> serde_json::Value {
        json!({"action": "save", "filename": filename, "kind": "nucleus_frame"})
    }

    #[test]
    fn save_without_a_region_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("telemetry.json");
        let hub = Arc::new(Hub::new());
        let mm = Arc::new(RegionTable::new());
        let camera = recorder(&hub, "camerad");
        let store =
            TelemetryStore::spawn(Arc::clone(&hub), mm, &path).expect("open store");

        hub.send("camerad", NAME, save_msg("LYRA_nucleus_001.jpg"));

        let camera = camera.lock();
        assert_eq!(
            camera[0].payload,
            json!({"status": "error", "reason": "no_region"})
        );
        assert!(store.records().is_empty());
        assert!(!path.exists(), "nothing persisted for a denied save");
    }

    #[test]
    fn save_with_a_region_is_stored_and_persisted() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("telemetry.json");
        let hub = Arc::new(Hub::new());
        let mm = Arc::new(RegionTable::new());
        mm.allocate("camerad", 0x0800);
        let camera = recorder(&hub, "camerad");
        let store =
            TelemetryStore::spawn(Arc::clone(&hub), Arc::clone(&mm), &path).expect("open store");

        hub.send("camerad", NAME, save_msg("LYRA_nucleus_001.jpg"));

        let camera = camera.lock();
        assert_eq!(
            camera[0].payload,
            json!({"status": "ok", "filename": "LYRA_nucleus_001.jpg"})
        );
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].filename, "LYRA_nucleus_001.jpg");

        let raw = fs::read_to_string(&path).expect("store file exists");
        let on_disk: Vec<Record> = serde_json::from_str(&raw).expect("store file parses");
        assert_eq!(on_disk, store.records());
    }

    #[test]
    fn zero_sized_region_fails_the_access_check() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("telemetry.json");
        let hub = Arc::new(Hub::new());
        let mm = Arc::new(RegionTable::new());
        mm.allocate("camerad", 0);
        let camera = recorder(&hub, "camerad");
        let _store =
            TelemetryStore::spawn(Arc::clone(&hub), mm, &path).expect("open store");

        hub.send("camerad", NAME, save_msg("LYRA_nucleus_001.jpg"));

        assert_eq!(
            camera.lock()[0].payload,
            json!({"status": "error", "reason": "access_violation"})
        );
    }

    #[test]
    fn existing_records_survive_a_restart() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("telemetry.json");
        let hub = Arc::new(Hub::new());
        let mm = Arc::new(RegionTable::new());
        mm.allocate("camerad", 0x0800);

        {
            let _store = TelemetryStore::spawn(Arc::clone(&hub), Arc::clone(&mm), &path)
                .expect("open store");
            hub.send("camerad", NAME, save_msg("LYRA_nucleus_001.jpg"));
        }

        let reopened =
            TelemetryStore::spawn(Arc::clone(&hub), mm, &path).expect("reopen store");
        assert_eq!(reopened.records().len(), 1);
        assert_eq!(reopened.records()[0].filename, "LYRA_nucleus_001.jpg");
    }

    #[test]
    fn corrupt_store_file_is_reset_to_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("telemetry.json");
        fs::write(&path, "not json").expect("write corrupt file");
        let hub = Arc::new(Hub::new());
        let mm = Arc::new(RegionTable::new());
        mm.allocate("camerad", 0x0800);

        let store = TelemetryStore::spawn(Arc::clone(&hub), mm, &path).expect("spawn recovers");
        assert!(store.records().is_empty());

        // The healed store accepts saves again.
        hub.send("camerad", NAME, save_msg("LYRA_nucleus_001.jpg"));
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("data").join("telemetry.json");
        let hub = Arc::new(Hub::new());
        let mm = Arc::new(RegionTable::new());
        mm.allocate("camerad", 0x0800);
        let _store =
            TelemetryStore::spawn(Arc::clone(&hub), mm, &path).expect("open store");

        hub.send("camerad", NAME, save_msg("LYRA_nucleus_001.jpg"));

        assert!(path.exists());
    }
}
