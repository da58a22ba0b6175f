//! Durable snapshot store for the three domain collections.
//!
//! Each collection (cases, recordings, offline queue) is one file holding a
//! complete CBOR snapshot inside a checksummed envelope. Every write is
//! read-modify-write over the whole collection; there is no indexed update.
//! The caller must serialize writes to the same collection — this layer
//! provides no locking. Crash safety relies on the atomic temp-file rename:
//! a failed write leaves the previous snapshot intact.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{Case, CaseId, QueuedRecording, Recording, RecordingId};

const CURRENT_SCHEMA_VERSION: u32 = 1;
const MAX_COLLECTION_BYTES: usize = 50 * 1024 * 1024;
const STORE_MAGIC: &[u8; 4] = b"CNSL";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted collection {collection}: {reason}")]
    Corrupted {
        collection: &'static str,
        reason: &'static str,
    },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    #[error("schema version {found} is newer than supported {max}")]
    FutureSchema { found: u32, max: u32 },

    #[error("unknown schema version: {0}")]
    UnknownSchema(u32),

    #[error("collection too large: {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },
}

impl From<ciborium::de::Error<std::io::Error>> for StoreError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for StoreError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// The three logical collections, each persisted under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Cases,
    Recordings,
    OfflineQueue,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Cases, Self::Recordings, Self::OfflineQueue];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Cases => "cases",
            Self::Recordings => "recordings",
            Self::OfflineQueue => "offline_queue",
        }
    }

    const fn file_name(self) -> &'static str {
        match self {
            Self::Cases => "cases.bin",
            Self::Recordings => "recordings.bin",
            Self::OfflineQueue => "offline_queue.bin",
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct Envelope {
    magic: [u8; 4],
    schema_version: u32,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

#[derive(Debug)]
pub struct CollectionStore {
    dir: PathBuf,
}

impl CollectionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    /// Load a full collection snapshot. A missing file is an empty
    /// collection, not an error.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let path = self.path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(&path)?;
        if bytes.is_empty() {
            return Err(StoreError::Corrupted {
                collection: collection.key(),
                reason: "empty file",
            });
        }
        if bytes.len() > MAX_COLLECTION_BYTES {
            return Err(StoreError::TooLarge {
                size: bytes.len(),
                max: MAX_COLLECTION_BYTES,
            });
        }

        let envelope: Envelope = ciborium::from_reader(&bytes[..])?;

        if envelope.magic != *STORE_MAGIC {
            return Err(StoreError::Corrupted {
                collection: collection.key(),
                reason: "invalid magic bytes",
            });
        }
        if envelope.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::FutureSchema {
                found: envelope.schema_version,
                max: CURRENT_SCHEMA_VERSION,
            });
        }

        let actual_checksum = blake3::hash(&envelope.payload);
        if actual_checksum.as_bytes() != &envelope.checksum {
            return Err(StoreError::IntegrityCheckFailed {
                expected: hex::encode(envelope.checksum),
                actual: hex::encode(actual_checksum.as_bytes()),
            });
        }

        let payload = if envelope.schema_version < CURRENT_SCHEMA_VERSION {
            Self::migrate(envelope.schema_version, envelope.payload)?
        } else {
            envelope.payload
        };

        Ok(ciborium::from_reader(&payload[..])?)
    }

    /// Replace a collection snapshot atomically: write to a temp file, fsync,
    /// rename over the previous snapshot, fsync the directory.
    pub fn save<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), StoreError> {
        let mut payload = Vec::new();
        ciborium::into_writer(&items, &mut payload)?;

        let checksum = blake3::hash(&payload);
        let envelope = Envelope {
            magic: *STORE_MAGIC,
            schema_version: CURRENT_SCHEMA_VERSION,
            checksum: *checksum.as_bytes(),
            payload,
        };

        let mut bytes = Vec::new();
        ciborium::into_writer(&envelope, &mut bytes)?;

        let path = self.path(collection);
        let tmp_path = path.with_extension("tmp");

        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        std::fs::rename(&tmp_path, &path)?;
        sync_parent_dir(&path);

        debug!(collection = collection.key(), count = items.len(), "snapshot written");
        Ok(())
    }

    /// Bump old payloads to the current schema. No prior versions exist
    /// yet; anything below the current version is unrecognized.
    fn migrate(from_version: u32, _payload: Vec<u8>) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::UnknownSchema(from_version))
    }

    // --- Case CRUD (read-modify-write over the whole collection) ---

    pub fn save_case(&self, case: &Case) -> Result<(), StoreError> {
        let mut cases: Vec<Case> = self.load(Collection::Cases)?;
        cases.push(case.clone());
        self.save(Collection::Cases, &cases)
    }

    pub fn save_cases(&self, cases: &[Case]) -> Result<(), StoreError> {
        self.save(Collection::Cases, cases)
    }

    pub fn delete_case(&self, id: &CaseId) -> Result<(), StoreError> {
        let mut cases: Vec<Case> = self.load(Collection::Cases)?;
        cases.retain(|c| &c.id != id);
        self.save(Collection::Cases, &cases)
    }

    // --- Recording CRUD ---

    /// Insert or replace a recording by id.
    pub fn upsert_recording(&self, recording: &Recording) -> Result<(), StoreError> {
        let mut recordings: Vec<Recording> = self.load(Collection::Recordings)?;
        match recordings.iter_mut().find(|r| r.id == recording.id) {
            Some(existing) => *existing = recording.clone(),
            None => recordings.push(recording.clone()),
        }
        self.save(Collection::Recordings, &recordings)
    }

    pub fn save_recordings(&self, recordings: &[Recording]) -> Result<(), StoreError> {
        self.save(Collection::Recordings, recordings)
    }

    pub fn delete_recording(&self, id: &RecordingId) -> Result<(), StoreError> {
        let mut recordings: Vec<Recording> = self.load(Collection::Recordings)?;
        recordings.retain(|r| &r.id != id);
        self.save(Collection::Recordings, &recordings)
    }

    // --- Offline queue CRUD ---

    /// Append a queue entry unless one already exists for the same
    /// recording id.
    pub fn enqueue(&self, entry: &QueuedRecording) -> Result<(), StoreError> {
        let mut queue: Vec<QueuedRecording> = self.load(Collection::OfflineQueue)?;
        if queue.iter().any(|q| q.recording_id == entry.recording_id) {
            return Ok(());
        }
        queue.push(entry.clone());
        self.save(Collection::OfflineQueue, &queue)
    }

    pub fn save_queue(&self, queue: &[QueuedRecording]) -> Result<(), StoreError> {
        self.save(Collection::OfflineQueue, queue)
    }

    pub fn remove_from_queue(&self, recording_id: &RecordingId) -> Result<(), StoreError> {
        let mut queue: Vec<QueuedRecording> = self.load(Collection::OfflineQueue)?;
        queue.retain(|q| &q.recording_id != recording_id);
        self.save(Collection::OfflineQueue, &queue)
    }

    /// Remove all three collections. Irreversible; only an explicit
    /// user-triggered reset should reach this.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            match std::fs::remove_file(self.path(collection)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
