use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use bevy::log::{debug, error, info};
use grid::{CellRecord, CellStore, CellWrite, StoreError};

use crate::atomic_write::atomic_write;
use crate::file_header::{unwrap_header, wrap_with_header, FLAG_COMPRESSED};

/// Payloads smaller than this are stored uncompressed.
const COMPRESS_THRESHOLD: usize = 256;

/// Encodes records into a complete store file image.
pub fn encode_records(records: &[CellRecord]) -> Vec<u8> {
    let encoded = bitcode::encode(records);
    let count = records.len() as u32;
    let size = encoded.len() as u32;
    if encoded.len() >= COMPRESS_THRESHOLD {
        let compressed = lz4_flex::compress_prepend_size(&encoded);
        wrap_with_header(&compressed, count, size, FLAG_COMPRESSED)
    } else {
        wrap_with_header(&encoded, count, size, 0)
    }
}

/// Inverse of [`encode_records`]. Every failure is reported as corruption.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<CellRecord>, StoreError> {
    let (header, payload) =
        unwrap_header(bytes).map_err(|e| StoreError::Corrupted(e.to_string()))?;

    let decompressed;
    let encoded = if header.is_compressed() {
        decompressed = lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| StoreError::Corrupted(format!("lz4: {e}")))?;
        decompressed.as_slice()
    } else {
        payload
    };
    if encoded.len() != header.uncompressed_size as usize {
        return Err(StoreError::Corrupted(format!(
            "payload is {} bytes, header says {}",
            encoded.len(),
            header.uncompressed_size
        )));
    }

    let records: Vec<CellRecord> =
        bitcode::decode(encoded).map_err(|e| StoreError::Decode(e.to_string()))?;
    if records.len() != header.record_count as usize {
        return Err(StoreError::Corrupted(format!(
            "decoded {} records, header says {}",
            records.len(),
            header.record_count
        )));
    }
    Ok(records)
}

/// Single-file `CellStore`.
///
/// The whole record set is cached in memory and rewritten on each change,
/// once per batch when writes arrive through `apply_batch`. With a few
/// thousand cells the file stays well under a megabyte.
#[derive(Debug)]
pub struct FileCellStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CellRecord>>,
}

impl FileCellStore {
    /// Opens the store at `path`. A missing file is an empty store; a
    /// damaged one is an error so it is never silently overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = read_file(&path)?;
        info!("Opened cell store {} ({} records)", path.display(), records.len());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, CellRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self, records: &BTreeMap<String, CellRecord>) -> Result<(), StoreError> {
        let list: Vec<CellRecord> = records.values().cloned().collect();
        let bytes = encode_records(&list);
        atomic_write(&self.path, &bytes)?;
        debug!("Wrote {} cell records ({} bytes)", list.len(), bytes.len());
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<String, CellRecord>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(decode_records(&bytes)?
        .into_iter()
        .map(|record| (record.key.clone(), record))
        .collect())
}

impl CellStore for FileCellStore {
    fn load_all(&self) -> Result<Vec<CellRecord>, StoreError> {
        let fresh = read_file(&self.path)?;
        let mut records = self.lock()?;
        *records = fresh;
        Ok(records.values().cloned().collect())
    }

    fn upsert(&self, record: CellRecord) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        if records.get(&record.key) == Some(&record) {
            return Ok(());
        }
        records.insert(record.key.clone(), record);
        self.write(&records)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        if records.remove(key).is_none() {
            return Ok(());
        }
        self.write(&records)
    }

    fn apply_batch(&self, writes: Vec<CellWrite>) -> Vec<(String, StoreError)> {
        let keys: Vec<String> = writes.iter().map(|w| w.key().to_string()).collect();
        let result = self.lock().and_then(|mut records| {
            let mut changed = false;
            for write in writes {
                match write {
                    CellWrite::Upsert(record) => {
                        if records.get(&record.key) != Some(&record) {
                            records.insert(record.key.clone(), record);
                            changed = true;
                        }
                    }
                    CellWrite::Delete(key) => changed |= records.remove(&key).is_some(),
                }
            }
            if changed {
                self.write(&records)?;
            }
            Ok(())
        });

        let Err(e) = result else {
            return Vec::new();
        };
        error!("Cell store batch of {} writes failed: {e}", keys.len());
        let size = keys.len();
        let reason = e.to_string();
        keys.into_iter()
            .map(|key| {
                let e = StoreError::BatchFailed {
                    size,
                    reason: reason.clone(),
                };
                (key, e)
            })
            .collect()
    }
}
