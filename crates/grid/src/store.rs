//! Persistence boundary for grid cells.
//!
//! A `CellStore` is a key-value store keyed by the coordinate's canonical
//! string. Calls are synchronous; the registry runs them on `IoTaskPool`
//! so the game thread never waits on storage.

use std::collections::BTreeMap;
use std::sync::Mutex;

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::{CellStatus, GridCell};
use crate::coordinate::GridCoordinate;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(String),
    #[error("decoding error: {0}")]
    Decode(String),
    #[error("store file is corrupted: {0}")]
    Corrupted(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("batch of {size} writes failed: {reason}")]
    BatchFailed { size: usize, reason: String },
}

/// Flat, storage-friendly form of a `GridCell`.
///
/// Owner ids are kept as strings so that a damaged id only loses the owner,
/// not the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CellRecord {
    pub key: String,
    pub column: i32,
    pub row: i32,
    pub status: String,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    pub island_id: Option<String>,
    pub reserved: bool,
    pub blocked: bool,
    pub purchase_price: f64,
}

impl CellRecord {
    /// A record with no owner and no reservation.
    pub fn new(coord: GridCoordinate, status: CellStatus) -> Self {
        Self {
            key: coord.key(),
            column: coord.x,
            row: coord.z,
            status: status.name().to_string(),
            owner_id: None,
            owner_name: None,
            island_id: None,
            reserved: false,
            blocked: false,
            purchase_price: 0.0,
        }
    }

    pub fn coordinate(&self) -> GridCoordinate {
        GridCoordinate::new(self.column, self.row)
    }

    /// Invalid ids read as "no owner".
    pub fn owner_uuid(&self) -> Option<Uuid> {
        self.owner_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id.trim()).ok())
    }

    pub fn status(&self) -> CellStatus {
        CellStatus::parse_or_default(&self.status)
    }
}

impl From<&GridCell> for CellRecord {
    fn from(cell: &GridCell) -> Self {
        let coord = cell.coordinate();
        Self {
            key: coord.key(),
            column: coord.x,
            row: coord.z,
            status: cell.status().name().to_string(),
            owner_id: cell.owner().map(|o| o.to_string()),
            owner_name: cell.owner().and(cell.owner_name().map(str::to_string)),
            island_id: cell.island_id().map(str::to_string),
            reserved: cell.is_reserved(),
            blocked: cell.is_blocked(),
            purchase_price: cell.purchase_price(),
        }
    }
}

impl GridCell {
    /// Rebuild a cell from storage. Reservation fields are applied through
    /// the normal mutators, so a reserved record always loads as `Reserved`.
    pub(crate) fn from_record(record: &CellRecord) -> Self {
        let mut cell = GridCell::new(record.coordinate());
        let status = match record.status() {
            // never a stored state
            CellStatus::Locked => CellStatus::Available,
            other => other,
        };
        cell.set_status(status);
        if let Some(owner) = record.owner_uuid() {
            cell.set_owner(Some(owner), record.owner_name.clone());
            cell.set_island_id(record.island_id.clone());
        }
        cell.set_reserved(record.reserved);
        cell.set_blocked(record.blocked);
        cell.set_purchase_price(record.purchase_price);
        cell
    }
}

/// One queued change to a `CellStore`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellWrite {
    Upsert(CellRecord),
    Delete(String),
}

impl CellWrite {
    pub fn key(&self) -> &str {
        match self {
            CellWrite::Upsert(record) => &record.key,
            CellWrite::Delete(key) => key,
        }
    }
}

pub trait CellStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<CellRecord>, StoreError>;

    fn upsert(&self, record: CellRecord) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Applies `writes` in order. Returns the key and error of every write
    /// that failed. Stores that pay per write should override this.
    fn apply_batch(&self, writes: Vec<CellWrite>) -> Vec<(String, StoreError)> {
        writes
            .into_iter()
            .filter_map(|write| {
                let key = write.key().to_string();
                let result = match write {
                    CellWrite::Upsert(record) => self.upsert(record),
                    CellWrite::Delete(stored) => self.delete(&stored),
                };
                result.err().map(|e| (key, e))
            })
            .collect()
    }
}

/// Volatile store. Used in tests and when running without a data directory.
#[derive(Debug, Default)]
pub struct MemoryCellStore {
    records: Mutex<BTreeMap<String, CellRecord>>,
}

impl MemoryCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CellRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.key.clone(), record))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }

    pub fn get(&self, key: &str) -> Option<CellRecord> {
        self.records.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CellStore for MemoryCellStore {
    fn load_all(&self) -> Result<Vec<CellRecord>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.values().cloned().collect())
    }

    fn upsert(&self, record: CellRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.key.clone(), record);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.remove(key);
        Ok(())
    }
}
