//! Write-behind persistence as seen from a running app.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bevy::prelude::*;
use uuid::Uuid;

use crate::cell::CellStatus;
use crate::coordinate::GridCoordinate;
use crate::plugin::GridPlugin;
use crate::registry::GridRegistry;
use crate::settings::GridSettings;
use crate::store::{CellRecord, CellStore, StoreError};
use crate::test_harness::TestGrid;

/// Rejects every write but counts attempts.
#[derive(Default)]
struct BrokenDisk {
    attempts: AtomicUsize,
}

impl CellStore for BrokenDisk {
    fn load_all(&self) -> Result<Vec<CellRecord>, StoreError> {
        Err(StoreError::Corrupted("bad sector".to_string()))
    }

    fn upsert(&self, _record: CellRecord) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

#[test]
fn test_writes_drain_during_normal_ticks() {
    let mut grid = TestGrid::new();
    grid.registry_mut().reserve(GridCoordinate::new(3, 3), false);
    grid.registry_mut().set_purchase_price(GridCoordinate::new(3, 3), 40.0);

    for _ in 0..500 {
        grid.tick(1);
        if grid.registry().pending_persistence() == 0 {
            break;
        }
    }
    grid.flush();

    let stored = grid.store().get("3,3").unwrap();
    assert!(stored.reserved);
    assert!(!stored.blocked);
    assert_eq!(stored.purchase_price, 40.0);
}

#[test]
fn test_failed_reload_keeps_current_state() {
    let owner = Uuid::new_v4();
    let mut registry = GridRegistry::new(GridSettings::default(), Arc::new(BrokenDisk::default()));
    registry.occupy(GridCoordinate::new(2, 1), owner, "alice", "isl-1");
    registry.reserve(GridCoordinate::new(-1, 0), false);

    assert_eq!(registry.load_from_store(), 0);
    assert_eq!(registry.total_tracked(), 2);
    assert_eq!(registry.status(GridCoordinate::new(2, 1)), CellStatus::Occupied);
    assert_eq!(registry.find_coordinate_for_island("isl-1"), Some(GridCoordinate::new(2, 1)));
    assert_eq!(registry.find_coordinate_for_owner(owner), Some(GridCoordinate::new(2, 1)));
    registry.flush_persistence();
}

#[test]
fn test_store_failures_never_roll_back_memory() {
    let disk = Arc::new(BrokenDisk::default());
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(GridPlugin::new(GridSettings::default(), disk.clone()));
    app.update();

    let owner = Uuid::new_v4();
    {
        let mut registry = app.world_mut().resource_mut::<GridRegistry>();
        assert_eq!(registry.total_tracked(), 0, "failed load leaves registry empty");
        registry.occupy(GridCoordinate::new(0, 0), owner, "alice", "isl-1");
        registry.reserve(GridCoordinate::new(1, 0), true);
        registry.delete_persisted(GridCoordinate::new(5, 5));
        assert_eq!(registry.flush_persistence(), 3);
    }
    app.update();

    let registry = app.world().resource::<GridRegistry>();
    assert_eq!(registry.status(GridCoordinate::new(0, 0)), CellStatus::Occupied);
    assert_eq!(registry.status(GridCoordinate::new(1, 0)), CellStatus::Reserved);
    assert_eq!(registry.find_coordinate_for_island("isl-1"), Some(GridCoordinate::new(0, 0)));
    assert_eq!(registry.pending_persistence(), 0);
    assert_eq!(disk.attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn test_latest_state_wins_in_store() {
    let mut grid = TestGrid::new();
    let coord = GridCoordinate::new(-4, 2);
    let owner = Uuid::new_v4();
    {
        let mut registry = grid.registry_mut();
        registry.reserve(coord, true);
        registry.occupy(coord, owner, "alice", "isl-1");
        registry.clear(coord);
        registry.reserve(coord, false);
        registry.set_purchase_price(coord, 12.5);
    }
    grid.flush();

    let stored = grid.store().get(&coord.key()).unwrap();
    assert_eq!(stored.status, "RESERVED");
    assert_eq!(stored.owner_id, None);
    assert_eq!(stored.purchase_price, 12.5);
}
