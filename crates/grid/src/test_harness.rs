//! # TestGrid: headless harness for the grid plugin
//!
//! Wraps a `bevy::app::App` with `MinimalPlugins` + `GridPlugin`, an
//! in-memory store and a static island list. Build the world first, then
//! call `build()` to run `Startup` (load + reconcile) and inspect the result.

use std::sync::Arc;

use bevy::app::App;
use bevy::prelude::*;
use uuid::Uuid;

use crate::cell::CellStatus;
use crate::coordinate::GridCoordinate;
use crate::events::GridEventListeners;
use crate::plugin::{GridPlugin, LastReconcileReport, ReconcileRequest};
use crate::reconcile::ReconcileReport;
use crate::registry::GridRegistry;
use crate::settings::{GridBounds, GridSettings};
use crate::source::{IslandInfo, StaticIslandSource};
use crate::store::{CellRecord, MemoryCellStore};

pub const TEST_WORLD: &str = "skyblock_world";

pub struct TestGridBuilder {
    settings: GridSettings,
    source: StaticIslandSource,
    records: Vec<CellRecord>,
}

impl TestGridBuilder {
    pub fn with_bounds(mut self, min_x: i32, max_x: i32, min_z: i32, max_z: i32) -> Self {
        self.settings.bounds = GridBounds::new(min_x, max_x, min_z, max_z);
        self
    }

    /// The world generator's distance; cells are `2 * distance` apart.
    pub fn with_island_distance(mut self, distance: i32) -> Self {
        self.settings.island_distance = distance;
        self
    }

    pub fn with_reconcile_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.reconcile_timeout_secs = secs;
        self
    }

    pub fn with_island(mut self, id: &str, owner: Option<Uuid>, center_x: i32, center_z: i32) -> Self {
        self.source.islands.push(IslandInfo {
            id: id.to_string(),
            owner,
            center_x,
            center_z,
        });
        self
    }

    /// An owned island placed at the center of `coord`.
    pub fn with_island_at(self, id: &str, owner: Uuid, coord: GridCoordinate) -> Self {
        let spacing = self.settings.effective_spacing();
        self.with_island(id, Some(owner), coord.x * spacing, coord.z * spacing)
    }

    pub fn with_owner_name(mut self, owner: Uuid, name: &str) -> Self {
        self.source.names.insert(owner, name.to_string());
        self
    }

    pub fn with_record(mut self, record: CellRecord) -> Self {
        self.records.push(record);
        self
    }

    /// The world subsystem never comes up.
    pub fn without_world(mut self) -> Self {
        self.source.world = None;
        self
    }

    pub fn build(self) -> TestGrid {
        let store = Arc::new(MemoryCellStore::with_records(self.records));
        let source = Arc::new(self.source);

        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(GridPlugin::new(self.settings, store.clone()).with_source(source));

        // Startup: load from the store, then reconcile.
        app.update();

        TestGrid { app, store }
    }
}

pub struct TestGrid {
    app: App,
    store: Arc<MemoryCellStore>,
}

impl Default for TestGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl TestGrid {
    /// Default 21x21 grid, empty world.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestGridBuilder {
        TestGridBuilder {
            settings: GridSettings::default(),
            source: StaticIslandSource::new(TEST_WORLD),
            records: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Driving the app
    // -----------------------------------------------------------------------

    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.app.update();
            std::thread::yield_now();
        }
    }

    /// Send a `ReconcileRequest` and run one frame.
    pub fn request_reconcile(&mut self) -> ReconcileReport {
        self.app.world_mut().send_event(ReconcileRequest);
        self.tick(1);
        self.last_report().cloned().unwrap_or_default()
    }

    /// Block until every queued write reached the store.
    pub fn flush(&mut self) -> usize {
        self.registry_mut().flush_persistence()
    }

    pub fn send_exit(&mut self) {
        self.app.world_mut().send_event(AppExit::Success);
        self.tick(1);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn registry(&self) -> &GridRegistry {
        self.app.world().resource::<GridRegistry>()
    }

    pub fn registry_mut(&mut self) -> Mut<'_, GridRegistry> {
        self.app.world_mut().resource_mut::<GridRegistry>()
    }

    pub fn listeners(&self) -> &GridEventListeners {
        self.app.world().resource::<GridEventListeners>()
    }

    pub fn listeners_mut(&mut self) -> Mut<'_, GridEventListeners> {
        self.app.world_mut().resource_mut::<GridEventListeners>()
    }

    pub fn store(&self) -> &MemoryCellStore {
        &self.store
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.app
            .world()
            .resource::<LastReconcileReport>()
            .report
            .as_ref()
    }

    pub fn reconcile_runs(&self) -> u32 {
        self.app.world().resource::<LastReconcileReport>().runs
    }

    pub fn status(&self, x: i32, z: i32) -> CellStatus {
        self.registry().status(GridCoordinate::new(x, z))
    }

    pub fn stored_status(&self, x: i32, z: i32) -> Option<String> {
        self.store
            .get(&GridCoordinate::new(x, z).key())
            .map(|record| record.status)
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    pub fn assert_status(&self, x: i32, z: i32, expected: CellStatus) {
        let actual = self.status(x, z);
        assert_eq!(
            actual, expected,
            "expected {expected} at ({x},{z}), got {actual}"
        );
    }

    /// Both reverse indices agree with the cells they point at.
    pub fn assert_indices_consistent(&self) {
        let registry = self.registry();
        for cell in registry.cells().filter(|c| c.is_occupied()) {
            if let Some(id) = cell.island_id() {
                assert_eq!(
                    registry.find_coordinate_for_island(id),
                    Some(cell.coordinate()),
                    "island index out of date for {id}"
                );
            }
        }
        for (owner, coord) in &registry.owner_index {
            let cell = registry
                .cell(*coord)
                .unwrap_or_else(|| panic!("owner index points at untracked {coord}"));
            assert_eq!(cell.owner(), Some(*owner), "owner index stale at {coord}");
        }
        for (id, coord) in &registry.island_index {
            let cell = registry
                .cell(*coord)
                .unwrap_or_else(|| panic!("island index points at untracked {coord}"));
            assert_eq!(cell.island_id(), Some(id.as_str()), "island index stale at {coord}");
        }
    }
}
