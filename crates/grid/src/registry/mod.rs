//! # Grid registry
//!
//! Coordinate-keyed store of `GridCell`s plus two derived reverse indices:
//! owner -> coordinate and island id -> coordinate. The registry is the only
//! place cells are mutated; each mutation updates memory and indices first,
//! then queues an asynchronous write of the affected cell.
//!
//! Cells are created lazily on first access and stay in memory for the life
//! of the process. A coordinate with no cell is treated as available: after
//! reconciliation the registry is assumed complete.
//!
//! Lookups that miss an index fall back to a linear scan. Registries are
//! expected to hold at most a few thousand cells, so the scan and the
//! uncached counts below stay cheap.

mod bounds;
mod persistence;


use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;
use uuid::Uuid;

use crate::cell::{CellStatus, GridCell};
use crate::coordinate::GridCoordinate;
use crate::settings::GridSettings;
use crate::source::{IslandSource, WorldHandle};
use crate::store::{CellRecord, CellStore, CellWrite};
use crate::transform::CoordinateTransform;

use persistence::PersistenceQueue;

/// Largest radius `neighborhood` will walk: a 33x33 view.
pub const MAX_NEIGHBORHOOD_RADIUS: i32 = 16;

#[derive(Resource)]
pub struct GridRegistry {
    pub(crate) settings: GridSettings,
    pub(crate) cells: HashMap<GridCoordinate, GridCell>,
    pub(crate) owner_index: HashMap<Uuid, GridCoordinate>,
    pub(crate) island_index: HashMap<String, GridCoordinate>,
    pub(crate) source: Option<Arc<dyn IslandSource>>,
    pub(crate) world: Option<WorldHandle>,
    persistence: PersistenceQueue,
}

impl GridRegistry {
    pub fn new(settings: GridSettings, store: Arc<dyn CellStore>) -> Self {
        settings.warn_if_invalid_spacing();
        Self {
            settings,
            cells: HashMap::new(),
            owner_index: HashMap::new(),
            island_index: HashMap::new(),
            source: None,
            world: None,
            persistence: PersistenceQueue::new(store),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn IslandSource>) -> Self {
        self.attach_source(source);
        self
    }

    /// Attach (or replace) the world subsystem, e.g. once it finishes loading.
    pub fn attach_source(&mut self, source: Arc<dyn IslandSource>) {
        self.world = None;
        self.source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn world(&self) -> Option<&WorldHandle> {
        self.world.as_ref()
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::from_settings(&self.settings)
    }

    pub fn store(&self) -> &Arc<dyn CellStore> {
        self.persistence.store()
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn cell(&self, coord: GridCoordinate) -> Option<&GridCell> {
        self.cells.get(&coord)
    }

    /// Idempotent: a second call returns the same cell untouched.
    pub fn get_or_create_cell(&mut self, coord: GridCoordinate) -> &GridCell {
        self.cell_entry(coord)
    }

    pub(crate) fn cell_entry(&mut self, coord: GridCoordinate) -> &mut GridCell {
        self.cells
            .entry(coord)
            .or_insert_with(|| GridCell::new(coord))
    }

    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.values()
    }

    /// Checked against the bounds as they are right now.
    pub fn is_within_bounds(&self, coord: GridCoordinate) -> bool {
        self.settings.bounds.contains(coord)
    }

    /// `Locked` outside the bounds, otherwise the stored status, otherwise
    /// `Available`.
    pub fn status(&self, coord: GridCoordinate) -> CellStatus {
        if !self.is_within_bounds(coord) {
            return CellStatus::Locked;
        }
        self.cells
            .get(&coord)
            .map_or(CellStatus::Available, GridCell::status)
    }

    pub fn is_available(&self, coord: GridCoordinate) -> bool {
        if !self.is_within_bounds(coord) {
            return false;
        }
        self.cells.get(&coord).map_or(true, GridCell::is_available)
    }

    pub fn is_reserved(&self, coord: GridCoordinate) -> bool {
        self.cells.get(&coord).is_some_and(GridCell::is_reserved)
    }

    pub fn is_purchasable(&self, coord: GridCoordinate) -> bool {
        self.is_within_bounds(coord) && self.cells.get(&coord).is_some_and(GridCell::is_purchasable)
    }

    /// Row-major square of `(2 * radius + 1)^2` statuses around `center`.
    /// The radius is clamped to `MAX_NEIGHBORHOOD_RADIUS`.
    pub fn neighborhood(
        &self,
        center: GridCoordinate,
        radius: i32,
    ) -> Vec<(GridCoordinate, CellStatus)> {
        if radius < 0 {
            return Vec::new();
        }
        let radius = radius.min(MAX_NEIGHBORHOOD_RADIUS);
        let side = (2 * radius + 1) as usize;
        let mut out = Vec::with_capacity(side * side);
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let coord = center.offset(dx, dz);
                out.push((coord, self.status(coord)));
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Reservation
    // -----------------------------------------------------------------------

    pub fn reserve(&mut self, coord: GridCoordinate, blocked: bool) {
        let cell = self.cell_entry(coord);
        cell.set_reserved(true);
        cell.set_blocked(blocked);
        self.persist(coord);
    }

    /// Drops the reservation. The status returns to `Available` only when
    /// nobody owns the cell.
    pub fn unreserve(&mut self, coord: GridCoordinate) {
        let cell = self.cell_entry(coord);
        cell.set_reserved(false);
        cell.set_blocked(false);
        cell.set_purchase_price(0.0);
        if cell.owner().is_none() {
            cell.set_status(CellStatus::Available);
        }
        self.persist(coord);
    }

    /// A positive price also reserves the cell and makes it purchasable.
    pub fn set_purchase_price(&mut self, coord: GridCoordinate, price: f64) {
        let cell = self.cell_entry(coord);
        cell.set_purchase_price(price);
        if price > 0.0 {
            cell.set_reserved(true);
            cell.set_blocked(false);
        }
        self.persist(coord);
    }

    // -----------------------------------------------------------------------
    // Occupancy
    // -----------------------------------------------------------------------

    pub fn occupy(&mut self, coord: GridCoordinate, owner: Uuid, owner_name: &str, island_id: &str) {
        self.occupy_cell(coord, owner, owner_name, Some(island_id));
    }

    pub(crate) fn occupy_cell(
        &mut self,
        coord: GridCoordinate,
        owner: Uuid,
        owner_name: &str,
        island_id: Option<&str>,
    ) {
        self.unindex(coord);
        self.cell_entry(coord).occupy(owner, owner_name, island_id);
        if let Some(id) = island_id {
            self.island_index.insert(id.to_string(), coord);
        }
        self.owner_index.insert(owner, coord);
        self.persist(coord);
    }

    /// No-op when no cell exists at `coord`.
    pub fn clear(&mut self, coord: GridCoordinate) {
        if !self.cells.contains_key(&coord) {
            return;
        }
        self.unindex(coord);
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.clear();
        }
        self.persist(coord);
    }

    /// Drops index entries that point at `coord` for its current occupant.
    fn unindex(&mut self, coord: GridCoordinate) {
        let Some(cell) = self.cells.get(&coord) else {
            return;
        };
        if let Some(id) = cell.island_id() {
            if self.island_index.get(id) == Some(&coord) {
                self.island_index.remove(id);
            }
        }
        if let Some(owner) = cell.owner() {
            if self.owner_index.get(&owner) == Some(&coord) {
                self.owner_index.remove(&owner);
            }
        }
    }

    /// Moves an owner's island bookkeeping from `from` to `to` after a
    /// confirmed relocation. Refuses when `from` isn't theirs or `to` can't
    /// take an island (a purchasable reservation can).
    pub fn relocate(&mut self, owner: Uuid, from: GridCoordinate, to: GridCoordinate) -> bool {
        if from == to || !self.is_within_bounds(to) {
            return false;
        }
        let Some(source_cell) = self.cells.get(&from) else {
            return false;
        };
        if source_cell.owner() != Some(owner) {
            return false;
        }
        if !(self.is_available(to) || self.is_purchasable(to)) {
            return false;
        }
        let owner_name = source_cell
            .owner_name()
            .unwrap_or(&self.settings.unknown_owner_name)
            .to_string();
        let island_id = source_cell.island_id().map(str::to_string);

        self.clear(from);
        self.occupy_cell(to, owner, &owner_name, island_id.as_deref());
        info!("Relocated island of {owner_name} from {from} to {to}");
        true
    }

    // -----------------------------------------------------------------------
    // Reverse lookups
    // -----------------------------------------------------------------------

    /// Index, then a scan of all cells, then the world subsystem. Hits on the
    /// slower tiers repair the index.
    pub fn find_coordinate_for_owner(&mut self, owner: Uuid) -> Option<GridCoordinate> {
        if let Some(coord) = self.owner_index.get(&owner) {
            return Some(*coord);
        }

        let scanned = self
            .cells
            .values()
            .find(|cell| cell.owner() == Some(owner))
            .map(GridCell::coordinate);
        if let Some(coord) = scanned {
            self.owner_index.insert(owner, coord);
            return Some(coord);
        }

        self.lookup_owner_in_world(owner)
    }

    /// Index only. Every island id passes through `occupy`.
    pub fn find_coordinate_for_island(&self, island_id: &str) -> Option<GridCoordinate> {
        self.island_index.get(island_id).copied()
    }

    pub fn occupied_owners(&self) -> Vec<Uuid> {
        self.cells
            .values()
            .filter(|cell| cell.is_occupied())
            .filter_map(GridCell::owner)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Counts (uncached)
    // -----------------------------------------------------------------------

    pub fn total_tracked(&self) -> usize {
        self.cells.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.values().filter(|c| c.is_occupied()).count()
    }

    pub fn reserved_count(&self) -> usize {
        self.cells.values().filter(|c| c.is_reserved()).count()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub(crate) fn persist(&mut self, coord: GridCoordinate) {
        if let Some(cell) = self.cells.get(&coord) {
            let record = CellRecord::from(cell);
            self.persistence.push(CellWrite::Upsert(record));
        }
    }

    /// Removes the stored record. The in-memory cell is untouched.
    pub fn delete_persisted(&mut self, coord: GridCoordinate) {
        self.persistence.push(CellWrite::Delete(coord.key()));
    }

    pub fn save_all(&mut self) -> usize {
        let mut coords: Vec<GridCoordinate> = self.cells.keys().copied().collect();
        coords.sort();
        for coord in &coords {
            self.persist(*coord);
        }
        info!("Queued {} grid cells for saving", coords.len());
        coords.len()
    }

    /// Replaces in-memory state with the store's records and rebuilds the
    /// indices. Returns how many cells were loaded. A failed load is logged,
    /// returns 0 and keeps the current state.
    pub fn load_from_store(&mut self) -> usize {
        let records = match self.persistence.store().load_all() {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load grid cells: {e}");
                return 0;
            }
        };
        self.cells.clear();
        self.owner_index.clear();
        self.island_index.clear();
        for record in &records {
            let cell = GridCell::from_record(record);
            self.cells.insert(cell.coordinate(), cell);
        }
        self.rebuild_indices();
        info!("Loaded {} grid cells", self.cells.len());
        self.cells.len()
    }

    /// Rebuilds both reverse indices from the cells.
    pub fn rebuild_indices(&mut self) {
        self.owner_index.clear();
        self.island_index.clear();
        let mut cells: Vec<&GridCell> = self.cells.values().collect();
        cells.sort_by_key(|c| c.coordinate());
        for cell in cells {
            let coord = cell.coordinate();
            if let Some(owner) = cell.owner() {
                self.owner_index.insert(owner, coord);
            }
            if let Some(id) = cell.island_id() {
                self.island_index.insert(id.to_string(), coord);
            }
        }
    }

    /// Non-blocking check on in-flight writes. Returns the failure count of
    /// any batch that completed.
    pub fn poll_persistence(&mut self) -> usize {
        self.persistence.poll()
    }

    /// Blocks until every queued write has been applied.
    pub fn flush_persistence(&mut self) -> usize {
        self.persistence.flush()
    }

    pub fn pending_persistence(&self) -> usize {
        self.persistence.pending()
    }
}
