//! Rebuilding occupancy from the world subsystem.
//!
//! A full pass discards every occupied cell and re-derives occupancy from the
//! live island list. Reserved and plain available cells survive untouched.
//! Two islands landing on the same cell is a data anomaly: the first one
//! registered keeps the cell and the conflict is logged. A pass that runs out
//! of time puts back the occupied cells it had not reached yet.
//!
//! The point lookups at the bottom repair single cells between full passes.

use std::time::{Duration, Instant};

use bevy::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::cell::GridCell;
use crate::coordinate::GridCoordinate;
use crate::registry::GridRegistry;
use crate::source::{IslandInfo, IslandSource, WorldHandle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    #[default]
    Completed,
    /// No world subsystem, or it could not list islands. Nothing was purged.
    SourceUnavailable,
    /// Ran out of time. Cells not re-derived were restored; re-run to finish.
    TimedOut,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    /// Occupied cells removed before re-deriving.
    pub purged: usize,
    pub synced: usize,
    /// Every island not registered, for any reason below.
    pub skipped: usize,
    pub out_of_bounds: usize,
    pub unowned: usize,
    pub already_registered: usize,
    pub conflicts: usize,
    /// Occupied cells put back after a timeout.
    pub restored: usize,
}

impl ReconcileReport {
    fn unavailable() -> Self {
        Self {
            outcome: ReconcileOutcome::SourceUnavailable,
            ..Self::default()
        }
    }
}

impl GridRegistry {
    /// Full reconciliation pass. Safe to call again at any time.
    pub fn reconcile(&mut self) -> ReconcileReport {
        let timeout = self.settings.reconcile_timeout();
        self.reconcile_within(timeout)
    }

    /// `timeout` covers the island enumeration and the sync loop. A pass that
    /// runs out of time restores every purged cell it did not re-derive.
    pub(crate) fn reconcile_within(&mut self, timeout: Duration) -> ReconcileReport {
        let started = Instant::now();
        let Some((source, world)) = self.resolve_world() else {
            warn!("World subsystem unavailable, skipping grid reconciliation");
            return ReconcileReport::unavailable();
        };

        // list first so a failing or slow source leaves the loaded state intact
        let islands = match source.list_islands(&world) {
            Ok(islands) => islands,
            Err(e) => {
                warn!("Cannot list islands in {}: {e}; skipping grid reconciliation", world.name());
                return ReconcileReport::unavailable();
            }
        };
        if started.elapsed() >= timeout {
            warn!(
                "Listing islands in {} took longer than {:?}; skipping grid reconciliation",
                world.name(),
                timeout
            );
            return ReconcileReport {
                outcome: ReconcileOutcome::TimedOut,
                ..ReconcileReport::default()
            };
        }

        let purged = self.purge_occupied();
        let mut report = ReconcileReport {
            purged: purged.len(),
            ..ReconcileReport::default()
        };
        info!(
            "Reconciling grid with {} islands in {} ({} stale occupied cells purged)",
            islands.len(),
            world.name(),
            report.purged
        );

        for (i, island) in islands.iter().enumerate() {
            if started.elapsed() >= timeout {
                warn!(
                    "Grid reconciliation timed out after {:?} with {} of {} islands processed",
                    timeout,
                    i,
                    islands.len()
                );
                report.outcome = ReconcileOutcome::TimedOut;
                break;
            }
            self.sync_island(source.as_ref(), island, &mut report);
        }
        match report.outcome {
            ReconcileOutcome::TimedOut => {
                report.restored = self.restore_unsynced(purged);
                info!("Restored {} occupied cells left over from the timed out pass", report.restored);
            }
            _ => {
                // islands that vanished from the world leave no stored record behind
                for cell in purged {
                    let coord = cell.coordinate();
                    if !self.cells.contains_key(&coord) {
                        self.delete_persisted(coord);
                    }
                }
            }
        }
        report.skipped =
            report.out_of_bounds + report.unowned + report.already_registered + report.conflicts;

        info!(
            "Grid sync complete: {} islands synced, {} skipped ({} conflicts). Grid size: {}x{}",
            report.synced,
            report.skipped,
            report.conflicts,
            self.settings.grid_width(),
            self.settings.grid_height()
        );
        report
    }

    /// Removes every occupied cell and empties both indices.
    fn purge_occupied(&mut self) -> Vec<GridCell> {
        let (mut purged, kept): (Vec<GridCell>, Vec<GridCell>) = std::mem::take(&mut self.cells)
            .into_values()
            .partition(GridCell::is_occupied);
        self.cells = kept.into_iter().map(|cell| (cell.coordinate(), cell)).collect();
        purged.sort_by_key(GridCell::coordinate);
        self.owner_index.clear();
        self.island_index.clear();
        purged
    }

    /// Puts purged cells back, with their index entries, unless the pass
    /// already re-derived their coordinate or moved their island elsewhere.
    /// The stored record of a moved island is dropped.
    fn restore_unsynced(&mut self, purged: Vec<GridCell>) -> usize {
        let mut restored = 0;
        for cell in purged {
            let coord = cell.coordinate();
            if self.cells.contains_key(&coord) {
                continue;
            }
            if cell
                .island_id()
                .is_some_and(|id| self.island_index.contains_key(id))
            {
                self.delete_persisted(coord);
                continue;
            }
            if let Some(id) = cell.island_id() {
                self.island_index.insert(id.to_string(), coord);
            }
            if let Some(owner) = cell.owner() {
                self.owner_index.entry(owner).or_insert(coord);
            }
            self.cells.insert(coord, cell);
            restored += 1;
        }
        restored
    }

    fn sync_island(&mut self, source: &dyn IslandSource, island: &IslandInfo, report: &mut ReconcileReport) {
        let coord = self
            .transform()
            .world_to_grid(island.center_x, island.center_z);

        if !self.is_within_bounds(coord) {
            debug!("Island {} at {coord} is outside the grid", island.id);
            report.out_of_bounds += 1;
            return;
        }
        let Some(owner) = island.owner else {
            debug!("Island {} at {coord} has no owner", island.id);
            report.unowned += 1;
            return;
        };
        if self.island_index.contains_key(&island.id) {
            report.already_registered += 1;
            return;
        }
        if let Some(cell) = self.cells.get(&coord) {
            if cell.is_occupied() && cell.island_id() != Some(island.id.as_str()) {
                warn!(
                    "Grid conflict at {coord}: island {} already holds the cell, skipping island {}",
                    cell.island_id().unwrap_or("<unknown>"),
                    island.id
                );
                report.conflicts += 1;
                return;
            }
        }

        let owner_name = self.owner_name(source, owner);
        debug!("Registering island {} of {owner_name} at {coord}", island.id);
        self.occupy_cell(coord, owner, &owner_name, Some(&island.id));
        report.synced += 1;
    }

    fn owner_name(&self, source: &dyn IslandSource, owner: Uuid) -> String {
        source
            .owner_display_name(owner)
            .unwrap_or_else(|| self.settings.unknown_owner_name.clone())
    }

    /// Cached world handle, or a fresh one from the source.
    fn resolve_world(&mut self) -> Option<(std::sync::Arc<dyn IslandSource>, WorldHandle)> {
        let source = self.source.clone()?;
        let world = match &self.world {
            Some(world) => world.clone(),
            None => {
                let world = source.primary_world()?;
                self.world = Some(world.clone());
                world
            }
        };
        Some((source, world))
    }

    // -----------------------------------------------------------------------
    // Point lookups
    // -----------------------------------------------------------------------

    /// Last tier of `find_coordinate_for_owner`: ask the world subsystem.
    ///
    /// A free cell is registered. If another island already holds the cell,
    /// the conflict is logged and the coordinate is still returned, since the
    /// world knows where the island actually is.
    pub(crate) fn lookup_owner_in_world(&mut self, owner: Uuid) -> Option<GridCoordinate> {
        let (source, world) = self.resolve_world()?;
        let island = source.island_for_owner(&world, owner)?;
        let coord = self
            .transform()
            .world_to_grid(island.center_x, island.center_z);
        if !self.is_within_bounds(coord) {
            return None;
        }

        let held_by_other = self
            .cells
            .get(&coord)
            .is_some_and(|cell| cell.is_occupied() && cell.owner() != Some(owner));
        let id_elsewhere = self
            .island_index
            .get(&island.id)
            .is_some_and(|at| *at != coord);
        if held_by_other || id_elsewhere {
            warn!(
                "Island {} of {owner} is centered in {coord} but the registry disagrees; not registering",
                island.id
            );
            return Some(coord);
        }

        let owner_name = self.owner_name(source.as_ref(), owner);
        self.occupy_cell(coord, owner, &owner_name, Some(&island.id));
        info!("Registered island {} of {owner_name} at {coord} from world lookup", island.id);
        Some(coord)
    }

    /// Registers the island centered exactly in `coord`, if the world has
    /// one with an owner and it isn't registered yet.
    pub fn register_island_at(&mut self, coord: GridCoordinate) -> bool {
        if !self.is_within_bounds(coord) {
            return false;
        }
        let Some((source, world)) = self.resolve_world() else {
            return false;
        };
        let transform = self.transform();
        let Some(island) = source.island_centered_in(&world, coord, &transform) else {
            return false;
        };
        let Some(owner) = island.owner else {
            return false;
        };
        if self.island_index.contains_key(&island.id) {
            debug!("Island {} at {coord} is already registered", island.id);
            return false;
        }
        if self.cells.get(&coord).is_some_and(|cell| cell.is_occupied()) {
            warn!(
                "Island {} is centered in {coord} but the cell is already occupied",
                island.id
            );
            return false;
        }

        let owner_name = self.owner_name(source.as_ref(), owner);
        self.occupy_cell(coord, owner, &owner_name, Some(&island.id));
        info!("Registered island {} of {owner_name} at {coord}", island.id);
        true
    }
}
