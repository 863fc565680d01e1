//! Per-coordinate occupancy and reservation state.
//!
//! `GridCell` fields are private and its mutators are crate-visible only, so
//! every state change goes through `GridRegistry`, which keeps the reverse
//! indices and persistence in step with the cell.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinate::GridCoordinate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellStatus {
    /// Empty and claimable.
    #[default]
    Available,
    /// Holds an island with an owner.
    Occupied,
    /// Admin-held, either blocked or purchasable.
    Reserved,
    /// Outside the current grid bounds. Only ever synthesized by a status
    /// query, never stored.
    Locked,
}

impl CellStatus {
    pub const ALL: [CellStatus; 4] = [
        CellStatus::Available,
        CellStatus::Occupied,
        CellStatus::Reserved,
        CellStatus::Locked,
    ];

    /// Stable upper-case name used in persisted records.
    pub fn name(self) -> &'static str {
        match self {
            CellStatus::Available => "AVAILABLE",
            CellStatus::Occupied => "OCCUPIED",
            CellStatus::Reserved => "RESERVED",
            CellStatus::Locked => "LOCKED",
        }
    }

    /// Unknown names fall back to `Available` instead of failing a load.
    pub fn parse_or_default(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|status| status.name() == name.trim())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    coordinate: GridCoordinate,
    status: CellStatus,
    owner: Option<Uuid>,
    owner_name: Option<String>,
    island_id: Option<String>,
    reserved: bool,
    blocked: bool,
    purchase_price: f64,
}

impl GridCell {
    pub(crate) fn new(coordinate: GridCoordinate) -> Self {
        Self {
            coordinate,
            status: CellStatus::Available,
            owner: None,
            owner_name: None,
            island_id: None,
            reserved: false,
            blocked: false,
            purchase_price: 0.0,
        }
    }

    pub fn coordinate(&self) -> GridCoordinate {
        self.coordinate
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner_name.as_deref()
    }

    pub fn island_id(&self) -> Option<&str> {
        self.island_id.as_deref()
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn purchase_price(&self) -> f64 {
        self.purchase_price
    }

    pub fn is_occupied(&self) -> bool {
        self.status == CellStatus::Occupied
    }

    pub fn is_available(&self) -> bool {
        self.status == CellStatus::Available && !self.reserved
    }

    pub fn is_purchasable(&self) -> bool {
        self.reserved && !self.blocked && self.purchase_price > 0.0
    }

    // -----------------------------------------------------------------------
    // Mutators (registry only)
    // -----------------------------------------------------------------------

    pub(crate) fn set_status(&mut self, status: CellStatus) {
        self.status = status;
    }

    /// `true` forces `Reserved`; `false` leaves the status alone.
    pub(crate) fn set_reserved(&mut self, reserved: bool) {
        self.reserved = reserved;
        if reserved {
            self.status = CellStatus::Reserved;
        }
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// A positive price makes the cell purchasable, so it unblocks it.
    /// Negative and NaN prices are stored as 0.
    pub(crate) fn set_purchase_price(&mut self, price: f64) {
        self.purchase_price = if price > 0.0 { price } else { 0.0 };
        if self.purchase_price > 0.0 {
            self.blocked = false;
        }
    }

    pub(crate) fn set_owner(&mut self, owner: Option<Uuid>, owner_name: Option<String>) {
        self.owner = owner;
        self.owner_name = owner_name;
    }

    pub(crate) fn set_island_id(&mut self, island_id: Option<String>) {
        self.island_id = island_id;
    }

    /// Occupation supersedes any reservation.
    pub(crate) fn occupy(&mut self, owner: Uuid, owner_name: &str, island_id: Option<&str>) {
        self.owner = Some(owner);
        self.owner_name = Some(owner_name.to_string());
        self.island_id = island_id.map(str::to_string);
        self.status = CellStatus::Occupied;
        self.reserved = false;
        self.blocked = false;
        self.purchase_price = 0.0;
    }

    /// Drops owner and island, keeps reservation fields.
    pub(crate) fn clear(&mut self) {
        self.owner = None;
        self.owner_name = None;
        self.island_id = None;
        self.status = CellStatus::Available;
    }
}
