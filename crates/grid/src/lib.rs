pub mod cell;
pub mod coordinate;
pub mod events;
pub mod plugin;
pub mod reconcile;
pub mod registry;
pub mod settings;
pub mod source;
pub mod store;
pub mod transform;

#[cfg(test)]
mod integration_tests;
#[cfg(any(test, feature = "bench"))]
pub mod test_harness;

pub use cell::{CellStatus, GridCell};
pub use coordinate::GridCoordinate;
pub use events::{
    ClaimEvent, EventOutcome, GridEventListeners, ListenerChain, RelocateEvent, SlotSwitchEvent,
};
pub use plugin::{GridPlugin, LastReconcileReport, ReconcileRequest};
pub use reconcile::{ReconcileOutcome, ReconcileReport};
pub use registry::{GridRegistry, MAX_NEIGHBORHOOD_RADIUS};
pub use settings::{BoundsError, Direction, GridBounds, GridSettings, SettingsError};
pub use source::{IslandInfo, IslandSource, SourceError, StaticIslandSource, WorldHandle};
pub use store::{CellRecord, CellStore, CellWrite, MemoryCellStore, StoreError};
pub use transform::CoordinateTransform;
