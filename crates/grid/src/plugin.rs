use std::sync::Arc;

use bevy::prelude::*;

use crate::events::GridEventListeners;
use crate::reconcile::ReconcileReport;
use crate::registry::GridRegistry;
use crate::settings::GridSettings;
use crate::source::IslandSource;
use crate::store::{CellStore, MemoryCellStore};

/// Ask for a full reconciliation pass on the next `Update`.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ReconcileRequest;

/// Result of the most recent reconciliation pass.
#[derive(Resource, Debug, Default, Clone)]
pub struct LastReconcileReport {
    pub report: Option<ReconcileReport>,
    pub runs: u32,
}

impl LastReconcileReport {
    fn record(&mut self, report: ReconcileReport) {
        self.report = Some(report);
        self.runs += 1;
    }
}

/// Inserts a `GridRegistry` wired to the given store and world source.
///
/// On `Startup` the registry loads the store and reconciles. Afterwards,
/// `ReconcileRequest` events trigger another pass, pending writes are polled
/// every frame, and everything is saved and flushed when the app exits.
pub struct GridPlugin {
    settings: GridSettings,
    store: Arc<dyn CellStore>,
    source: Option<Arc<dyn IslandSource>>,
}

impl GridPlugin {
    pub fn new(settings: GridSettings, store: Arc<dyn CellStore>) -> Self {
        Self {
            settings,
            store,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn IslandSource>) -> Self {
        self.source = Some(source);
        self
    }
}

impl Default for GridPlugin {
    fn default() -> Self {
        Self::new(GridSettings::default(), Arc::new(MemoryCellStore::new()))
    }
}

impl Plugin for GridPlugin {
    fn build(&self, app: &mut App) {
        let mut registry = GridRegistry::new(self.settings.clone(), Arc::clone(&self.store));
        if let Some(source) = &self.source {
            registry.attach_source(Arc::clone(source));
        }

        app.insert_resource(registry)
            .init_resource::<GridEventListeners>()
            .init_resource::<LastReconcileReport>()
            .add_event::<ReconcileRequest>()
            .add_systems(Startup, load_and_reconcile)
            .add_systems(
                Update,
                (handle_reconcile_requests, collect_persistence_results).chain(),
            )
            .add_systems(Last, flush_on_exit);
    }
}

pub fn load_and_reconcile(
    mut registry: ResMut<GridRegistry>,
    mut last: ResMut<LastReconcileReport>,
) {
    registry.load_from_store();
    let report = registry.reconcile();
    last.record(report);
}

pub fn handle_reconcile_requests(
    mut requests: EventReader<ReconcileRequest>,
    mut registry: ResMut<GridRegistry>,
    mut last: ResMut<LastReconcileReport>,
) {
    // several requests in one frame collapse into one pass
    if requests.read().count() == 0 {
        return;
    }
    let report = registry.reconcile();
    last.record(report);
}

/// Poll in-flight persistence writes and log any failures.
pub fn collect_persistence_results(mut registry: ResMut<GridRegistry>) {
    if registry.pending_persistence() == 0 {
        return;
    }
    let failures = registry.poll_persistence();
    if failures > 0 {
        warn!("{failures} grid cell writes failed this frame");
    }
}

pub fn flush_on_exit(mut exit: EventReader<AppExit>, mut registry: ResMut<GridRegistry>) {
    if exit.read().next().is_none() {
        return;
    }
    registry.save_all();
    let failures = registry.flush_persistence();
    if failures > 0 {
        error!("{failures} grid cell writes failed during shutdown");
    } else {
        info!("Grid state flushed");
    }
}
