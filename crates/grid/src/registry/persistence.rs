//! Ordered, non-blocking write-behind to a `CellStore`.
//!
//! Mutations queue an operation and return immediately. At most one batch is
//! in flight on `IoTaskPool` at a time, so operations reach the store in the
//! order they were queued and a stale upsert can never overtake a newer one.
//! Each batch goes to the store in one `apply_batch` call.
//! Failures are logged and dropped; the in-memory registry stays authoritative.

use std::sync::Arc;

use bevy::prelude::*;
use bevy::tasks::{block_on, IoTaskPool, Task, TaskPool};

use crate::store::{CellStore, CellWrite, StoreError};

type BatchErrors = Vec<(String, StoreError)>;

pub(crate) struct PersistenceQueue {
    store: Arc<dyn CellStore>,
    queued: Vec<CellWrite>,
    in_flight: Option<Task<BatchErrors>>,
}

impl PersistenceQueue {
    pub(crate) fn new(store: Arc<dyn CellStore>) -> Self {
        Self {
            store,
            queued: Vec::new(),
            in_flight: None,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn CellStore> {
        &self.store
    }

    pub(crate) fn push(&mut self, op: CellWrite) {
        self.queued.push(op);
        self.dispatch();
    }

    /// Operations not yet confirmed by the store.
    pub(crate) fn pending(&self) -> usize {
        self.queued.len() + usize::from(self.in_flight.is_some())
    }

    fn dispatch(&mut self) {
        if self.in_flight.is_some() || self.queued.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.queued);
        let store = Arc::clone(&self.store);
        let pool = IoTaskPool::get_or_init(TaskPool::new);
        self.in_flight = Some(pool.spawn(async move { store.apply_batch(batch) }));
    }

    /// Non-blocking. Returns how many writes failed in a batch that finished.
    pub(crate) fn poll(&mut self) -> usize {
        let mut failures = 0;
        if let Some(task) = self.in_flight.as_mut() {
            if let Some(errors) = block_on(futures_lite::future::poll_once(task)) {
                self.in_flight = None;
                failures = report(errors);
            }
        }
        self.dispatch();
        failures
    }

    /// Blocks until everything queued so far has reached the store.
    pub(crate) fn flush(&mut self) -> usize {
        let mut failures = 0;
        loop {
            if let Some(task) = self.in_flight.take() {
                failures += report(block_on(task));
            }
            if self.queued.is_empty() {
                break;
            }
            self.dispatch();
        }
        failures
    }
}

fn report(errors: BatchErrors) -> usize {
    for (key, e) in &errors {
        error!("Failed to persist grid cell {key}: {e}");
    }
    errors.len()
}
