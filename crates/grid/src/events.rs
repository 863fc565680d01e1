//! Cancelable domain events.
//!
//! Each event is immutable data. Listeners receive it alongside a mutable
//! `EventOutcome` and run in registration order. Every listener runs even
//! after one cancels, and the flag left by the last writer decides. The
//! initiating code must abort without state changes when the outcome is
//! cancelled and surface the reason to the player.

use bevy::prelude::*;
use uuid::Uuid;

use crate::coordinate::GridCoordinate;
use crate::transform::CoordinateTransform;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOutcome {
    cancelled: bool,
    reason: Option<String>,
}

impl EventOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    /// Setting a reason also cancels.
    pub fn cancel_with_reason(&mut self, reason: impl Into<String>) {
        self.cancelled = true;
        self.reason = Some(reason.into());
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_allowed(&self) -> bool {
        !self.cancelled
    }
}

/// Fired after a player confirms a new island placement, before the island
/// is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimEvent {
    pub player: Uuid,
    pub coordinate: GridCoordinate,
    pub world_x: i32,
    pub world_z: i32,
}

impl ClaimEvent {
    pub fn new(player: Uuid, coordinate: GridCoordinate, transform: &CoordinateTransform) -> Self {
        let (world_x, world_z) = transform.grid_to_world(coordinate);
        Self {
            player,
            coordinate,
            world_x,
            world_z,
        }
    }
}

/// Fired after a relocation is confirmed, before anything is copied or
/// any player is teleported.
#[derive(Debug, Clone, PartialEq)]
pub struct RelocateEvent {
    pub player: Uuid,
    pub from: GridCoordinate,
    pub to: GridCoordinate,
    pub from_world: (i32, i32),
    pub to_world: (i32, i32),
    pub cost: f64,
}

impl RelocateEvent {
    pub fn new(
        player: Uuid,
        from: GridCoordinate,
        to: GridCoordinate,
        cost: f64,
        transform: &CoordinateTransform,
    ) -> Self {
        Self {
            player,
            from,
            to,
            from_world: transform.grid_to_world(from),
            to_world: transform.grid_to_world(to),
            cost,
        }
    }

    pub fn is_free(&self) -> bool {
        self.cost == 0.0
    }
}

/// Fired after a slot switch is confirmed, before build data is saved or
/// loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSwitchEvent {
    pub player: Uuid,
    pub from_slot: u32,
    pub to_slot: u32,
    pub from_slot_name: String,
    pub to_slot_name: String,
}

pub type Listener<E> = Box<dyn Fn(&E, &mut EventOutcome) + Send + Sync>;

/// Ordered listeners for one event type.
pub struct ListenerChain<E> {
    name: &'static str,
    listeners: Vec<Listener<E>>,
}

impl<E> ListenerChain<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: impl Fn(&E, &mut EventOutcome) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn fire(&self, event: &E) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        for listener in &self.listeners {
            listener(event, &mut outcome);
        }
        if outcome.cancelled {
            info!(
                "{} event cancelled: {}",
                self.name,
                outcome.reason.as_deref().unwrap_or("no reason given")
            );
        } else {
            // a later listener un-cancelled; the earlier reason no longer applies
            outcome.reason = None;
        }
        outcome
    }
}

/// One listener chain per domain event.
#[derive(Resource)]
pub struct GridEventListeners {
    pub claim: ListenerChain<ClaimEvent>,
    pub relocate: ListenerChain<RelocateEvent>,
    pub slot_switch: ListenerChain<SlotSwitchEvent>,
}

impl Default for GridEventListeners {
    fn default() -> Self {
        Self {
            claim: ListenerChain::new("claim"),
            relocate: ListenerChain::new("relocate"),
            slot_switch: ListenerChain::new("slot switch"),
        }
    }
}

impl GridEventListeners {
    pub fn fire_claim(&self, event: &ClaimEvent) -> EventOutcome {
        self.claim.fire(event)
    }

    pub fn fire_relocate(&self, event: &RelocateEvent) -> EventOutcome {
        self.relocate.fire(event)
    }

    pub fn fire_slot_switch(&self, event: &SlotSwitchEvent) -> EventOutcome {
        self.slot_switch.fire(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn claim() -> ClaimEvent {
        ClaimEvent::new(
            Uuid::new_v4(),
            GridCoordinate::new(2, -1),
            &CoordinateTransform::new(800),
        )
    }

    #[test]
    fn test_claim_event_world_position() {
        let e = claim();
        assert_eq!((e.world_x, e.world_z), (1600, -800));
    }

    #[test]
    fn test_relocate_is_free() {
        let t = CoordinateTransform::new(100);
        let p = Uuid::new_v4();
        let free = RelocateEvent::new(p, GridCoordinate::new(0, 0), GridCoordinate::new(1, 1), 0.0, &t);
        let paid = RelocateEvent::new(p, GridCoordinate::new(0, 0), GridCoordinate::new(1, 1), 5.0, &t);
        assert!(free.is_free());
        assert!(!paid.is_free());
        assert_eq!(paid.to_world, (100, 100));
    }

    #[test]
    fn test_no_listeners_allows() {
        let listeners = GridEventListeners::default();
        let outcome = listeners.fire_claim(&claim());
        assert!(outcome.is_allowed());
        assert_eq!(outcome.reason(), None);
    }

    #[test]
    fn test_cancel_with_reason_sets_flag() {
        let mut outcome = EventOutcome::default();
        outcome.cancel_with_reason("not enough coins");
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.reason(), Some("not enough coins"));
    }

    #[test]
    fn test_all_listeners_run_after_cancel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = ListenerChain::<ClaimEvent>::new("claim");
        let c = Arc::clone(&calls);
        chain.register(move |_, outcome| {
            c.fetch_add(1, Ordering::SeqCst);
            outcome.cancel_with_reason("region protected");
        });
        let c = Arc::clone(&calls);
        chain.register(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = chain.fire(&claim());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.reason(), Some("region protected"));
    }

    #[test]
    fn test_last_writer_wins() {
        let mut chain = ListenerChain::<SlotSwitchEvent>::new("slot switch");
        chain.register(|_, outcome| outcome.cancel_with_reason("cooldown"));
        chain.register(|_, outcome| outcome.set_cancelled(false));
        let event = SlotSwitchEvent {
            player: Uuid::new_v4(),
            from_slot: 1,
            to_slot: 2,
            from_slot_name: "main".into(),
            to_slot_name: "farm".into(),
        };
        let outcome = chain.fire(&event);
        assert!(outcome.is_allowed());
        assert_eq!(outcome.reason(), None);
    }

    #[test]
    fn test_listener_sees_event_data() {
        let mut listeners = GridEventListeners::default();
        listeners.relocate.register(|event: &RelocateEvent, outcome| {
            if !event.is_free() && event.cost > 1_000.0 {
                outcome.cancel_with_reason("too expensive");
            }
        });
        let t = CoordinateTransform::new(800);
        let p = Uuid::new_v4();
        let cheap = RelocateEvent::new(p, GridCoordinate::new(0, 0), GridCoordinate::new(0, 1), 10.0, &t);
        let pricey = RelocateEvent::new(p, GridCoordinate::new(0, 0), GridCoordinate::new(0, 1), 5_000.0, &t);
        assert!(listeners.fire_relocate(&cheap).is_allowed());
        assert_eq!(listeners.fire_relocate(&pricey).reason(), Some("too expensive"));
        assert_eq!(listeners.relocate.len(), 1);
    }
}
