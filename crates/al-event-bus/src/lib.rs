//! Event bus for the automatic lighting host
//!
//! Events are fanned out over `tokio::sync::broadcast` channels, one per
//! event type plus one for wildcard listeners. Firing never blocks and
//! never fails: an event nobody listens to is simply dropped.

use al_core::{Context, Event, EventType};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Receiver handed out by [`EventBus::subscribe`]
pub type EventReceiver = broadcast::Receiver<Event>;

pub struct EventBus {
    listeners: DashMap<EventType, broadcast::Sender<Event>>,
    match_all: broadcast::Sender<Event>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose per-type channels buffer `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all,
            capacity,
        }
    }

    /// Listen to one event type (`*` listens to everything)
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> EventReceiver {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all.subscribe();
        }

        self.listeners
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver an event to its type's listeners and to wildcard listeners
    pub fn fire(&self, event: Event) {
        debug!(event_type = %event.event_type, context_id = %event.context.id, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // send only fails when there are no receivers
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all.send(event);
    }

    /// Build and fire an event in one go
    pub fn fire_data(
        &self,
        event_type: impl Into<EventType>,
        data: serde_json::Value,
        context: Context,
    ) {
        self.fire(Event::new(event_type, data, context));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
