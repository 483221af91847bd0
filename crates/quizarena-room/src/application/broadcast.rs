//! Per-subscriber isolated fan-out of room events.
//!
//! Each subscriber owns a bounded channel. Publishing never waits: a
//! subscriber whose buffer is full, or whose receiver is gone, is dropped
//! and has to resubscribe to get the replay.

use std::collections::HashMap;
use std::sync::{Mutex, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::domain::room::RoomEvent;

/// Events buffered per subscriber before it is considered stalled.
pub const SUBSCRIBER_BUFFER: usize = 32;

/// Registered subscriber channels of one room.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<RoomEvent>>,
}

impl BroadcastHub {
    /// Registers a subscriber and queues `replay` ahead of any later event.
    pub(crate) fn register(&mut self, replay: Vec<RoomEvent>) -> (u64, mpsc::Receiver<RoomEvent>) {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        for event in replay {
            // A fresh channel holds the whole replay.
            let _ = sender.try_send(event);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.insert(id, sender);
        (id, receiver)
    }

    /// Delivers `event` to every live subscriber. Returns how many got it.
    pub(crate) fn publish(&mut self, event: &RoomEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = id, "subscriber buffer full; dropping subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.subscribers.remove(&id);
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<RoomEvent>,
    hub: Weak<Mutex<BroadcastHub>>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        receiver: mpsc::Receiver<RoomEvent>,
        hub: Weak<Mutex<BroadcastHub>>,
    ) -> Self {
        Self { id, receiver, hub }
    }

    /// Waits for the next event. `None` once the subscriber was dropped
    /// from the hub or the room is gone.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.receiver.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade()
            && let Ok(mut hub) = hub.lock()
        {
            hub.remove(self.id);
        }
    }
}
