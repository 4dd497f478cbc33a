//! Change notifications.
//!
//! Events are published after a write succeeds. Subscribers get a snapshot
//! of the new state axes, not the transition that caused them, and should
//! re-read the record when they need more.

use alignflow_ids::OkrId;
use alignflow_lifecycle::OkrStatus;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use tracing::debug;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An OKR was created or changed
    OkrSaved {
        okr_id: OkrId,
        status: OkrStatus,
        archived: bool,
    },

    /// An OKR was deleted
    OkrDeleted { okr_id: OkrId },
}

impl Event {
    pub fn okr_id(&self) -> &OkrId {
        match self {
            Event::OkrSaved { okr_id, .. } | Event::OkrDeleted { okr_id } => okr_id,
        }
    }
}

/// Fan-out of [`Event`]s to any number of channel subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn publish(&self, event: Event) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(subscribers) => subscribers,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.len() < before {
            debug!("Pruned {} closed event subscribers", before - subscribers.len());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subscribers) => subscribers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        let id = OkrId::new();

        bus.publish(Event::OkrDeleted { okr_id: id.clone() });

        assert_eq!(a.try_recv().unwrap().okr_id(), &id);
        assert_eq!(b.try_recv().unwrap().okr_id(), &id);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(Event::OkrSaved {
            okr_id: OkrId::new(),
            status: OkrStatus::Draft,
            archived: false,
        });

        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }
}
