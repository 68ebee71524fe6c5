//! In-process message bus
//!
//! Every inbound message is offered to subscribers in registration order until one
//! claims it. Subscribers are held weakly; a dropped subscriber is skipped and pruned.

use liveconnect_core::BridgeError;
use liveconnect_transport::Message;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Something that may claim messages from the bus
pub trait Subscriber: Send + Sync {
    /// Offer `message`; return `true` to consume it and stop delivery
    ///
    /// Runs on the delivering thread and must not block.
    fn new_message_on_bus(&self, message: &Message) -> bool;

    /// The bus was shut down; no further messages will arrive
    fn on_bus_closed(&self, _reason: &BridgeError) {}
}

/// Ordered publish/subscribe with first-consumer-wins delivery
pub struct MessageBus {
    subscribers: Mutex<Vec<Weak<dyn Subscriber>>>,
    delivery: Mutex<()>,
    closed: Mutex<Option<BridgeError>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
            closed: Mutex::new(None),
        }
    }

    /// Append a subscriber
    ///
    /// If the bus is already closed the subscriber is told so immediately.
    pub fn subscribe(&self, subscriber: &Arc<dyn Subscriber>) {
        let closed = self.closed.lock();
        if let Some(reason) = closed.clone() {
            drop(closed);
            subscriber.on_bus_closed(&reason);
            return;
        }
        self.subscribers.lock().push(Arc::downgrade(subscriber));
    }

    /// Remove a subscriber (and any dead entries); absent subscribers are ignored
    pub fn unsubscribe(&self, subscriber: &Arc<dyn Subscriber>) {
        let target = Arc::as_ptr(subscriber);
        self.subscribers
            .lock()
            .retain(|entry| entry.strong_count() > 0 && !std::ptr::addr_eq(entry.as_ptr(), target));
    }

    /// Deliver `message`, returning whether a subscriber consumed it
    pub fn post(&self, message: &Message) -> bool {
        let _delivery = self.delivery.lock();
        // Snapshot so subscribers may (un)subscribe from inside the callback.
        let snapshot: Vec<Arc<dyn Subscriber>> = self
            .subscribers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        for subscriber in snapshot {
            if subscriber.new_message_on_bus(message) {
                return true;
            }
        }
        tracing::warn!(
            scope = %message.scope,
            scope_id = message.scope_id,
            reference = message.reference,
            command = %message.command,
            "no subscriber consumed message"
        );
        false
    }

    /// Close the bus and notify every live subscriber
    ///
    /// Later subscribers are notified on subscribe. Only the first reason is kept.
    pub fn shutdown(&self, reason: BridgeError) {
        let drained: Vec<Arc<dyn Subscriber>> = {
            let mut closed = self.closed.lock();
            if closed.is_some() {
                return;
            }
            *closed = Some(reason.clone());
            self.subscribers
                .lock()
                .drain(..)
                .filter_map(|entry| entry.upgrade())
                .collect()
        };
        tracing::debug!(subscribers = drained.len(), %reason, "message bus closed");
        for subscriber in drained {
            subscriber.on_bus_closed(&reason);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.lock().is_some()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
