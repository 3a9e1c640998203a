//! Event bus
//!
//! Fan-out of decoded events to any number of independent subscribers. Each
//! subscriber owns a bounded channel and an optional category filter.
//! Publishing never blocks: if a subscriber's channel is full the event is
//! dropped for that subscriber only, so a slow consumer cannot stall the
//! delivery path or the other consumers.

use super::event::{Category, Event};
use crossbeam::channel;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub type SubscriptionId = u64;

/// Default per-subscriber queue length.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 1024;

struct Subscriber {
    categories: Option<Vec<Category>>,
    tx: channel::Sender<Event>,
}

impl Subscriber {
    fn wants(&self, category: Category) -> bool {
        match &self.categories {
            Some(cats) => cats.contains(&category),
            None => true,
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: SubscriptionId,
    map: HashMap<SubscriptionId, Subscriber>,
}

#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<Subscribers>>,
    queue_size: usize,
}

pub struct Subscription {
    id: SubscriptionId,
    rx: channel::Receiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn recv(&self) -> Result<Event, channel::RecvError> {
        self.rx.recv()
    }

    pub fn try_recv(&self) -> Result<Event, channel::TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Event, channel::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Everything currently queued, without blocking.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_SUBSCRIBER_QUEUE)
    }
}

impl EventBus {
    pub fn new(queue_size: usize) -> EventBus {
        EventBus {
            subscribers: Arc::new(RwLock::new(Subscribers::default())),
            queue_size: queue_size.max(1),
        }
    }

    fn add(&self, categories: Option<Vec<Category>>) -> Subscription {
        let (tx, rx) = channel::bounded(self.queue_size);
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.map.insert(id, Subscriber { categories, tx });
        Subscription { id, rx }
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&self) -> Subscription {
        self.add(None)
    }

    /// Subscribe to the given categories only.
    pub fn subscribe(&self, categories: &[Category]) -> Subscription {
        self.add(Some(categories.to_vec()))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    pub fn publish(&self, event: Event) {
        let category = event.category();
        let mut gone = vec![];
        {
            let subs = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for (id, sub) in subs.map.iter() {
                if !sub.wants(category) {
                    continue;
                }
                match sub.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(channel::TrySendError::Full(_)) => {
                        tracing::debug!(subscriber = id, ?category, "subscriber queue full, event dropped");
                    }
                    Err(channel::TrySendError::Disconnected(_)) => gone.push(*id),
                }
            }
        }
        if !gone.is_empty() {
            let mut subs = self
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for id in gone {
                subs.map.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::event::{MentalCommandEvent, TransportEvent};

    fn command(device: &str) -> Event {
        Event::Command(MentalCommandEvent {
            device: device.to_string(),
            label: "push".to_string(),
            power: 0.8,
            time: 1.0,
        })
    }

    #[test]
    fn every_subscriber_gets_its_own_copy() {
        let bus = EventBus::new(8);
        let a = bus.subscribe_all();
        let b = bus.subscribe_all();
        bus.publish(command("A"));
        assert_eq!(a.try_recv().unwrap(), command("A"));
        assert_eq!(b.try_recv().unwrap(), command("A"));
    }

    #[test]
    fn category_filter() {
        let bus = EventBus::new(8);
        let transport = bus.subscribe(&[Category::Transport]);
        bus.publish(command("A"));
        bus.publish(Event::Transport(TransportEvent::Closed));
        assert_eq!(transport.drain(), vec![Event::Transport(TransportEvent::Closed)]);
    }

    #[test]
    fn full_subscriber_does_not_block_others() {
        let bus = EventBus::new(1);
        let slow = bus.subscribe_all();
        let fast = bus.subscribe_all();
        bus.publish(command("A"));
        assert!(fast.try_recv().is_ok());
        bus.publish(command("B"));
        assert_eq!(fast.try_recv().unwrap(), command("B"));
        // slow kept only the first one
        assert_eq!(slow.drain(), vec![command("A")]);
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let bus = EventBus::new(4);
        let a = bus.subscribe_all();
        drop(bus.subscribe_all());
        assert_eq!(bus.subscriber_count(), 2);
        bus.publish(command("A"));
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(a.id());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
