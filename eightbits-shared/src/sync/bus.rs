//! # Shard event bus
//!
//! One [`ShardBus`] exists per shard and is handed to every component that
//! produces or consumes that shard's events. Delivery is synchronous and
//! run-to-completion: an event published while another is being delivered
//! waits in a queue until every subscriber has seen the current one.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::mem;

use tracing::trace;

use crate::models::{ShardEvent, ShardId};

/// Handle returned by [`ShardBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&ShardEvent)>;

pub struct ShardBus {
    shard_id: ShardId,
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber)>>,
    cancelled: RefCell<HashSet<SubscriptionId>>,
    queue: RefCell<VecDeque<ShardEvent>>,
    dispatching: Cell<bool>,
}

impl ShardBus {
    #[must_use]
    pub fn new(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            next_id: Cell::new(0),
            subscribers: RefCell::new(Vec::new()),
            cancelled: RefCell::new(HashSet::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    #[must_use]
    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    /// Registers `subscriber` for every event published after this call.
    pub fn subscribe(&self, subscriber: impl FnMut(&ShardEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers
            .borrow_mut()
            .push((id, Box::new(subscriber)));
        id
    }

    /// Stops delivery to `id`. Takes effect immediately, even when called
    /// from inside a subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
        if self.dispatching.get() {
            self.cancelled.borrow_mut().insert(id);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Delivers `event` to every subscriber, in subscription order.
    pub fn publish(&self, event: ShardEvent) {
        self.queue.borrow_mut().push_back(event);
        if self.dispatching.replace(true) {
            return;
        }

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            trace!(shard = %self.shard_id, kind = event.kind(), "dispatching");
            self.deliver(&event);
        }

        self.dispatching.set(false);
        self.cancelled.borrow_mut().clear();
    }

    fn deliver(&self, event: &ShardEvent) {
        // Subscribers may subscribe or unsubscribe while running, so the list
        // is taken out for the duration of the delivery.
        let mut active = mem::take(&mut *self.subscribers.borrow_mut());
        for (id, subscriber) in &mut active {
            if self.cancelled.borrow().contains(id) {
                continue;
            }
            subscriber(event);
        }

        let mut subscribers = self.subscribers.borrow_mut();
        let added = mem::replace(&mut *subscribers, active);
        subscribers.extend(added);
        let cancelled = self.cancelled.borrow();
        subscribers.retain(|(id, _)| !cancelled.contains(id));
    }
}

impl fmt::Debug for ShardBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardBus")
            .field("shard_id", &self.shard_id)
            .field("subscribers", &self.subscribers.borrow().len())
            .field("queued", &self.queue.borrow().len())
            .finish_non_exhaustive()
    }
}
