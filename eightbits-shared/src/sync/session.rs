//! # Shard session
//!
//! [`PostSync`] wires one shard's [`ShardBus`] to a [`Timeline`], a
//! [`BackfillGate`] and the surface posts are drawn on. Inbound events are
//! routed to the merge engine; outbound requests and change notifications
//! are published back on the same bus once the state borrow is released.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use super::backfill::{BackfillGate, BackfillState};
use super::bus::{ShardBus, SubscriptionId};
use super::index::Reconciliation;
use super::scroll::{PostSurface, should_backfill};
use super::timeline::{MergeOutcome, Timeline};
use crate::config::SyncConfig;
use crate::models::{Post, SequenceId, ShardEvent, TimelineChange};

struct SyncState<S> {
    timeline: Timeline,
    gate: BackfillGate,
    surface: S,
    page_size: u32,
}

impl<S: PostSurface> SyncState<S> {
    fn handle(&mut self, event: &ShardEvent) -> Vec<ShardEvent> {
        if let Some(post) = event.live_post() {
            return self.merge_live(post.clone());
        }
        match event {
            ShardEvent::HistoricalPostsReceived { generation, posts } => {
                if self.is_stale(event, *generation) {
                    return Vec::new();
                }
                self.merge_history(posts.clone())
            }
            ShardEvent::HistoryRequestFailed { generation } => {
                if !self.is_stale(event, *generation) {
                    self.gate.fail();
                }
                Vec::new()
            }
            ShardEvent::ConnectionReestablishing => self.rebuild(),
            _ => Vec::new(),
        }
    }

    /// Replies to a request that was abandoned must not touch the timeline:
    /// after a reset they would land above the fresh page.
    fn is_stale(&self, event: &ShardEvent, generation: u64) -> bool {
        if self.gate.accepts(generation) {
            return false;
        }
        debug!(
            shard = %self.timeline.shard_id(),
            event = event.kind(),
            generation,
            expected = ?self.gate.state().in_flight(),
            "ignoring reply to an abandoned history request"
        );
        true
    }

    fn merge_live(&mut self, post: Post) -> Vec<ShardEvent> {
        let post_id = post.post_id().clone();
        match self.timeline.merge_one(post, &mut self.surface) {
            MergeOutcome::Appended { .. } => {
                vec![ShardEvent::TimelineChanged(TimelineChange::Appended(post_id))]
            }
            MergeOutcome::Duplicate(Reconciliation::Assigned(sequence)) => {
                vec![ShardEvent::TimelineChanged(TimelineChange::SequenceAssigned(
                    post_id, sequence,
                ))]
            }
            MergeOutcome::Duplicate(_) => Vec::new(),
        }
    }

    fn merge_history(&mut self, posts: Vec<Post>) -> Vec<ShardEvent> {
        let outcome = self.timeline.merge_page(posts, &mut self.surface);
        self.gate
            .complete(outcome.inserted, self.timeline.lowest_sequence());
        if outcome.inserted == 0 {
            return Vec::new();
        }
        vec![ShardEvent::TimelineChanged(TimelineChange::Prepended(
            outcome.inserted,
        ))]
    }

    fn rebuild(&mut self) -> Vec<ShardEvent> {
        info!(shard = %self.timeline.shard_id(), "connection re-established, rebuilding timeline");
        self.timeline.reset(&mut self.surface);
        self.gate.reset();
        let mut events = vec![ShardEvent::TimelineChanged(TimelineChange::Cleared)];
        events.extend(self.request(0));
        events
    }

    fn request(&mut self, end: u64) -> Option<ShardEvent> {
        self.gate
            .try_begin(end, self.page_size)
            .map(ShardEvent::RequestHistoricalPosts)
    }

    fn older_page(&mut self) -> Option<ShardEvent> {
        let end = self.timeline.lowest_sequence().map_or(0, SequenceId::get);
        self.request(end)
    }
}

/// Live synchronization of one shard.
///
/// Dropping the handle unsubscribes it from the bus.
pub struct PostSync<S: PostSurface> {
    state: Rc<RefCell<SyncState<S>>>,
    bus: Rc<ShardBus>,
    subscription: SubscriptionId,
}

impl<S: PostSurface + 'static> PostSync<S> {
    /// Subscribes a new session for `bus`'s shard, rendering onto `surface`.
    #[must_use]
    pub fn attach(bus: Rc<ShardBus>, surface: S, config: &SyncConfig) -> Self {
        let state = Rc::new(RefCell::new(SyncState {
            timeline: Timeline::new(bus.shard_id().clone(), config.bottom_tolerance_px),
            gate: BackfillGate::new(),
            surface,
            page_size: config.history_page_size,
        }));

        let weak_state: Weak<RefCell<SyncState<S>>> = Rc::downgrade(&state);
        let weak_bus = Rc::downgrade(&bus);
        let subscription = bus.subscribe(move |event| {
            if event.is_outbound() {
                return;
            }
            let (Some(state), Some(bus)) = (weak_state.upgrade(), weak_bus.upgrade()) else {
                return;
            };
            let outbound = state.borrow_mut().handle(event);
            for event in outbound {
                bus.publish(event);
            }
        });

        debug!(shard = %bus.shard_id(), "post sync attached");
        Self {
            state,
            bus,
            subscription,
        }
    }

    fn publish(&self, event: Option<ShardEvent>) {
        if let Some(event) = event {
            self.bus.publish(event);
        }
    }

    /// Requests the most recent page of the shard.
    pub fn start(&self) {
        let request = self.state.borrow_mut().request(0);
        if request.is_none() {
            debug!(shard = %self.bus.shard_id(), "initial page already requested");
        }
        self.publish(request);
    }

    /// Call whenever the surface scrolled. Requests the next older page when
    /// the reader reached the top and no request is outstanding.
    pub fn on_scroll(&self) {
        let request = {
            let mut state = self.state.borrow_mut();
            // A stalled request is only re-issued by `retry_backfill`.
            if matches!(state.gate.state(), BackfillState::Stalled { .. })
                || !should_backfill(state.surface.geometry())
            {
                return;
            }
            state.older_page()
        };
        self.publish(request);
    }

    /// Re-issues the history request that failed.
    pub fn retry_backfill(&self) {
        let request = {
            let mut state = self.state.borrow_mut();
            if !matches!(state.gate.state(), BackfillState::Stalled { .. }) {
                warn!(shard = %self.bus.shard_id(), "retry requested without a stalled backfill");
                return;
            }
            state.older_page()
        };
        self.publish(request);
    }

    #[must_use]
    pub fn bus(&self) -> &Rc<ShardBus> {
        &self.bus
    }

    /// Read access to the merged timeline.
    ///
    /// # Panics
    /// Panics if called while the session is handling an event, which only
    /// happens when a surface calls back into its own session.
    #[must_use]
    pub fn timeline(&self) -> Ref<'_, Timeline> {
        Ref::map(self.state.borrow(), |state| &state.timeline)
    }

    #[must_use]
    pub fn backfill_state(&self) -> BackfillState {
        self.state.borrow().gate.state()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Post> {
        self.state.borrow().timeline.snapshot()
    }

    /// Runs `f` with the surface, for scrolling it or reading what it shows.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.state.borrow_mut().surface)
    }
}

impl<S: PostSurface> Drop for PostSync<S> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}
