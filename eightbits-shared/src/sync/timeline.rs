//! # Timeline
//!
//! The ordering/merge engine for one shard.
//!
//! Live posts (pushed, locally submitted, acknowledged, roster) are assumed
//! newer than anything on screen and are appended. Historical pages are
//! sorted newest first and each unseen post is prepended, which leaves the
//! page in oldest-to-newest order above what was already shown. Both paths
//! are idempotent on the post id, so arrivals may interleave freely.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use super::index::{PostIndex, Reconciliation};
use super::scroll::{PostSurface, follow_bottom, preserve_position};
use crate::models::{Post, PostId, SequenceId, ShardId};

/// Result of merging a single live post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The post was new and now sits at the bottom of the timeline.
    Appended {
        /// Whether the viewport was moved to keep showing the newest post.
        followed_bottom: bool,
    },
    /// The post was already known; see the reconciliation for what changed.
    Duplicate(Reconciliation),
}

/// Result of merging a page of historical posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageOutcome {
    /// Posts added to the top of the timeline.
    pub inserted: usize,
    /// Posts already present and therefore ignored.
    pub skipped: usize,
    /// Entries dropped because they carried no sequence id.
    pub unsequenced: usize,
}

/// Ordered, de-duplicated view of a shard's posts.
#[derive(Debug)]
pub struct Timeline {
    shard_id: ShardId,
    index: PostIndex,
    order: VecDeque<PostId>,
    lowest_sequence: Option<SequenceId>,
    highest_sequence: Option<SequenceId>,
    bottom_tolerance: i32,
}

impl Timeline {
    /// Creates an empty timeline. `bottom_tolerance` is how many pixels short
    /// of the bottom still count as "caught up" for auto-scrolling.
    #[must_use]
    pub fn new(shard_id: ShardId, bottom_tolerance: i32) -> Self {
        Self {
            shard_id,
            index: PostIndex::new(),
            order: VecDeque::new(),
            lowest_sequence: None,
            highest_sequence: None,
            bottom_tolerance: bottom_tolerance.max(0),
        }
    }

    /// Merges one live post.
    pub fn merge_one<S>(&mut self, post: Post, surface: &mut S) -> MergeOutcome
    where
        S: PostSurface + ?Sized,
    {
        self.observe(post.sequence_id());

        let post_id = post.post_id().clone();
        if self.index.contains(&post_id) {
            let reconciliation = self.index.reconcile(&post_id, &post);
            if let Reconciliation::Assigned(sequence) = reconciliation {
                debug!(shard = %self.shard_id, post_id = %post_id, sequence = %sequence, "post sequenced");
                if let Some(stored) = self.index.get(&post_id) {
                    surface.refresh(stored);
                }
            }
            return MergeOutcome::Duplicate(reconciliation);
        }

        let before = surface.geometry();
        surface.append(&post);
        self.order.push_back(post_id.clone());
        self.index.insert(post);
        let after = surface.geometry();

        let target = follow_bottom(before, after, self.bottom_tolerance);
        if let Some(offset) = target {
            trace!(shard = %self.shard_id, offset, "following bottom");
            surface.set_offset(offset);
        }

        debug!(shard = %self.shard_id, post_id = %post_id, "post appended");
        MergeOutcome::Appended {
            followed_bottom: target.is_some(),
        }
    }

    /// Merges a page of historical posts.
    pub fn merge_page<S>(&mut self, posts: Vec<Post>, surface: &mut S) -> PageOutcome
    where
        S: PostSurface + ?Sized,
    {
        let mut outcome = PageOutcome::default();
        if posts.is_empty() {
            return outcome;
        }

        let (mut page, unsequenced): (Vec<Post>, Vec<Post>) =
            posts.into_iter().partition(|post| post.sequence_id().is_some());
        for post in &unsequenced {
            warn!(
                shard = %self.shard_id,
                post_id = %post.post_id(),
                "dropping historical post without a sequence id"
            );
        }
        outcome.unsequenced = unsequenced.len();

        page.sort_by(|a, b| b.sequence_id().cmp(&a.sequence_id()));
        // Newest first, so the last entry holds the page minimum.
        self.observe(page.first().and_then(Post::sequence_id));
        self.observe(page.last().and_then(Post::sequence_id));

        for post in page {
            if self.index.contains(post.post_id()) {
                outcome.skipped += 1;
                continue;
            }

            let before = surface.geometry();
            surface.prepend(&post);
            let after = surface.geometry();
            let offset = preserve_position(before, after);
            trace!(shard = %self.shard_id, offset, "preserving position");
            surface.set_offset(offset);

            self.order.push_front(post.post_id().clone());
            self.index.insert(post);
            outcome.inserted += 1;
        }

        debug!(
            shard = %self.shard_id,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            unsequenced = outcome.unsequenced,
            lowest = ?self.lowest_sequence,
            "history page merged"
        );
        outcome
    }

    /// Forgets every post. Used when the connection was down long enough
    /// that the view must be rebuilt from scratch.
    pub fn reset<S>(&mut self, surface: &mut S)
    where
        S: PostSurface + ?Sized,
    {
        self.index.clear();
        self.order.clear();
        self.lowest_sequence = None;
        self.highest_sequence = None;
        surface.clear();
        debug!(shard = %self.shard_id, "timeline reset");
    }

    fn observe(&mut self, sequence: Option<SequenceId>) {
        let Some(sequence) = sequence else {
            return;
        };
        if self.lowest_sequence.is_none_or(|lowest| sequence < lowest) {
            self.lowest_sequence = Some(sequence);
        }
        if self.highest_sequence.is_none_or(|highest| sequence > highest) {
            self.highest_sequence = Some(sequence);
        }
    }

    #[must_use]
    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    /// Smallest sequence id seen so far; the next history page ends here.
    #[must_use]
    pub fn lowest_sequence(&self) -> Option<SequenceId> {
        self.lowest_sequence
    }

    /// Largest sequence id seen so far.
    #[must_use]
    pub fn highest_sequence(&self) -> Option<SequenceId> {
        self.highest_sequence
    }

    #[must_use]
    pub fn get(&self, post_id: &PostId) -> Option<&Post> {
        self.index.get(post_id)
    }

    #[must_use]
    pub fn contains(&self, post_id: &PostId) -> bool {
        self.index.contains(post_id)
    }

    /// Visible posts, top to bottom.
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.order.iter().filter_map(|post_id| self.index.get(post_id))
    }

    /// Owned copy of the visible posts, top to bottom.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Post> {
        self.posts().cloned().collect()
    }

    /// Visible post ids, top to bottom.
    pub fn post_ids(&self) -> impl Iterator<Item = &PostId> {
        self.order.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
