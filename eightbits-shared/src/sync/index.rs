use std::collections::HashMap;

use tracing::warn;

use crate::models::{Post, PostId, SequenceId};

/// What [`PostIndex::reconcile`] did with a re-delivered post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing new was learned.
    Unchanged,
    /// The stored post was pending and now carries this sequence id.
    Assigned(SequenceId),
    /// The delivery disagreed with an already assigned sequence id. The
    /// stored value wins.
    Conflict {
        kept: SequenceId,
        offered: SequenceId,
    },
}

/// Owner of every post seen on a shard, keyed by post id.
///
/// The index is the de-duplication authority: a post id maps to exactly one
/// stored post, and only the index may change a stored post.
#[derive(Debug, Default)]
pub struct PostIndex {
    posts: HashMap<PostId, Post>,
}

impl PostIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, post_id: &PostId) -> bool {
        self.posts.contains_key(post_id)
    }

    #[must_use]
    pub fn get(&self, post_id: &PostId) -> Option<&Post> {
        self.posts.get(post_id)
    }

    /// Stores a post seen for the first time.
    ///
    /// # Panics
    /// Panics if a post with the same id is already stored. Callers check
    /// [`PostIndex::contains`] first; a double insert is a bug in the caller.
    pub fn insert(&mut self, post: Post) {
        let post_id = post.post_id().clone();
        let previous = self.posts.insert(post_id.clone(), post);
        assert!(
            previous.is_none(),
            "post {post_id} inserted twice into the identity index"
        );
    }

    /// Folds a re-delivery of an already stored post into the stored copy.
    ///
    /// Returns [`Reconciliation::Unchanged`] when `post_id` is unknown.
    pub fn reconcile(&mut self, post_id: &PostId, incoming: &Post) -> Reconciliation {
        let (Some(stored), Some(offered)) = (self.posts.get_mut(post_id), incoming.sequence_id())
        else {
            return Reconciliation::Unchanged;
        };

        match stored.assign_sequence(offered) {
            Ok(()) => Reconciliation::Assigned(offered),
            Err(kept) if kept == offered => Reconciliation::Unchanged,
            Err(kept) => {
                warn!(
                    post_id = %post_id,
                    kept = %kept,
                    offered = %offered,
                    "ignoring conflicting sequence id for already sequenced post"
                );
                Reconciliation::Conflict { kept, offered }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn clear(&mut self) {
        self.posts.clear();
    }
}
