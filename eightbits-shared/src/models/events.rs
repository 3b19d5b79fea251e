use super::envelope::HistoryRequest;
use super::post::{Post, PostId, SequenceId};

/// Change notification for whatever renders a shard's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineChange {
    /// A post was added at the bottom.
    Appended(PostId),
    /// This many older posts were added at the top.
    Prepended(usize),
    /// A pending post received its sequence id.
    SequenceAssigned(PostId, SequenceId),
    /// The timeline was emptied.
    Cleared,
}

/// Everything that travels over a shard's event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEvent {
    /// A post pushed over the live channel.
    PostReceived(Post),
    /// The local user's post, shown before the server acknowledges it.
    SubmittedPostSent(Post),
    /// The server's echo of a local post, usually carrying its sequence id.
    SubmittedPostReceived(Post),
    /// A synthesized roster or system post.
    RosterReceived(Post),
    /// A page of older posts, in whatever order the transport produced,
    /// answering the request of the same `generation`.
    HistoricalPostsReceived { generation: u64, posts: Vec<Post> },
    /// The transport lost the channel for long enough that the view is stale.
    ConnectionReestablishing,
    /// The transport gave up on the history request of `generation`.
    HistoryRequestFailed { generation: u64 },
    /// Ask the transport for older posts.
    RequestHistoricalPosts(HistoryRequest),
    /// The visible timeline changed.
    TimelineChanged(TimelineChange),
}

impl ShardEvent {
    /// Stable name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PostReceived(_) => "post_received",
            Self::SubmittedPostSent(_) => "submitted_post_sent",
            Self::SubmittedPostReceived(_) => "submitted_post_received",
            Self::RosterReceived(_) => "roster_received",
            Self::HistoricalPostsReceived { .. } => "historical_posts_received",
            Self::ConnectionReestablishing => "connection_reestablishing",
            Self::HistoryRequestFailed { .. } => "history_request_failed",
            Self::RequestHistoricalPosts(_) => "request_historical_posts",
            Self::TimelineChanged(_) => "timeline_changed",
        }
    }

    /// The single post carried by a live event, if this is one.
    #[must_use]
    pub fn live_post(&self) -> Option<&Post> {
        match self {
            Self::PostReceived(post)
            | Self::SubmittedPostSent(post)
            | Self::SubmittedPostReceived(post)
            | Self::RosterReceived(post) => Some(post),
            _ => None,
        }
    }

    /// Whether the event was produced by the sync engine rather than the
    /// transport.
    #[must_use]
    pub const fn is_outbound(&self) -> bool {
        matches!(
            self,
            Self::RequestHistoricalPosts(_) | Self::TimelineChanged(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveType, ShardId};

    fn post() -> Post {
        Post::new(
            ShardId::from("lobby"),
            PostId::new("p1").unwrap(),
            ArchiveType::Chat,
        )
    }

    #[test]
    fn live_events_expose_their_post() {
        for event in [
            ShardEvent::PostReceived(post()),
            ShardEvent::SubmittedPostSent(post()),
            ShardEvent::SubmittedPostReceived(post()),
            ShardEvent::RosterReceived(post()),
        ] {
            assert_eq!(event.live_post().map(Post::post_id), Some(post().post_id()));
            assert!(!event.is_outbound());
        }
        assert!(ShardEvent::HistoricalPostsReceived {
            generation: 1,
            posts: vec![post()]
        }
        .live_post()
        .is_none());
    }

    #[test]
    fn outbound_events_are_flagged() {
        assert!(ShardEvent::RequestHistoricalPosts(HistoryRequest::default()).is_outbound());
        assert!(ShardEvent::TimelineChanged(TimelineChange::Cleared).is_outbound());
        assert_eq!(
            ShardEvent::ConnectionReestablishing.kind(),
            "connection_reestablishing"
        );
    }
}
