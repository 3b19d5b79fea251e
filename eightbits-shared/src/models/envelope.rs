use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::errors::{PostError, PostResult};
use super::post::{ArchiveType, Post, PostId, PostRecord, ShardId};

/// Page size the `list_posts` RPC uses when the client does not send one.
pub const DEFAULT_HISTORY_COUNT: u32 = 100;

fn decode_posts(records: Vec<PostRecord>, shard: &ShardId) -> PostResult<Vec<Post>> {
    records
        .into_iter()
        .map(|record| Post::from_record(record, shard))
        .collect()
}

/// Payload pushed over the browser channel whenever posts are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    #[serde(default)]
    pub posts: Vec<PostRecord>,
}

impl ChannelMessage {
    /// Decodes a channel payload into posts of `shard`.
    ///
    /// # Errors
    /// Fails on malformed JSON or on the first record that does not parse.
    pub fn decode(json: &str, shard: &ShardId) -> PostResult<Vec<Post>> {
        let message: Self = serde_json::from_str(json)?;
        decode_posts(message.posts, shard)
    }
}

/// Query for a page of older posts.
///
/// `end == 0` asks for the most recent page. Otherwise the server answers
/// with the inclusive window ending at `end`, newest first.
///
/// `generation` never reaches the server. The transport hands it back with
/// the page or failure so replies to abandoned requests can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub start: u64,
    pub end: u64,
    pub count: u32,
    #[serde(default)]
    pub generation: u64,
}

impl HistoryRequest {
    /// Request for the page ending at `end` (or the newest page for `0`).
    #[must_use]
    pub const fn ending_at(end: u64, count: u32) -> Self {
        Self {
            start: 0,
            end,
            count,
            generation: 0,
        }
    }

    #[must_use]
    pub const fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Whether this asks for the newest posts of the shard.
    #[must_use]
    pub const fn is_most_recent(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// Sequence window the server scans for this request, or `None` for the
    /// most recent page.
    #[must_use]
    pub fn window(&self) -> Option<RangeInclusive<u64>> {
        if self.is_most_recent() {
            return None;
        }
        let low = self.end.saturating_sub(u64::from(self.count)).max(1);
        Some(low..=self.end)
    }

    /// Renders the RPC query string.
    #[must_use]
    pub fn to_query(&self, shard: &ShardId) -> String {
        format!(
            "shard={}&start={}&end={}&count={}",
            shard, self.start, self.end, self.count
        )
    }
}

impl Default for HistoryRequest {
    fn default() -> Self {
        Self::ending_at(0, DEFAULT_HISTORY_COUNT)
    }
}

/// Response body of the `list_posts` RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub posts: Vec<PostRecord>,
}

impl HistoryResponse {
    /// Decodes a history page into posts of `shard`.
    ///
    /// # Errors
    /// Fails on malformed JSON or on the first record that does not parse.
    pub fn decode(json: &str, shard: &ShardId) -> PostResult<Vec<Post>> {
        let response: Self = serde_json::from_str(json)?;
        decode_posts(response.posts, shard)
    }
}

/// Form sent to the `post` RPC when the local user writes something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitPostRequest {
    pub shard: ShardId,
    #[serde(rename = "type")]
    pub archive_type: ArchiveType,
    pub body: String,
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_topic: Option<ShardId>,
}

impl SubmitPostRequest {
    /// Builds a submission with a freshly minted post id.
    ///
    /// # Errors
    /// Returns [`PostError::NotSubmittable`] for kinds users cannot post.
    pub fn new(
        shard: ShardId,
        archive_type: ArchiveType,
        body: impl Into<String>,
    ) -> PostResult<Self> {
        if !archive_type.is_user_submittable() {
            return Err(PostError::NotSubmittable { archive_type });
        }
        Ok(Self {
            shard,
            archive_type,
            body: body.into(),
            post_id: PostId::generate(),
            new_topic: None,
        })
    }

    /// Attaches the topic a `topic_change` post switches to. Ignored for
    /// other kinds, as the server does.
    #[must_use]
    pub fn with_new_topic(mut self, topic: ShardId) -> Self {
        if self.archive_type == ArchiveType::TopicChange {
            self.new_topic = Some(topic);
        }
        self
    }

    /// The local, not yet sequenced copy shown until the server echoes it.
    #[must_use]
    pub fn optimistic_post(&self, nickname: &str, now_ms: i64) -> Post {
        let post = Post::new(self.shard.clone(), self.post_id.clone(), self.archive_type)
            .with_nickname(nickname)
            .with_body(self.body.clone())
            .with_post_time_ms(now_ms);
        match &self.new_topic {
            Some(topic) => post.with_new_topic(topic.clone()),
            None => post,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> ShardId {
        ShardId::from("lobby")
    }

    #[test]
    fn channel_message_decodes_every_post() {
        let json = r#"{"posts": [
            {"postId": "a", "sequenceId": 7, "archiveType": "chat"},
            {"postId": "b", "sequenceId": null, "archiveType": "user_login"}
        ]}"#;
        let posts = ChannelMessage::decode(json, &lobby()).unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post_id().as_str(), "a");
        assert!(posts[1].is_pending());
        assert_eq!(posts[1].archive_type(), ArchiveType::UserLogin);
    }

    #[test]
    fn channel_message_fails_on_bad_record() {
        let json = r#"{"posts": [{"postId": "a"}, {"body": "no id"}]}"#;
        assert_eq!(
            ChannelMessage::decode(json, &lobby()),
            Err(PostError::MissingPostId)
        );
        assert!(matches!(
            ChannelMessage::decode("not json", &lobby()),
            Err(PostError::Malformed { .. })
        ));
    }

    #[test]
    fn most_recent_request_has_no_window() {
        let request = HistoryRequest::default();
        assert!(request.is_most_recent());
        assert_eq!(request.window(), None);
        assert_eq!(request.count, 100);
    }

    #[test]
    fn window_is_inclusive_and_clamped() {
        assert_eq!(HistoryRequest::ending_at(250, 100).window(), Some(150..=250));
        assert_eq!(HistoryRequest::ending_at(40, 100).window(), Some(1..=40));
    }

    #[test]
    fn query_string_names_every_parameter() {
        let request = HistoryRequest::ending_at(12, 50).with_generation(4);
        assert_eq!(
            request.to_query(&lobby()),
            "shard=lobby&start=0&end=12&count=50"
        );
    }

    #[test]
    fn history_response_decodes() {
        let json = r#"{"posts": [{"postId": "x", "sequenceId": 3}]}"#;
        let posts = HistoryResponse::decode(json, &lobby()).unwrap();
        assert_eq!(posts[0].sequence_id().map(|s| s.get()), Some(3));
    }

    #[test]
    fn submissions_reject_system_kinds() {
        assert_eq!(
            SubmitPostRequest::new(lobby(), ArchiveType::Roster, "hi"),
            Err(PostError::NotSubmittable {
                archive_type: ArchiveType::Roster
            })
        );
    }

    #[test]
    fn new_topic_only_sticks_to_topic_changes() {
        let chat = SubmitPostRequest::new(lobby(), ArchiveType::Chat, "hi")
            .unwrap()
            .with_new_topic(ShardId::from("t1"));
        assert_eq!(chat.new_topic, None);

        let change = SubmitPostRequest::new(lobby(), ArchiveType::TopicChange, "rust")
            .unwrap()
            .with_new_topic(ShardId::from("t1"));
        assert_eq!(change.new_topic, Some(ShardId::from("t1")));
    }

    #[test]
    fn optimistic_post_is_pending_and_shares_id() {
        let request = SubmitPostRequest::new(lobby(), ArchiveType::Chat, "hello").unwrap();
        let post = request.optimistic_post("ada", 1_000);

        assert!(post.is_pending());
        assert_eq!(post.post_id(), &request.post_id);
        assert_eq!(post.nickname(), Some("ada"));
        assert_eq!(post.body(), "hello");
        assert_eq!(post.post_time_ms(), Some(1_000));
    }

    #[test]
    fn submit_request_serializes_type_field() {
        let request = SubmitPostRequest::new(lobby(), ArchiveType::Chat, "hi").unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "chat");
        assert_eq!(json["shard"], "lobby");
        assert!(json.get("new_topic").is_none());
    }
}
