//! # Posts
//!
//! A post is one event in a shard's timeline: a chat line, a topic change, a
//! roster notice. Posts arrive as loosely typed [`PostRecord`]s and are parsed
//! into [`Post`]s before they reach the merge engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{PostError, PostResult};

/// Identifier of a shard (one chat room or topic stream).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    /// Creates a shard identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ShardId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ShardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a post, stable across its whole lifecycle.
///
/// Locally authored posts mint their id on the client; the server keeps it,
/// which is what lets an acknowledgment find the optimistic copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Wraps an existing identifier.
    ///
    /// # Errors
    /// Returns [`PostError::MissingPostId`] when `value` is empty.
    pub fn new(value: impl Into<String>) -> PostResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(PostError::MissingPostId);
        }
        Ok(Self(value))
    }

    /// Mints a fresh identifier for a post authored on this client.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned position of a post within its shard. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    /// The first sequence number a shard hands out.
    pub const FIRST: Self = Self(1);

    /// Creates a sequence id, rejecting zero.
    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of event a post represents. Only presentation differs between kinds;
/// every kind flows through the same merge logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum ArchiveType {
    Chat,
    Info,
    Error,
    Roster,
    TopicStart,
    TopicChange,
    UserLogin,
    UserLogout,
    UserUpdate,
    #[default]
    Unknown,
}

impl ArchiveType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Info => "info",
            Self::Error => "error",
            Self::Roster => "roster",
            Self::TopicStart => "topic_start",
            Self::TopicChange => "topic_change",
            Self::UserLogin => "user_login",
            Self::UserLogout => "user_logout",
            Self::UserUpdate => "user_update",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a user may post this kind directly.
    #[must_use]
    pub const fn is_user_submittable(self) -> bool {
        matches!(self, Self::Chat | Self::TopicChange)
    }

    /// Whether this kind is generated by the system rather than typed by a user.
    #[must_use]
    pub const fn is_system(self) -> bool {
        !matches!(self, Self::Chat)
    }
}

impl From<&str> for ArchiveType {
    fn from(value: &str) -> Self {
        match value {
            "chat" => Self::Chat,
            "info" => Self::Info,
            "error" => Self::Error,
            "roster" => Self::Roster,
            "topic_start" => Self::TopicStart,
            "topic_change" => Self::TopicChange,
            "user_login" => Self::UserLogin,
            "user_logout" => Self::UserLogout,
            "user_update" => Self::UserUpdate,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for ArchiveType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ArchiveType> for &'static str {
    fn from(value: ArchiveType) -> Self {
        value.as_str()
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post exactly as it travels over the wire. Every field is optional here;
/// [`Post::from_record`] decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub sequence_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_topic_id: Option<String>,
}

/// A parsed post.
///
/// The sequence id is the only field that ever changes after construction,
/// and only from absent to present; see [`crate::sync::PostIndex::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    shard_id: ShardId,
    archive_type: ArchiveType,
    nickname: Option<String>,
    title: Option<String>,
    body: String,
    post_id: PostId,
    sequence_id: Option<SequenceId>,
    post_time_ms: Option<i64>,
    new_topic_id: Option<ShardId>,
}

impl Post {
    /// Creates an empty post of the given kind. Use the `with_*` methods to
    /// fill in the rest.
    #[must_use]
    pub fn new(shard_id: ShardId, post_id: PostId, archive_type: ArchiveType) -> Self {
        Self {
            shard_id,
            archive_type,
            nickname: None,
            title: None,
            body: String::new(),
            post_id,
            sequence_id: None,
            post_time_ms: None,
            new_topic_id: None,
        }
    }

    /// Parses a wire record received on `shard`.
    ///
    /// # Errors
    /// * [`PostError::MissingPostId`] when the record has no usable id.
    /// * [`PostError::InvalidSequence`] for a zero or negative sequence id.
    /// * [`PostError::ShardMismatch`] when the record names another shard.
    pub fn from_record(record: PostRecord, shard: &ShardId) -> PostResult<Self> {
        let post_id = PostId::new(record.post_id.unwrap_or_default())?;

        let sequence_id = match record.sequence_id {
            None => None,
            Some(value) => {
                let parsed = u64::try_from(value).ok().and_then(SequenceId::new);
                Some(parsed.ok_or_else(|| PostError::InvalidSequence {
                    post_id: post_id.to_string(),
                    value,
                })?)
            }
        };

        let shard_id = match record.shard_id {
            Some(found) if !found.is_empty() && found != shard.as_str() => {
                return Err(PostError::ShardMismatch {
                    post_id: post_id.to_string(),
                    expected: shard.to_string(),
                    found,
                });
            }
            _ => shard.clone(),
        };

        Ok(Self {
            shard_id,
            archive_type: record
                .archive_type
                .map(ArchiveType::from)
                .unwrap_or_default(),
            nickname: record.nickname,
            title: record.title,
            body: record.body.unwrap_or_default(),
            post_id,
            sequence_id,
            post_time_ms: record.post_time_ms,
            new_topic_id: record.new_topic_id.filter(|id| !id.is_empty()).map(ShardId::from),
        })
    }

    /// Converts back to the wire shape.
    #[must_use]
    pub fn to_record(&self) -> PostRecord {
        PostRecord {
            shard_id: Some(self.shard_id.to_string()),
            archive_type: Some(self.archive_type.as_str().to_string()),
            nickname: self.nickname.clone(),
            title: self.title.clone(),
            body: Some(self.body.clone()),
            post_id: Some(self.post_id.to_string()),
            sequence_id: self
                .sequence_id
                .and_then(|sequence| i64::try_from(sequence.get()).ok()),
            post_time_ms: self.post_time_ms,
            new_topic_id: self.new_topic_id.as_ref().map(ToString::to_string),
        }
    }

    #[must_use]
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence_id: SequenceId) -> Self {
        self.sequence_id = Some(sequence_id);
        self
    }

    #[must_use]
    pub fn with_post_time_ms(mut self, post_time_ms: i64) -> Self {
        self.post_time_ms = Some(post_time_ms);
        self
    }

    #[must_use]
    pub fn with_new_topic(mut self, new_topic_id: ShardId) -> Self {
        self.new_topic_id = Some(new_topic_id);
        self
    }

    #[must_use]
    pub fn shard_id(&self) -> &ShardId {
        &self.shard_id
    }

    #[must_use]
    pub fn archive_type(&self) -> ArchiveType {
        self.archive_type
    }

    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Body text. May already contain escaped HTML links from the server.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    #[must_use]
    pub fn sequence_id(&self) -> Option<SequenceId> {
        self.sequence_id
    }

    #[must_use]
    pub fn post_time_ms(&self) -> Option<i64> {
        self.post_time_ms
    }

    #[must_use]
    pub fn new_topic_id(&self) -> Option<&ShardId> {
        self.new_topic_id.as_ref()
    }

    /// Post time for display. Never used for ordering.
    #[must_use]
    pub fn post_time(&self) -> Option<DateTime<Utc>> {
        self.post_time_ms.and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Whether the server has not sequenced this post yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sequence_id.is_none()
    }

    /// Fills in the sequence id of a pending post. Returns the id already
    /// stored when there is one; it is never overwritten.
    pub(crate) fn assign_sequence(&mut self, sequence_id: SequenceId) -> Result<(), SequenceId> {
        match self.sequence_id {
            Some(existing) => Err(existing),
            None => {
                self.sequence_id = Some(sequence_id);
                Ok(())
            }
        }
    }
}
