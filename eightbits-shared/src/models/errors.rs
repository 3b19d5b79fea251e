use thiserror::Error;

use super::post::ArchiveType;

/// Result type alias for post parsing and validation.
pub type PostResult<T> = Result<T, PostError>;

/// Errors raised while turning wire records into typed posts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    /// The record carried no `postId`, or an empty one.
    #[error("post record is missing a postId")]
    MissingPostId,

    /// The record carried a sequence number the server never assigns.
    #[error("post {post_id} has invalid sequenceId {value}")]
    InvalidSequence { post_id: String, value: i64 },

    /// The record belongs to another shard than the one it arrived on.
    #[error("post {post_id} belongs to shard {found}, expected {expected}")]
    ShardMismatch {
        post_id: String,
        expected: String,
        found: String,
    },

    /// Users may only submit chat and topic change posts.
    #[error("\"{archive_type}\" is not a valid post type")]
    NotSubmittable { archive_type: ArchiveType },

    /// The envelope itself could not be decoded.
    #[error("malformed payload: {message}")]
    Malformed { message: String },
}

impl From<serde_json::Error> for PostError {
    fn from(error: serde_json::Error) -> Self {
        Self::Malformed {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_post() {
        let error = PostError::InvalidSequence {
            post_id: "abc".into(),
            value: -4,
        };
        assert_eq!(error.to_string(), "post abc has invalid sequenceId -4");

        let error = PostError::ShardMismatch {
            post_id: "abc".into(),
            expected: "lobby".into(),
            found: "games".into(),
        };
        assert!(error.to_string().contains("expected lobby"));
    }

    #[test]
    fn not_submittable_uses_wire_name() {
        let error = PostError::NotSubmittable {
            archive_type: ArchiveType::UserLogin,
        };
        assert_eq!(error.to_string(), "\"user_login\" is not a valid post type");
    }

    #[test]
    fn json_errors_become_malformed() {
        let error: PostError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(error, PostError::Malformed { .. }));
    }
}
