//! Tests for the RPC client URL building.

#[cfg(test)]
mod tests {
    use crate::api::{ApiError, EightBitsClient};
    use shared::models::{HistoryRequest, PostError, ShardId};

    /// Tests the list_posts URL for the most recent page
    #[test]
    fn test_list_posts_url_most_recent() {
        let client = EightBitsClient::new("/rpc/");
        let url = client.list_posts_url(&ShardId::from("lobby"), &HistoryRequest::default());
        assert_eq!(url, "/rpc/list_posts?shard=lobby&start=0&end=0&count=100");
    }

    /// Tests the list_posts URL for an older page
    #[test]
    fn test_list_posts_url_older_page() {
        let client = EightBitsClient::new("https://8bits.example/rpc");
        let url = client.list_posts_url(
            &ShardId::from("rust-talk"),
            &HistoryRequest::ending_at(42, 25),
        );
        assert_eq!(
            url,
            "https://8bits.example/rpc/list_posts?shard=rust-talk&start=0&end=42&count=25"
        );
    }

    /// Tests decode failures surface as API errors
    #[test]
    fn test_decode_error_message() {
        let err = ApiError::from(PostError::MissingPostId);
        assert!(err.to_string().starts_with("unexpected response"));
    }
}
