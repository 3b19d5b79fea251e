use reqwest::{Client, StatusCode};
use shared::models::{HistoryRequest, HistoryResponse, Post, PostError, ShardId, SubmitPostRequest};
use thiserror::Error;

/// Failure talking to the 8-bits RPC endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(StatusCode),
    #[error("unexpected response: {0}")]
    Decode(#[from] PostError),
}

/// Lightweight RPC client for the shard endpoints.
#[derive(Clone, Debug)]
pub struct EightBitsClient {
    base_url: String,
    client: Client,
}

impl EightBitsClient {
    /// Create a new client rooted at `base_url` (e.g. `/rpc`).
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn rpc_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method.trim_start_matches('/'))
    }

    /// URL of the `list_posts` call answering `request`.
    pub fn list_posts_url(&self, shard: &ShardId, request: &HistoryRequest) -> String {
        format!("{}?{}", self.rpc_url("list_posts"), request.to_query(shard))
    }

    /// Fetch a page of older posts, newest first.
    pub async fn list_posts(
        &self,
        shard: &ShardId,
        request: &HistoryRequest,
    ) -> Result<Vec<Post>, ApiError> {
        let response = self
            .client
            .get(self.list_posts_url(shard, request))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        let body = response.text().await?;
        Ok(HistoryResponse::decode(&body, shard)?)
    }

    /// Submit a post written by the local user.
    pub async fn submit_post(&self, request: &SubmitPostRequest) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.rpc_url("post"))
            .form(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(())
    }
}
