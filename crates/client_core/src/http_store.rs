use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{Comment, NewComment, PostId},
    error::ApiError,
    protocol::{CreateCommentRequest, CreateCommentResponse, ListCommentsResponse},
};
use tracing::{debug, warn};
use url::Url;

use crate::CommentStoreClient;

/// [`CommentStoreClient`] speaking JSON to the comment server.
pub struct HttpCommentStore {
    http: Client,
    base_url: Url,
}

impl HttpCommentStore {
    pub fn new(server_url: &str) -> Result<Self> {
        let base_url = Url::parse(server_url.trim())
            .with_context(|| format!("invalid comment server url '{server_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("comment server url '{server_url}' cannot be a base"));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn comments_url(&self, post_id: &PostId) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("comment server url '{}' cannot be a base", self.base_url))?
            .pop_if_empty()
            .extend(["posts", post_id.as_str(), "comments"]);
        Ok(url)
    }
}

#[async_trait]
impl CommentStoreClient for HttpCommentStore {
    async fn list(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let url = self.comments_url(post_id)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach comment server at {url}"))?;
        let response = ensure_success(response).await?;
        let body: ListCommentsResponse = response
            .json()
            .await
            .context("comment server returned an unreadable comment list")?;
        Ok(body.comments)
    }

    async fn create(&self, comment: NewComment) -> Result<()> {
        let url = self.comments_url(&comment.post_id)?;
        let response = self
            .http
            .post(url.clone())
            .json(&CreateCommentRequest {
                author: comment.author,
                content: comment.content,
            })
            .send()
            .await
            .with_context(|| format!("failed to reach comment server at {url}"))?;
        let response = ensure_success(response).await?;

        // A 2xx means the comment is stored whatever the body holds.
        match response.json::<CreateCommentResponse>().await {
            Ok(created) => debug!(
                post_id = %comment.post_id,
                comment_id = created.comment_id.0,
                "comments: server accepted comment"
            ),
            Err(error) => warn!(
                post_id = %comment.post_id,
                %error,
                "comments: unreadable create response"
            ),
        }
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match response.json::<ApiError>().await {
        Ok(api_error) if !api_error.message.trim().is_empty() => Err(anyhow!(api_error.message)),
        _ => Err(anyhow!("comment server responded with {status}")),
    }
}

#[cfg(test)]
#[path = "tests/http_store_tests.rs"]
mod tests;
