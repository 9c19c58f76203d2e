use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Comment, NewComment, PostId};

mod controller;
mod http_store;
mod name_cache;
mod validation;

pub use controller::{
    CommentController, ControllerEvent, ControllerSnapshot, ListState, LoadError, SubmitError,
    SubmitOutcome, SubmitState, UNEXPECTED_STORE_FAILURE,
};
pub use http_store::HttpCommentStore;
pub use name_cache::{DurableNameCache, MemoryNameCache, COMMENTER_NAME_KEY};
pub use validation::{validate_draft, Draft, ValidationError};

/// Remote authority for the comments of a post.
///
/// `list` must return an empty vector, not an error, for a post nobody has
/// commented on yet. `create` does not hand back the stored comment; callers
/// re-list to observe the id and timestamp the store assigned.
#[async_trait]
pub trait CommentStoreClient: Send + Sync {
    async fn list(&self, post_id: &PostId) -> Result<Vec<Comment>>;
    async fn create(&self, comment: NewComment) -> Result<()>;
}

/// Client-local persisted string slots. No expiry, last write wins.
#[async_trait]
pub trait NameCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct MissingCommentStore;

#[async_trait]
impl CommentStoreClient for MissingCommentStore {
    async fn list(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        Err(anyhow!("comment store unavailable for post {post_id}"))
    }

    async fn create(&self, comment: NewComment) -> Result<()> {
        Err(anyhow!(
            "comment store unavailable for post {}",
            comment.post_id
        ))
    }
}
