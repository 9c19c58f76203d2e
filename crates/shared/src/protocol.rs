use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Comment, CommentId};

pub fn post_comments_route() -> &'static str {
    "/posts/:post_id/comments"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCommentsResponse {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentResponse {
    pub comment_id: CommentId,
    pub created_at: DateTime<Utc>,
}
