use shared::{
    domain::{Comment, NewComment, PostId},
    error::{ApiError, ErrorCode},
    protocol::{CreateCommentRequest, CreateCommentResponse},
};
use storage::Storage;
use tracing::info;

pub const MAX_AUTHOR_CHARS: usize = 80;
pub const MAX_CONTENT_CHARS: usize = 4000;
pub const MAX_POST_ID_CHARS: usize = 200;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_comments(ctx: &ApiContext, post_id: &PostId) -> Result<Vec<Comment>, ApiError> {
    validate_post_id(post_id)?;
    ctx.storage
        .list_comments_for_post(post_id)
        .await
        .map_err(internal)
}

pub async fn create_comment(
    ctx: &ApiContext,
    post_id: PostId,
    request: CreateCommentRequest,
) -> Result<CreateCommentResponse, ApiError> {
    let comment = normalize_new_comment(post_id, request)?;
    let inserted = ctx
        .storage
        .insert_comment(&comment)
        .await
        .map_err(internal)?;
    info!(
        post_id = %comment.post_id,
        comment_id = inserted.comment_id.0,
        "comments: stored new comment"
    );
    Ok(CreateCommentResponse {
        comment_id: inserted.comment_id,
        created_at: inserted.created_at,
    })
}

/// Trims author and content and enforces the store's limits. Blank content
/// is reported before a blank author.
pub fn normalize_new_comment(
    post_id: PostId,
    request: CreateCommentRequest,
) -> Result<NewComment, ApiError> {
    validate_post_id(&post_id)?;

    let author = request.author.trim();
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("comment content must not be empty"));
    }
    if author.is_empty() {
        return Err(ApiError::validation("author name must not be empty"));
    }
    if author.chars().count() > MAX_AUTHOR_CHARS {
        return Err(ApiError::validation(format!(
            "author name exceeds {MAX_AUTHOR_CHARS} characters"
        )));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::validation(format!(
            "comment content exceeds {MAX_CONTENT_CHARS} characters"
        )));
    }

    Ok(NewComment {
        post_id,
        author: author.to_string(),
        content: content.to_string(),
    })
}

fn validate_post_id(post_id: &PostId) -> Result<(), ApiError> {
    let raw = post_id.as_str();
    if raw.trim().is_empty() {
        return Err(ApiError::validation("post id must not be empty"));
    }
    if raw.chars().count() > MAX_POST_ID_CHARS {
        return Err(ApiError::validation(format!(
            "post id exceeds {MAX_POST_ID_CHARS} characters"
        )));
    }
    Ok(())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(author: &str, content: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            author: author.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn normalizes_by_trimming_both_fields() {
        let comment = normalize_new_comment(PostId::new("p"), request("  Ada ", "\tGreat read\n"))
            .expect("valid");
        assert_eq!(comment.author, "Ada");
        assert_eq!(comment.content, "Great read");
    }

    #[test]
    fn rejects_blank_content_before_blank_author() {
        let err = normalize_new_comment(PostId::new("p"), request(" ", "  ")).expect_err("invalid");
        assert_eq!(err.code, ErrorCode::Validation);
        assert!(err.message.contains("content"));
    }

    #[test]
    fn rejects_oversized_author() {
        let long_name = "a".repeat(MAX_AUTHOR_CHARS + 1);
        let err = normalize_new_comment(PostId::new("p"), request(&long_name, "hi"))
            .expect_err("too long");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[test]
    fn rejects_blank_post_id() {
        let err = normalize_new_comment(PostId::new("   "), request("Ada", "hi")).expect_err("bad id");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn create_then_list_returns_stored_comment() {
        let ctx = ApiContext {
            storage: Storage::new("sqlite::memory:").await.expect("db"),
        };
        let created = create_comment(&ctx, PostId::new("post-1"), request("Ada", "Great read"))
            .await
            .expect("create");
        let comments = list_comments(&ctx, &PostId::new("post-1"))
            .await
            .expect("list");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, created.comment_id);
    }
}
