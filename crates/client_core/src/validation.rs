use shared::domain::{NewComment, PostId};
use thiserror::Error;

/// In-progress comment input for the attached post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub commenter_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("comment content must not be empty")]
    EmptyContent,
    #[error("commenter name must not be empty")]
    EmptyAuthor,
}

/// Checks content before author, so a draft with both fields blank always
/// reports `EmptyContent`.
pub fn validate_draft(post_id: &PostId, draft: &Draft) -> Result<NewComment, ValidationError> {
    let content = draft.content.trim();
    if content.is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    let author = draft.commenter_name.trim();
    if author.is_empty() {
        return Err(ValidationError::EmptyAuthor);
    }

    Ok(NewComment {
        post_id: post_id.clone(),
        author: author.to_string(),
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, content: &str) -> Draft {
        Draft {
            commenter_name: name.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn whitespace_content_is_empty() {
        let err = validate_draft(&PostId::new("p"), &draft("Ada", " \t\n ")).expect_err("invalid");
        assert_eq!(err, ValidationError::EmptyContent);
    }

    #[test]
    fn content_is_checked_before_author() {
        let err = validate_draft(&PostId::new("p"), &draft("   ", "")).expect_err("invalid");
        assert_eq!(err, ValidationError::EmptyContent);
    }

    #[test]
    fn blank_author_is_rejected_once_content_is_present() {
        let err = validate_draft(&PostId::new("p"), &draft("  ", "hello")).expect_err("invalid");
        assert_eq!(err, ValidationError::EmptyAuthor);
    }

    #[test]
    fn valid_draft_is_trimmed_into_new_comment() {
        let comment =
            validate_draft(&PostId::new("post-1"), &draft("  Ada ", " Great read\n")).expect("ok");
        assert_eq!(comment.post_id, PostId::new("post-1"));
        assert_eq!(comment.author, "Ada");
        assert_eq!(comment.content, "Great read");
    }
}
