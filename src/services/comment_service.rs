use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, Result},
    models::{Comment, CreateCommentRequest, Identity, NewComment},
    services::post_service,
    store::BoardStore,
};

pub async fn create_comment(
    store: &dyn BoardStore,
    author: &Identity,
    post_id: Uuid,
    request: CreateCommentRequest,
) -> Result<Comment> {
    request.validate()?;

    let text = request
        .text
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Comment text is required".to_string()))?;

    // Post must be live before we look at the parent.
    post_service::get_post(store, post_id).await?;

    // A parent on another post would graft two threads together.
    if let Some(parent_id) = request.parent_id {
        let parent = store
            .get_comment(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

        if parent.post_id != post_id {
            return Err(AppError::InvalidInput(
                "Parent comment is not on the same post".to_string(),
            ));
        }
    }

    store.upsert_user(author).await?;
    let comment = store
        .insert_comment(NewComment {
            id: Uuid::new_v4(),
            post_id,
            author_id: author.id,
            parent_id: request.parent_id,
            text,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(
        comment_id = %comment.id,
        post_id = %post_id,
        parent_id = ?comment.parent_id,
        "comment created"
    );
    Ok(comment)
}

/// Flat list, newest first; each comment carries its `parent_id`.
pub async fn list_comments(store: &dyn BoardStore, post_id: Uuid) -> Result<Vec<Comment>> {
    post_service::get_post(store, post_id).await?;
    store.list_comments(post_id).await
}
