use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A comment row. Threads are encoded by `parent_id` back-references only;
/// grouping replies under their parents is left to the reader.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author: Option<String>,
    pub parent_id: Option<Uuid>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub score: i32,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// Create comment request
#[derive(Debug, Default, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(length(max = 10000, message = "text must be at most 10000 characters"))]
    pub text: Option<String>,
    pub parent_id: Option<Uuid>,
}
