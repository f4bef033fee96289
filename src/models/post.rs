use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "post_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Story,
    Ask,
    Show,
    Job,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Story => "story",
            PostType::Ask => "ask",
            PostType::Show => "show",
            PostType::Job => "job",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story" | "Story" => Ok(PostType::Story),
            "ask" | "Ask" => Ok(PostType::Ask),
            "show" | "Show" => Ok(PostType::Show),
            "job" | "Job" => Ok(PostType::Job),
            _ => Err(format!("Unknown PostType: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub author_id: Uuid,
    /// Username of the author, resolved at read time.
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub is_deleted: bool,
    pub is_dead: bool,
}

impl Post {
    /// Soft-hidden posts stay in the store but never show up in listings.
    pub fn is_hidden(&self) -> bool {
        self.is_deleted || self.is_dead
    }
}

/// A validated post ready to be written. `created_at` is assigned by the
/// caller so inserts and ranking share one clock.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub post_type: PostType,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// Submit post request. Fields are optional so missing values surface as
// InvalidInput instead of a body rejection.
#[derive(Debug, Default, Validate, Deserialize)]
pub struct SubmitPostRequest {
    #[validate(length(max = 300, message = "title must be at most 300 characters"))]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub url: Option<String>,
    #[validate(length(max = 10000, message = "text must be at most 10000 characters"))]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub limit: Option<u32>,
}
