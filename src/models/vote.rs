use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{Comment, Post};

/// What a vote points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Post => f.write_str("post"),
            TargetKind::Comment => f.write_str("comment"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_i16(self) -> i16 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(VoteDirection::Up),
            -1 => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

/// One ledger row. Post and comment votes live in separate tables; the
/// target column is aliased to `target_id` when read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_id: Uuid,
    pub vote_type: i16, // -1 for downvote, 1 for upvote
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn direction(&self) -> Option<VoteDirection> {
        VoteDirection::from_i16(self.vote_type)
    }
}

// Vote request. Kept wide so out-of-range numbers reach `VoteRule::parse`;
// non-integers are turned into InvalidInput by the handler's extractor.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(alias = "vote_type")]
    pub vote_type: Option<i64>,
}

/// The target after a vote, with recomputed counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum VotedTarget {
    Post(Post),
    Comment(Comment),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVoteResponse {
    pub target_id: Uuid,
    pub kind: TargetKind,
    pub vote_type: Option<i16>,
}
