//! Vote state transitions.
//!
//! Every (user, target) pair is in one of three states: no vote, upvoted or
//! downvoted. A cast moves the pair between states and yields the counter
//! deltas the target must absorb in the same atomic step as the ledger
//! change. Nothing here touches storage; the store applies a [`Transition`]
//! inside its own transaction.

use std::{fmt, str::FromStr};

use crate::{
    error::{AppError, Result},
    models::VoteDirection,
};

/// Which vote values a target kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRule {
    /// Only +1 is accepted; the pair is either unvoted or upvoted.
    UpvoteOnly,
    /// +1 and -1 are both accepted.
    UpDown,
}

impl VoteRule {
    /// Turns a raw vote value into a direction, rejecting anything the rule
    /// does not allow. Zero is not a retraction; it is invalid.
    pub fn parse(self, raw: i64) -> Result<VoteDirection> {
        match (self, raw) {
            (_, 1) => Ok(VoteDirection::Up),
            (VoteRule::UpDown, -1) => Ok(VoteDirection::Down),
            (VoteRule::UpvoteOnly, _) => Err(AppError::InvalidInput(
                "Invalid vote type. Must be 1 (upvote)".to_string(),
            )),
            (VoteRule::UpDown, _) => Err(AppError::InvalidInput(
                "Invalid vote type. Must be 1 (upvote) or -1 (downvote)".to_string(),
            )),
        }
    }
}

impl fmt::Display for VoteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteRule::UpvoteOnly => f.write_str("upvote"),
            VoteRule::UpDown => f.write_str("updown"),
        }
    }
}

impl FromStr for VoteRule {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upvote" | "upvote_only" | "upvote-only" => Ok(VoteRule::UpvoteOnly),
            "updown" | "up_down" | "up-down" => Ok(VoteRule::UpDown),
            other => Err(format!("Unknown vote rule: {}", other)),
        }
    }
}

/// What happens to the ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    Insert(VoteDirection),
    Update(VoteDirection),
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: LedgerAction,
    pub upvote_delta: i32,
    pub downvote_delta: i32,
}

impl Transition {
    /// Net change for targets that keep a single score counter.
    pub fn score_delta(&self) -> i32 {
        self.upvote_delta - self.downvote_delta
    }

    pub fn is_noop(&self) -> bool {
        self.action == LedgerAction::Unchanged
    }
}

/// Plans the move from `existing` to `cast`.
pub fn plan(existing: Option<VoteDirection>, cast: VoteDirection) -> Transition {
    match (existing, cast) {
        (None, VoteDirection::Up) => Transition {
            action: LedgerAction::Insert(VoteDirection::Up),
            upvote_delta: 1,
            downvote_delta: 0,
        },
        (None, VoteDirection::Down) => Transition {
            action: LedgerAction::Insert(VoteDirection::Down),
            upvote_delta: 0,
            downvote_delta: 1,
        },
        (Some(VoteDirection::Up), VoteDirection::Down) => Transition {
            action: LedgerAction::Update(VoteDirection::Down),
            upvote_delta: -1,
            downvote_delta: 1,
        },
        (Some(VoteDirection::Down), VoteDirection::Up) => Transition {
            action: LedgerAction::Update(VoteDirection::Up),
            upvote_delta: 1,
            downvote_delta: -1,
        },
        (Some(_), _) => Transition {
            action: LedgerAction::Unchanged,
            upvote_delta: 0,
            downvote_delta: 0,
        },
    }
}
