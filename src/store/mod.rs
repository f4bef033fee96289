//! Persistence seam for the board.
//!
//! Implemented by [`PgStore`] (Postgres) and [`MemoryStore`] (tests and
//! database-less local runs). Every method is one atomic unit against the
//! store: in particular [`BoardStore::apply_vote`] must change the ledger row
//! and the target's counters together or not at all.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        Comment, Identity, NewComment, NewPost, Post, TargetKind, User, Vote, VoteDirection,
        VotedTarget,
    },
    ranking::PostQuery,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Mirrors a verified identity into the users table.
    async fn upsert_user(&self, identity: &Identity) -> Result<User>;

    async fn insert_post(&self, post: NewPost) -> Result<Post>;

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>>;

    /// Filtered, ordered and limited read for listing views.
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// Sets soft-hide flags; `None` leaves a flag untouched. Returns the
    /// updated post, or `None` if it does not exist.
    async fn set_post_visibility(
        &self,
        post_id: Uuid,
        is_deleted: Option<bool>,
        is_dead: Option<bool>,
    ) -> Result<Option<Post>>;

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;

    async fn get_comment(&self, comment_id: Uuid) -> Result<Option<Comment>>;

    /// All comments of a post, newest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>>;

    async fn get_vote(&self, user_id: Uuid, kind: TargetKind, target_id: Uuid)
    -> Result<Option<Vote>>;

    /// Runs one ledger transition for (user, target) and the matching counter
    /// update as a single atomic unit. Fails with NotFound when the target is
    /// missing or soft-deleted.
    async fn apply_vote(
        &self,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
        direction: VoteDirection,
    ) -> Result<VotedTarget>;
}
