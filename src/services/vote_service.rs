use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{Identity, TargetKind, Vote, VotedTarget},
    store::BoardStore,
};

/// Casts `vote_type` for `voter` on a post or comment.
///
/// The raw value is checked against the rule configured for `kind` before
/// anything is written; a rejected value never turns into a no-op. The
/// ledger transition and counter update then run as one unit in the store.
pub async fn cast_vote(
    store: &dyn BoardStore,
    config: &Config,
    voter: &Identity,
    kind: TargetKind,
    target_id: Uuid,
    vote_type: Option<i64>,
) -> Result<VotedTarget> {
    let raw = vote_type.ok_or_else(|| AppError::InvalidInput("voteType is required".to_string()))?;
    let direction = config.vote_rule(kind).parse(raw)?;

    store.upsert_user(voter).await?;
    let voted = store
        .apply_vote(voter.id, kind, target_id, direction)
        .await?;

    tracing::info!(
        user_id = %voter.id,
        %kind,
        target_id = %target_id,
        vote_type = direction.as_i16(),
        "vote cast"
    );
    Ok(voted)
}

/// The voter's current ledger row for a target, if any.
pub async fn get_user_vote(
    store: &dyn BoardStore,
    voter: &Identity,
    kind: TargetKind,
    target_id: Uuid,
) -> Result<Option<Vote>> {
    // Same visibility as cast_vote: the target and its post must be live.
    let post_id = match kind {
        TargetKind::Post => Some(target_id),
        TargetKind::Comment => store
            .get_comment(target_id)
            .await?
            .map(|comment| comment.post_id),
    };
    let visible = match post_id {
        Some(post_id) => store
            .get_post(post_id)
            .await?
            .is_some_and(|post| !post.is_deleted),
        None => false,
    };
    if !visible {
        return Err(AppError::NotFound(format!("{} not found", kind)));
    }

    store.get_vote(voter.id, kind, target_id).await
}
