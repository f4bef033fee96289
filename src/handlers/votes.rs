use axum::{
    extract::{Path, State},
    response::Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{Identity, TargetKind, UserVoteResponse, VoteRequest, VotedTarget},
    services::vote_service,
};

async fn cast(
    state: &AppState,
    voter: &Identity,
    kind: TargetKind,
    target_id: Uuid,
    payload: VoteRequest,
) -> Result<Json<VotedTarget>> {
    let voted = vote_service::cast_vote(
        state.store.as_ref(),
        &state.config,
        voter,
        kind,
        target_id,
        payload.vote_type,
    )
    .await?;
    Ok(Json(voted))
}

async fn lookup(
    state: &AppState,
    voter: &Identity,
    kind: TargetKind,
    target_id: Uuid,
) -> Result<Json<UserVoteResponse>> {
    let vote = vote_service::get_user_vote(state.store.as_ref(), voter, kind, target_id).await?;
    Ok(Json(UserVoteResponse {
        target_id,
        kind,
        vote_type: vote.map(|v| v.vote_type),
    }))
}

pub async fn vote_post(
    State(state): State<AppState>,
    AuthUser(voter): AuthUser,
    Path(post_id): Path<Uuid>,
    WithRejection(Json(payload), _): WithRejection<Json<VoteRequest>, AppError>,
) -> Result<Json<VotedTarget>> {
    cast(&state, &voter, TargetKind::Post, post_id, payload).await
}

pub async fn vote_comment(
    State(state): State<AppState>,
    AuthUser(voter): AuthUser,
    Path(comment_id): Path<Uuid>,
    WithRejection(Json(payload), _): WithRejection<Json<VoteRequest>, AppError>,
) -> Result<Json<VotedTarget>> {
    cast(&state, &voter, TargetKind::Comment, comment_id, payload).await
}

pub async fn get_post_vote(
    State(state): State<AppState>,
    AuthUser(voter): AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<UserVoteResponse>> {
    lookup(&state, &voter, TargetKind::Post, post_id).await
}

pub async fn get_comment_vote(
    State(state): State<AppState>,
    AuthUser(voter): AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<UserVoteResponse>> {
    lookup(&state, &voter, TargetKind::Comment, comment_id).await
}
