use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{Comment, CreateCommentRequest},
    services::comment_service,
};

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>> {
    let comments = comment_service::list_comments(state.store.as_ref(), post_id).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(author): AuthUser,
    Path(post_id): Path<Uuid>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateCommentRequest>, AppError>,
) -> Result<(StatusCode, Json<Comment>)> {
    let comment =
        comment_service::create_comment(state.store.as_ref(), &author, post_id, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
