use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{ListingQuery, Post, PostType, SubmitPostRequest},
    services::post_service,
};

pub async fn list_hot(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts = post_service::list_hot(state.store.as_ref(), &state.config, params.limit).await?;
    Ok(Json(posts))
}

pub async fn list_newest(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Post>>> {
    let posts =
        post_service::list_newest(state.store.as_ref(), &state.config, params.limit).await?;
    Ok(Json(posts))
}

async fn list_type(
    state: &AppState,
    post_type: PostType,
    limit: Option<u32>,
) -> Result<Json<Vec<Post>>> {
    let posts =
        post_service::list_by_type(state.store.as_ref(), &state.config, post_type, limit).await?;
    Ok(Json(posts))
}

pub async fn list_ask(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Post>>> {
    list_type(&state, PostType::Ask, params.limit).await
}

pub async fn list_show(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Post>>> {
    list_type(&state, PostType::Show, params.limit).await
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Post>>> {
    list_type(&state, PostType::Job, params.limit).await
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Post>> {
    let post = post_service::get_post(state.store.as_ref(), post_id).await?;
    Ok(Json(post))
}

pub async fn submit_post(
    State(state): State<AppState>,
    AuthUser(author): AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<SubmitPostRequest>, AppError>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = post_service::submit_post(state.store.as_ref(), &author, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Post>> {
    let post = post_service::delete_post(state.store.as_ref(), &actor, post_id).await?;
    Ok(Json(post))
}
