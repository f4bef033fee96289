pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod ranking;
pub mod services;
pub mod store;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, store::BoardStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BoardStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn BoardStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    // Feeds and reads
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/posts/hot", get(handlers::posts::list_hot))
        .route("/api/posts/new", get(handlers::posts::list_newest))
        .route("/api/posts/newest", get(handlers::posts::list_newest))
        .route("/api/posts/ask", get(handlers::posts::list_ask))
        .route("/api/posts/show", get(handlers::posts::list_show))
        .route("/api/posts/jobs", get(handlers::posts::list_jobs))
        .route("/api/posts/{post_id}", get(handlers::posts::get_post))
        .route(
            "/api/comments/post/{post_id}",
            get(handlers::comments::list_comments),
        );

    // Every route here extracts AuthUser
    let protected_routes = Router::new()
        .route("/api/posts/submit", post(handlers::posts::submit_post))
        .route(
            "/api/posts/{post_id}",
            delete(handlers::posts::delete_post),
        )
        .route(
            "/api/comments/post/{post_id}",
            post(handlers::comments::create_comment),
        )
        .route(
            "/api/votes/post/{post_id}",
            post(handlers::votes::vote_post).get(handlers::votes::get_post_vote),
        )
        .route(
            "/api/votes/comment/{comment_id}",
            post(handlers::votes::vote_comment).get(handlers::votes::get_comment_vote),
        );

    // Both groups share some paths; merge combines their method routers.
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
