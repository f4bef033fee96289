use news_board::config::Config;
use news_board::database::{create_pool, run_migrations};
use news_board::store::{BoardStore, MemoryStore, PgStore};
use news_board::{AppState, create_app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_board=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        ranking = %config.ranking_strategy,
        post_votes = %config.post_vote_rule,
        comment_votes = %config.comment_vote_rule,
        "configuration loaded"
    );

    let store: Arc<dyn BoardStore> = match &config.database_url {
        Some(url) => {
            let db = create_pool(url).await?;
            tracing::info!("database connection pool created");
            run_migrations(&db).await?;
            tracing::info!("database migrations completed");
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_app(AppState::new(store, config));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
