use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_admin::config::Config;
use news_admin::db::Database;
use news_admin::ingest::Ingestor;
use news_admin::newsapi::NewsApiClient;
use news_admin::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_admin=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWS_ADMIN_CONFIG").unwrap_or_else(|_| "news-admin.toml".to_string());
    let config = Config::load(&config_path)?.with_env_overrides();
    info!("Loaded configuration from {}", config_path);
    if config.newsapi.api_key.is_empty() {
        warn!("No news API key configured; imports will be rejected by the API");
    }

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.initialize().await?;
    info!("Database initialized");
    let db = Arc::new(db);

    let client = NewsApiClient::new(&config.newsapi)?;
    let ingestor = Arc::new(Ingestor::new(client, db.clone()));

    let state = Arc::new(AppState {
        db,
        ingestor,
        page_size: config.page_size,
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
