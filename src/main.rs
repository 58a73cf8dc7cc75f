//! HopeLine AI - crisis support and wellbeing backend

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hopeline::{
    api::{self, AppState},
    chat::ChatService,
    config::Config,
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hopeline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HopeLine...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let chat_service = ChatService::from_config(&config.chat)?;
    if !chat_service.is_enabled() {
        tracing::warn!("No chat API key configured, the chat route will answer 503");
    }

    let state = AppState::new(pool, &config, None, chat_service)?;

    // Demo mode: create a default admin when the database is empty
    #[cfg(feature = "demo")]
    {
        if state.user_service.count().await? == 0 {
            tracing::info!("Demo mode: creating default admin (demo@hopeline.local / demo12345)");
            state
                .user_service
                .register(hopeline::models::RegisterInput {
                    email: "demo@hopeline.local".to_string(),
                    password: "demo12345".to_string(),
                    display_name: "Demo Admin".to_string(),
                })
                .await?;
        }
    }

    // Rate limiter cleanup (every 5 minutes)
    {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Expired sessions and reset tokens (hourly)
    {
        let users = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match users.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Removed expired sessions and tokens"),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
