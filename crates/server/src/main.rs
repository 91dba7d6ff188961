//! Agora server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agora_api::{AppState, app};
use agora_common::config::EngagementBackend;
use agora_common::{AppResult, Config, IdGenerator};
use agora_core::{
    MemoryEngagementStore, PaginationService, PostService, RankingService, RedisEngagementStore,
    SharedEngagementStore, UserService, VoteService,
};
use agora_db::repositories::{PostRepository, UserRepository};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Open the configured engagement store.
async fn engagement_store(config: &Config) -> AppResult<SharedEngagementStore> {
    match config.engagement.backend {
        EngagementBackend::Memory => {
            info!("Using in-memory engagement store (single instance only)");
            Ok(Arc::new(MemoryEngagementStore::new()))
        }
        EngagementBackend::Redis => {
            info!(prefix = %config.redis.prefix, "Using Redis engagement store");
            let store =
                RedisEngagementStore::connect(&config.redis.url, config.redis.prefix.clone())
                    .await?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting agora server...");

    // Load configuration
    let config = Config::load()?;

    // Invalid worker or epoch must stop startup.
    let id_gen = Arc::new(IdGenerator::new(&config.id.epoch, config.id.worker_id)?);
    info!(worker_id = id_gen.worker(), "Initialized ID generator");

    // Connect to database
    let db = Arc::new(agora_db::init(&config.database).await?);

    // Run migrations
    info!("Running database migrations...");
    agora_db::migrate(&db).await?;

    let store = engagement_store(&config).await?;

    // Initialize repositories
    let post_repo = PostRepository::new(Arc::clone(&db));
    let user_repo = UserRepository::new(Arc::clone(&db));

    // Initialize services
    let deadline = Duration::from_millis(config.engagement.deadline_ms);
    let ranking = RankingService::new(
        Arc::clone(&store),
        config.engagement.auto_register,
        deadline,
    );
    let vote_service = VoteService::new(
        Arc::clone(&store),
        ranking.clone(),
        deadline,
        config.engagement.max_commit_retries,
    );
    let pagination_service =
        PaginationService::new(ranking.clone(), Arc::new(post_repo.clone()), &config.pagination);
    let post_service = PostService::new(post_repo, Arc::clone(&id_gen), ranking);
    let user_service = UserService::new(user_repo, id_gen);

    let state = AppState {
        user_service,
        post_service,
        vote_service,
        pagination_service,
    };

    // Build router
    let app = app(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
