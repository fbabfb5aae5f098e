use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vcsourcing_api::{
    config::Config,
    create_router,
    db::{create_pool, create_redis_client, Cache, CacheWriterHandle, InMemoryStore, PgStore},
    services::{seed, OpenAiProvider, SummaryService, TokenService},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Starting vcsourcing API v{}", env!("CARGO_PKG_VERSION"));

    let tokens = TokenService::new(
        &config.jwt_secret,
        config.access_token_ttl_secs,
        config.refresh_token_ttl_secs,
    );

    let (cache, cache_handle) = match &config.redis_url {
        Some(url) => {
            let (cache, handle) = Cache::new(create_redis_client(url)?);
            info!("Summary cache enabled");
            (Some(cache), Some(handle))
        }
        None => {
            info!("REDIS_URL not set; summaries will not be cached");
            (None, None)
        }
    };

    let llm = OpenAiProvider::new(
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.llm_model.clone(),
    )?;
    if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set; company summaries will fail");
    }
    info!("LLM provider initialized (model: {})", config.llm_model);

    let summaries = SummaryService::new(Arc::new(llm), cache, config.summary_cache_ttl_secs);

    let state = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            info!("Connected to PostgreSQL");
            AppState::from_store(PgStore::new(pool), tokens, summaries)
        }
        None => {
            info!("DATABASE_URL not set; using in-memory store with demo data");
            let store = InMemoryStore::new();
            seed::seed_companies(&store, false).await?;
            seed::seed_test_user(&store).await?;
            AppState::from_store(store, tokens, summaries)
        }
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {addr}");

    let listener = TcpListener::bind(addr).await?;
    serve(listener, app, shutdown_signal(), cache_handle).await
}

/// Serves until `shutdown` resolves and in-flight requests finish, then flushes
/// the cache writer so summaries generated by those requests are kept
async fn serve<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    cache_handle: Option<CacheWriterHandle>,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    Ok(())
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutdown signal received");
}
