//! Auth service - Entry point.

use anyhow::{Context, Result};
use auth_service::{
    api::{create_router_with, AppState, CodeRateLimiter},
    config::{Config, LogConfig, LogFormat},
    directory::{
        connect_pool, run_migrations, MemorySessionStore, MemoryUserDirectory, PgSessionStore,
        PgUserDirectory, SessionStore, UserDirectory,
    },
    reaper::spawn_reaper,
    token::JwtIssuer,
    AuthWorkflow,
};
use code_cache::{MemoryCodeCache, OneTimeCodeCache, RedisCodeCache};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_logging(&config.log)?;

    info!("Starting auth service");

    let (users, sessions) = open_directory(&config).await?;
    let codes = open_code_cache(&config).await?;

    let tokens = JwtIssuer::new(
        &config.auth.jwt_secret,
        config.auth.access_ttl,
        config.auth.refresh_ttl,
    )
    .context("Failed to create token issuer")?;

    let workflow = AuthWorkflow::new(users.clone(), sessions, codes, Arc::new(tokens))
        .with_code_generator(config.code_generator()?)
        .with_code_ttl(config.auth.code_ttl);

    let shutdown = CancellationToken::new();
    let reaper = spawn_reaper(
        users,
        config.reaper.period,
        config.reaper.retention,
        shutdown.clone(),
    );

    let state = AppState::new(workflow)
        .with_code_limiter(CodeRateLimiter::new(config.rate_limit.codes_per_minute));
    let app = create_router_with(state, config.server.request_timeout);

    let addr = SocketAddr::new(
        config
            .server
            .listen_addr
            .parse()
            .context("Invalid server.listen_addr")?,
        config.server.port,
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        warn!("Reaper task ended abnormally: {}", e);
    }

    info!("Shutting down...");
    Ok(())
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let writer = match &log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let ansi = log.file.is_none();

    let (json, pretty) = match log.format {
        LogFormat::Json => (Some(fmt::layer().json().with_writer(writer)), None),
        LogFormat::Pretty => (None, Some(fmt::layer().with_ansi(ansi).with_writer(writer))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
    Ok(())
}

async fn open_directory(
    config: &Config,
) -> Result<(Arc<dyn UserDirectory>, Arc<dyn SessionStore>)> {
    match &config.database.url {
        Some(url) => {
            let pool = connect_pool(
                url,
                config.database.max_connections,
                config.database.acquire_timeout,
            )
            .await
            .context("Failed to connect to Postgres")?;

            run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            Ok((
                Arc::new(PgUserDirectory::new(pool.clone())),
                Arc::new(PgSessionStore::new(pool)),
            ))
        }
        None => {
            info!("DATABASE__URL not set, using in-memory user directory");
            Ok((
                Arc::new(MemoryUserDirectory::new()),
                Arc::new(MemorySessionStore::new()),
            ))
        }
    }
}

async fn open_code_cache(config: &Config) -> Result<Arc<dyn OneTimeCodeCache>> {
    match &config.cache.url {
        Some(url) => {
            let cache = RedisCodeCache::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            Ok(Arc::new(cache))
        }
        None => {
            info!("CACHE__URL not set, using in-memory code cache");
            Ok(Arc::new(MemoryCodeCache::new()))
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM, or when `shutdown` is cancelled.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }

    info!("Shutdown signal received");
}
