//! `SpendWatch` Server - spend-analytics API over Vertica.

use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use spendwatch_core::vertica::VerticaConnector;
use spendwatch_core::{ConnectionPool, ResponseCache, SpendwatchConfig};
use spendwatch_server::{api_router, ApiDoc, AppState};

/// SpendWatch Server - read-only spend analytics over Vertica
#[derive(Parser, Debug)]
#[command(name = "spendwatch-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "spendwatch.toml", env = "SPENDWATCH_CONFIG")]
    config: String,

    /// Host address to bind to (overrides the config file)
    #[arg(long, env = "SPENDWATCH_BIND_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SPENDWATCH_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting SpendWatch server...");

    // Load and validate configuration. The process must not serve
    // traffic with a half-configured pool.
    let mut config = SpendwatchConfig::load_from_path(&args.config)?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!(
        host = %config.database.host,
        database = %config.database.database,
        "configuration loaded"
    );

    // Construct the process-wide singletons and hand them to every
    // handler through the shared state.
    let connector = VerticaConnector::new(config.database.clone());
    let pool = Arc::new(ConnectionPool::new(Arc::new(connector), config.pool.clone()));
    let cache = Arc::new(ResponseCache::new(
        config.cache.max_keys,
        config.cache.default_ttl(),
    ));

    let evictor = Arc::clone(&pool).spawn_evictor();
    let sweeper = Arc::clone(&cache).spawn_sweeper(config.cache.sweep_interval());

    let state = Arc::new(AppState {
        pool: Arc::clone(&pool),
        cache,
        dev_mode: config.server.dev_mode,
    });

    // Build the app with Swagger UI
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());
    let mut app = api_router(state)
        .merge(Router::<()>::new().merge(swagger_ui))
        .layer(TraceLayer::new_for_http());
    if config.server.cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("SpendWatch server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Orderly teardown: stop background tasks, then drain the pool.
    sweeper.abort();
    evictor.abort();

    match pool.close().await {
        Ok(()) => {
            tracing::info!("connection pool closed, exiting");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to close the connection pool cleanly");
            std::process::exit(1);
        }
    }
}

/// Resolves when the process receives SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        () = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
