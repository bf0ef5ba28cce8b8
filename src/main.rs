//! Identity Atlas — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, shared state, and middleware.
//!
//! See `README.md` for quickstart and endpoint reference.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use identity_atlas::api::{create_router, AppState};
use identity_atlas::cache::ScrapeCache;
use identity_atlas::config::AtlasConfig;
use identity_atlas::history::RunHistory;
use identity_atlas::metrics::Metrics;
use identity_atlas::registry::SourceRegistry;
use identity_atlas::scrape::ScrapeEngine;
use identity_atlas::session::HttpSession;

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("identity_atlas=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Arc::new(AtlasConfig::load());
    let session = Arc::new(HttpSession::new(config.http.clone()));
    let cache = Arc::new(ScrapeCache::new(config.cache.enabled));
    let registry = Arc::new(SourceRegistry::builtin(&session));
    let engine = Arc::new(ScrapeEngine::new(registry, cache.clone(), config.clone()));
    let history = Arc::new(RunHistory::with_capacity(config.scrape.history_capacity));

    let metrics = Metrics::init(&config);

    let state = AppState::new(engine, cache, history);
    let app = create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "identity-atlas listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(session))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, then tears down the shared HTTP session.
async fn shutdown_signal(session: Arc<HttpSession>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, closing HTTP session");
    session.shutdown();
}
