//! JWKS Authorizer
//!
//! HTTP host for the authorization decider. Fetches the identity provider's
//! key set at startup, then serves `POST /authorize` until shut down.
//!
//! The process exits non-zero if no key set can ever be obtained, either at
//! startup or on the first request that needs one.

use anyhow::{anyhow, Context};
use jwks_authorizer::auth::{DiscoveryClient, HttpJsonFetcher, KeySetCache};
use jwks_authorizer::authorizer::Authorizer;
use jwks_authorizer::config::Config;
use jwks_authorizer::observability::metrics::init_metrics_recorder;
use jwks_authorizer::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jwks_authorizer=info,authorizer=info,tower_http=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!("Starting JWKS Authorizer");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        oidc_url = %config.oidc_url,
        bind_address = %config.bind_address,
        http_timeout_seconds = config.http_timeout.as_secs(),
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        issuer_check = config.expected_issuers.is_some(),
        audience_check = config.expected_audiences.is_some(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| anyhow!(e))?;

    let fetcher = Arc::new(HttpJsonFetcher::new(config.http_timeout));
    let discovery = DiscoveryClient::new(config.oidc_url.clone(), fetcher);
    let key_cache = Arc::new(KeySetCache::new(discovery));

    // Without an initial key set no request can ever be allowed
    let key_count = key_cache
        .prefetch()
        .await
        .context("Initial JWKS fetch failed")?;
    info!(key_count, "Initial JWKS fetched");

    let fatal = CancellationToken::new();
    let state = Arc::new(AppState {
        authorizer: Arc::new(Authorizer::from_config(&config, key_cache)),
        fatal: fatal.clone(),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("JWKS Authorizer listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fatal.clone(), config.drain_seconds))
        .await?;

    if fatal.is_cancelled() {
        error!("JWKS Authorizer stopped: no key set could be obtained");
        return Err(anyhow!("fatal JWKS fetch failure"));
    }

    info!("JWKS Authorizer shutdown complete");

    Ok(())
}

/// Resolves on SIGINT, SIGTERM or a fatal key fetch.
///
/// Signals wait out the drain period; a fatal key fetch stops immediately.
async fn shutdown_signal(fatal: CancellationToken, drain_seconds: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = fatal.cancelled() => {
            error!("Fatal JWKS fetch failure, shutting down");
            return;
        }
    }

    if drain_seconds > 0 {
        warn!("Draining connections for {} seconds...", drain_seconds);
        tokio::time::sleep(Duration::from_secs(drain_seconds)).await;
        info!("Drain period complete");
    }
}
