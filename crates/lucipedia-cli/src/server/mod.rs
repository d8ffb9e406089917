//! HTTP site: routing, admission control and graceful shutdown.
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `GET /` | Newest page, or first-run guidance |
//! | `GET /wiki/:slug` | Stored page, generated on first visit |
//! | `GET /random` | `302` to a random stored page |
//! | `GET /most-recent` | Newest page, `404` guidance when empty |
//! | `GET /all` | Every stored slug |
//! | `GET /search?q=` | Model-suggested slugs |
//! | `GET /healthz` | JSON liveness, exempt from rate limiting |

pub mod handlers;
pub mod middleware;
pub mod render;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use lucipedia_core::{RateLimiter, WikiService};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::CliError;

/// Shared request state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Page orchestrator.
    pub service: WikiService,
    /// Per-client admission control.
    pub limiter: Arc<RateLimiter>,
}

/// Build the router. Every route except `/healthz` is rate limited; all are logged.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::home))
        .route("/wiki/:slug", get(handlers::wiki))
        .route("/random", get(handlers::random))
        .route("/most-recent", get(handlers::most_recent))
        .route("/all", get(handlers::all_pages))
        .route("/search", get(handlers::search))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .route("/healthz", get(handlers::healthz))
        .with_state(state);
    with_request_layers(routes)
}

/// Wrap routes with, from the outside in: request ids, request logging and
/// panic recovery.
pub fn with_request_layers(routes: Router) -> Router {
    routes
        .layer(axum::middleware::from_fn(middleware::catch_panic))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(axum::middleware::from_fn(middleware::assign_request_id))
}

/// Serve until Ctrl-C or SIGTERM, then drain for at most `grace`.
pub async fn run(state: AppState, bind: &str, grace: Duration) -> Result<()> {
    let addr: SocketAddr = bind
        .trim()
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))
        .map_err(CliError::usage)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let sweeper = state.limiter.spawn_sweeper();
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    });
    let mut server = tokio::spawn(async move { server.await });
    info!(%addr, "lucipedia listening");

    tokio::select! {
        joined = &mut server => {
            abort_sweeper(sweeper);
            return joined.context("server task panicked")?.context("server error");
        },
        () = shutdown_signal() => {},
    }

    info!(grace_secs = grace.as_secs(), "shutdown signal received, draining connections");
    let _ = stop_tx.send(true);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined.context("server task panicked")?.context("server error")?,
        Err(_) => {
            warn!("grace period elapsed, dropping open connections");
            server.abort();
        },
    }
    abort_sweeper(sweeper);
    info!("server stopped");
    Ok(())
}

fn abort_sweeper(sweeper: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = sweeper {
        handle.abort();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
