use std::sync::Arc;

use anyhow::Result;
use lucipedia_core::{Config, RateLimiter, WikiService};
use tracing::info;

use crate::server::{self, AppState};

/// Run the HTTP site until a shutdown signal arrives.
///
/// `bind` overrides `server.bind` from configuration.
pub async fn execute(config: &Config, service: WikiService, bind: Option<&str>) -> Result<()> {
    let bind = bind.unwrap_or(&config.server.bind);
    let settings = config.rate_limit.settings();
    info!(
        burst = settings.burst,
        refill_per_second = settings.refill_per_second,
        idle_ttl_secs = settings.idle_ttl.as_secs(),
        "rate limiter configured"
    );

    let state = AppState {
        service,
        limiter: Arc::new(RateLimiter::new(settings)),
    };
    server::run(state, bind, config.server.shutdown_grace()).await
}
