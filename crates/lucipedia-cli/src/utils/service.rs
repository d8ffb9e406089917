//! Wiring from configuration to a ready [`WikiService`].

use std::sync::Arc;

use anyhow::{Context, Result};
use lucipedia_core::llm::{ChatClient, ChatGenerator, ChatSearcher, ResponseMode};
use lucipedia_core::{Config, FilePageStore, PageStore, WikiService};
use tracing::debug;

/// Load configuration from `--config` if given, else the default location,
/// then apply environment overrides.
pub fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let Some(path) = path else {
        return Config::load().context("loading configuration");
    };
    let mut config = if path.exists() {
        Config::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?
    } else {
        Config::default()
    };
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("applying environment overrides")?;
    Ok(config)
}

/// Open the page store under the configured data directory.
pub fn open_store(config: &Config) -> Arc<FilePageStore> {
    Arc::new(FilePageStore::new(&config.paths.data_dir))
}

/// Build the orchestrator over `store` with the configured model client.
///
/// No request is sent to the provider until a page is generated or a search
/// runs, so read-only commands work without credentials.
pub fn build_service(config: &Config, store: Arc<FilePageStore>) -> Result<WikiService> {
    let client = Arc::new(ChatClient::new(&config.llm).context("building chat client")?);
    let mode = if config.llm.structured_output {
        ResponseMode::Structured
    } else {
        ResponseMode::Html
    };
    debug!(
        models = ?client.models(),
        data_dir = %config.paths.data_dir.display(),
        ?mode,
        "building wiki service"
    );

    let generator = ChatGenerator::new(Arc::clone(&client), &config.llm).with_mode(mode);
    let searcher = ChatSearcher::new(client, &config.llm);

    Ok(WikiService::new(store as Arc<dyn PageStore>, Arc::new(generator), Arc::new(searcher))
        .with_generation_timeout(config.llm.timeout())
        .with_coalescing(config.server.coalesce_generations))
}
