#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Unroutable endpoint: any model call fails fast instead of reaching a provider.
#[allow(dead_code)]
pub const DEAD_ENDPOINT: &str = "http://127.0.0.1:9/v1";

/// Create a `lucipedia` command isolated to `data_dir`.
///
/// The config path points at a file that does not exist, so defaults plus the
/// variables set here are all that apply.
#[allow(dead_code)]
pub fn lucipedia_cmd(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lucipedia"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env("LUCIPEDIA_DATA_DIR", data_dir);
    cmd.env("LUCIPEDIA_CONFIG", data_dir.join("config.toml"));
    cmd.env("LLM_ENDPOINT", DEAD_ENDPOINT);
    cmd.env("LLM_MODELS", r#"["test-model"]"#);
    for key in ["DB_PATH", "SERVER_PORT", "LOG_LEVEL", "LLM_API_KEY", "RUST_LOG"] {
        cmd.env_remove(key);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}
