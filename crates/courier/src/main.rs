//! The `courier` binary.
//!
//! Usage: `courier [CONFIG_FILE]`. Without an argument `courier.toml` is used
//! if it exists. `COURIER__*` environment variables (and `.env`) override the
//! file.

use anyhow::Context;
use courier_config::{ConfigLoader, DEFAULT_ENV_PREFIX};
use courier_telemetry::init_telemetry;

const DEFAULT_CONFIG_FILE: &str = "courier.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loader = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::new()
            .with_file(&path)
            .with_context(|| format!("failed to load {path}"))?,
        None => ConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE)?,
    };

    let config = loader
        .with_dotenv()?
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
        .context("invalid configuration")?;

    init_telemetry(&config.telemetry_config()).context("failed to initialise telemetry")?;

    courier::run(config).await
}
