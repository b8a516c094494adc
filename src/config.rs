use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::env;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dapps_path: String, // directory of project descriptor files
    pub log_level: String,
}

/// Reads `.env` and the environment. Runs before logging is set up, so the
/// caller logs the result.
pub fn load() -> Result<Config> {
    dotenv().ok(); // .env is optional

    let dapps_path = env::var("DAPPS_PATH").unwrap_or_else(|_| "./dApps".to_string());

    // Any EnvFilter directive, e.g. "info" or "tx_describer=debug"
    let log_level = env::var("LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    EnvFilter::try_new(&log_level).wrap_err_with(|| format!("invalid LOG_LEVEL {log_level:?}"))?;

    Ok(Config {
        dapps_path,
        log_level,
    })
}
