//! Shared plumbing for the `csbuild`/`cssearch` binaries: logging setup and
//! config-file loading. Kept out of `main.rs` so both binaries share it
//! without duplicating the `tracing_subscriber` dance.

use cs_core::Config;
use std::path::Path;

/// Initializes the global `tracing` subscriber. Library code never does
/// this itself (spec.md §10): only a binary's `main()` calls it, once.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_target(false)
        .init();
}

/// Loads a `Config` from a JSON file, if given, falling back to
/// `Config::default()` for any field the file omits (`#[serde(default)]`
/// on `Config` makes a partial file valid input).
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        None => Ok(Config::default()),
        Some(p) => {
            let text = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}
