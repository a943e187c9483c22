pub mod backup;
pub mod diff;
pub mod restore;
pub mod status;

use anyhow::{Context, Result};

use clawsync_core::Config;

/// Load the run configuration, failing before any side effect.
pub(crate) fn load_config() -> Result<Config> {
    Config::load().context("configuration error")
}
