//! Logging setup
//!
//! The subscriber is installed before the config file is read. Unless
//! `RUST_LOG` is set, it starts at `info` and switches to the configured
//! `logging.level` once the config is loaded.

use tracing_subscriber::{reload, EnvFilter, Registry};

/// Filter layer to put directly on the registry
pub type FilterLayer = reload::Layer<EnvFilter, Registry>;

/// Handle for changing the level after startup
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

pub fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "sttp_jobs={level},sttp_common={level},tower_http=info",
        level = level
    ))
}

/// Filter from `RUST_LOG`, else `info`
pub fn filter_layer() -> (FilterLayer, LogFilter) {
    let env_filter = EnvFilter::try_from_default_env();
    let from_env = env_filter.is_ok();
    let (layer, handle) = reload::Layer::new(env_filter.unwrap_or_else(|_| default_filter("info")));
    (layer, LogFilter { handle, from_env })
}

impl LogFilter {
    /// True when `RUST_LOG` chose the filter; the config level is then ignored
    pub fn is_from_env(&self) -> bool {
        self.from_env
    }

    pub fn apply_config_level(&self, level: &str) -> Result<(), reload::Error> {
        if self.from_env {
            return Ok(());
        }
        self.handle.reload(default_filter(level))
    }
}
