use std::path::{Path, PathBuf};

/// Store configuration, grounded on `zebra-state`'s `Config`/`sled_config`
/// pattern referenced (but not retrieved) from `sled_state.rs`'s
/// `FinalizedState::new(config: &Config, ...)`.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory the sled database lives in.
    pub cache_dir: PathBuf,
    /// How many net-applied blocks a streaming apply lets through before
    /// ending one transaction and starting the next (spec.md §4.5, §4.6).
    pub checkpoint_interval_blocks: u64,
    /// Width, in seconds, of a lock-schedule timestamp bucket (spec.md §4.3).
    pub lock_bucket_width_secs: u64,
}

impl Config {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Config {
            cache_dir: cache_dir.into(),
            checkpoint_interval_blocks: 1000,
            lock_bucket_width_secs: 240,
        }
    }

    pub fn store_path(&self, network_tag: &str) -> PathBuf {
        self.cache_dir.join("chainindex").join(network_tag)
    }

    pub fn sled_config(&self, network_tag: &str) -> sled::Config {
        sled::Config::default().path(self.store_path(network_tag))
    }
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| Path::new(".").to_path_buf());
        Config::new(cache_dir)
    }
}
