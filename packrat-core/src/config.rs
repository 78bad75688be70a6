//! Engine configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::pack::PACK_SIZE;

/// Tunables of the [`Engine`](crate::engine::Engine).
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Cards per pack. Zero is refused when the config is read.
    pub pack_size: NonZeroUsize,
    /// How many candidate cards to fetch per pull.
    pub pool_size: usize,
    /// Pulls each user gets per UTC day.
    pub daily_pull_limit: u32,
    /// Sets nobody can pull from at startup.
    pub locked_sets: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pack_size: NonZeroUsize::new(PACK_SIZE).unwrap_or(NonZeroUsize::MIN),
            pool_size: 100,
            daily_pull_limit: 10,
            locked_sets: Vec::new(),
        }
    }
}
