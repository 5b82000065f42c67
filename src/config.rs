//! Host configuration surface
//!
//! One serde record covering everything the embedding application decides:
//! caching strategy, cache budgets, frame-rate cap, look-ahead sizing and
//! worker count. JSON persistence for tooling and reproducible setups.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::params::MemoryCacheParams;

/// Default cap applied to animation frame rates
pub const DEFAULT_FPS_CAP: u32 = 30;
/// Default fixed look-ahead window
pub const DEFAULT_LOOKAHEAD: usize = 3;
/// Default buffered-window size for the high-throughput path
pub const DEFAULT_BUFFER_AHEAD: usize = 6;

/// Which caching strategy the playback backend gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachingKind {
    /// Cache nothing; every frame is produced on demand
    None,
    /// Keep only the last displayed frame (minimal memory)
    KeepLast,
    /// Full bounded per-animation retention
    #[default]
    Bounded,
}

/// Complete configuration consumed from the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimaticConfig {
    pub caching: CachingKind,
    pub cache: MemoryCacheParams,
    /// Animations above this rate are frame-rate compressed
    pub fps_cap: u32,
    /// Fixed-ahead strategy window
    pub lookahead: usize,
    /// Buffered strategy window
    pub buffer_ahead: usize,
    /// Worker thread count; None picks 2x available parallelism
    pub workers: Option<usize>,
    /// Derive animation identity from content instead of decode instance,
    /// so equal animations share cache slots
    pub deep_equality: bool,
}

impl Default for AnimaticConfig {
    fn default() -> Self {
        Self {
            caching: CachingKind::default(),
            cache: MemoryCacheParams::default(),
            fps_cap: DEFAULT_FPS_CAP,
            lookahead: DEFAULT_LOOKAHEAD,
            buffer_ahead: DEFAULT_BUFFER_AHEAD,
            workers: None,
            deep_equality: false,
        }
    }
}

impl AnimaticConfig {
    /// Save configuration as pretty JSON, fixing up the extension
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let path = if path.extension().and_then(|s| s.to_str()) != Some("json") {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };

        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write config to {}", path.display()))?;

        info!("config saved to {}", path.display());
        Ok(())
    }

    pub fn from_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read config from {}", path.display()))?;
        let config = serde_json::from_str(&json).context("parse config")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnimaticConfig::default();
        assert_eq!(config.caching, CachingKind::Bounded);
        assert_eq!(config.fps_cap, DEFAULT_FPS_CAP);
        assert!(config.workers.is_none());
        assert!(!config.deep_equality);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = std::env::temp_dir().join("animatic-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config"); // extension gets fixed up

        let config = AnimaticConfig {
            caching: CachingKind::KeepLast,
            fps_cap: 24,
            ..Default::default()
        };
        config.to_json(&path).unwrap();

        let loaded = AnimaticConfig::from_json(&dir.join("config.json")).unwrap();
        assert_eq!(loaded.caching, CachingKind::KeepLast);
        assert_eq!(loaded.fps_cap, 24);
        assert_eq!(loaded.cache, config.cache);

        std::fs::remove_dir_all(&dir).ok();
    }
}
