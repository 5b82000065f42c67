//! Cache budgets and memory-pressure trim policy
//!
//! **Why**: frame caches must answer two different questions - how much may
//! we hold in steady state, and how much must we give back when the host
//! signals pressure. The first is a budget record, the second a severity to
//! eviction-ratio mapping.
//!
//! **Used by**: `core/memory_cache.rs` (budgets + trim), `config.rs`

use log::info;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Immutable cache policy record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheParams {
    /// Total byte budget across all retained entries
    pub max_cache_size_bytes: usize,
    /// Total entry count budget
    pub max_cache_entries: usize,
    /// Byte budget for unshared entries awaiting eviction
    pub max_eviction_queue_size_bytes: usize,
    /// Entry count budget for the eviction queue
    pub max_eviction_queue_entries: usize,
    /// Entries larger than this are never retained
    pub max_single_entry_bytes: usize,
    /// How often a params supplier is re-consulted
    pub params_refresh_interval_ms: u64,
}

impl MemoryCacheParams {
    /// Derive a full record from one byte budget
    pub fn with_budget(max_bytes: usize) -> Self {
        Self {
            max_cache_size_bytes: max_bytes,
            max_cache_entries: 1024,
            max_eviction_queue_size_bytes: max_bytes / 2,
            max_eviction_queue_entries: 256,
            max_single_entry_bytes: max_bytes / 4,
            params_refresh_interval_ms: 5 * 60 * 1000,
        }
    }

    /// Size the budget from currently available system memory.
    ///
    /// # Arguments
    ///
    /// * `mem_fraction` - Fraction of available memory (0.0-1.0)
    pub fn for_system(mem_fraction: f64) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available = sys.available_memory() as usize;
        let max_bytes = (available as f64 * mem_fraction.clamp(0.0, 1.0)) as usize;

        info!(
            "cache budget: {} MB ({}% of {} MB available)",
            max_bytes / 1024 / 1024,
            (mem_fraction * 100.0) as u32,
            available / 1024 / 1024
        );

        Self::with_budget(max_bytes)
    }
}

impl Default for MemoryCacheParams {
    fn default() -> Self {
        // 64 MB: enough for several mid-size animations without probing the system
        Self::with_budget(64 * 1024 * 1024)
    }
}

/// Severity of an external memory-pressure signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryPressure {
    /// Advisory; keep warm content
    Low,
    /// Give back a meaningful share of idle content
    Moderate,
    /// Drop everything not in active use
    Critical,
}

/// Maps pressure severity to the fraction of the eviction queue to drop
pub trait TrimStrategy: Send + Sync {
    /// Fraction in `0.0..=1.0`
    fn trim_ratio(&self, pressure: MemoryPressure) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTrimStrategy;

impl TrimStrategy for DefaultTrimStrategy {
    fn trim_ratio(&self, pressure: MemoryPressure) -> f64 {
        match pressure {
            MemoryPressure::Low => 0.0,
            MemoryPressure::Moderate => 0.5,
            MemoryPressure::Critical => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_budget_derivation() {
        let params = MemoryCacheParams::with_budget(1000);
        assert_eq!(params.max_cache_size_bytes, 1000);
        assert_eq!(params.max_eviction_queue_size_bytes, 500);
        assert_eq!(params.max_single_entry_bytes, 250);
    }

    #[test]
    fn test_default_trim_ratios() {
        let strategy = DefaultTrimStrategy;
        assert_eq!(strategy.trim_ratio(MemoryPressure::Low), 0.0);
        assert_eq!(strategy.trim_ratio(MemoryPressure::Moderate), 0.5);
        assert_eq!(strategy.trim_ratio(MemoryPressure::Critical), 1.0);
    }
}
