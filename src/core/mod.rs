//! Core engine modules - cache, scheduler, preparation, playback
//!
//! These modules form the playback engine, independent of any decoder or
//! rendering surface.

pub mod anim_cache;
pub mod backend;
pub mod clock;
pub mod fps;
pub mod memory_cache;
pub mod params;
pub mod prepare;
pub mod store;
pub mod strategy;
pub mod workers;

// Re-exports for convenience
pub use anim_cache::{AnimatedFrameCache, AnimationFrameSet};
pub use backend::PlaybackBackend;
pub use clock::PlaybackClock;
pub use fps::{compress, reduced_indexes, CompressionResult, MAX_TARGET_FPS};
pub use memory_cache::{BoundedCache, CacheLease, CacheStats, Cached};
pub use params::{DefaultTrimStrategy, MemoryCacheParams, MemoryPressure, TrimStrategy};
pub use prepare::{NearestFrameTask, PreloadTask};
pub use store::{BoundedStore, FrameStoreKind, KeepLastStore, NoopStore};
pub use strategy::{
    BufferedStrategy, DebouncedPrepare, FixedAheadStrategy, PrepareContext, PrepareStrategy,
};
pub use workers::{NoThreadPriority, PriorityWorkers, TaskPriority, ThreadPriorityHint};
