//! ANIMATIC - animated-image frame cache and playback scheduling
//!
//! Format-agnostic engine deciding, for each displayed frame of a
//! multi-frame image, which decoded buffer to show and how to obtain it:
//! cache hit, buffer reuse, fresh decode or fallback. Decoded frames live in
//! a reference-counted bounded cache; preparation work runs on a
//! priority-ordered worker pool so playback never stalls the rendering
//! thread.
//!
//! Decoding and drawing stay outside: the host plugs in a [`FrameRenderer`],
//! a [`BufferPool`] and a [`DrawSurface`].

// Core engine (cache, scheduler, preparation, playback)
pub mod core;

// Frame data, identity, collaborator boundaries
pub mod entities;

pub mod config;

// Re-export commonly used types
pub use config::{AnimaticConfig, CachingKind};
pub use core::anim_cache::{AnimatedFrameCache, AnimationFrameSet};
pub use core::backend::PlaybackBackend;
pub use core::clock::PlaybackClock;
pub use core::fps::{compress, reduced_indexes, CompressionResult};
pub use core::memory_cache::{BoundedCache, CacheLease, CacheStats, Cached};
pub use core::params::{DefaultTrimStrategy, MemoryCacheParams, MemoryPressure, TrimStrategy};
pub use core::store::FrameStoreKind;
pub use core::strategy::{BufferedStrategy, DebouncedPrepare, FixedAheadStrategy, PrepareStrategy};
pub use core::workers::{NoThreadPriority, PriorityWorkers, TaskPriority, ThreadPriorityHint};
pub use entities::frame::{FrameBuffer, PixelFormat, SharedFrame};
pub use entities::keys::{AnimationId, FrameKey};
pub use entities::pool::{BufferPool, HeapPool, RecyclingPool};
pub use entities::renderer::{AnimationInfo, DrawSurface, FrameRenderer};
pub use entities::traits::{FrameOutcome, FrameStore};
