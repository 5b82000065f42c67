//! Entities module - frame data, identity and collaborator boundaries
//!
//! Everything the engine in `core/` operates on lives here: decoded frame
//! buffers with shared-ownership handles, cache identity types, and the
//! traits implemented by the host (renderer, buffer pool, draw surface).

pub mod frame;
pub mod keys;
pub mod pool;
pub mod renderer;
pub mod traits;

pub use frame::{FrameBuffer, PixelFormat, SharedFrame};
pub use keys::{AnimationId, FrameKey};
pub use pool::{BufferPool, HeapPool, RecyclingPool};
pub use renderer::{AnimationInfo, DrawSurface, FrameRenderer};
pub use traits::{FrameOutcome, FrameStore};
