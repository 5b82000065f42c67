//! Abstract traits for dependency inversion.
//!
//! The playback backend consumes a caching strategy through the
//! [`FrameStore`] interface; the concrete closed set of strategies lives in
//! `core/store.rs`. Keeping the trait here lets `core` depend on `entities`
//! and not the other way around.

use enum_dispatch::enum_dispatch;

use crate::entities::frame::{FrameBuffer, PixelFormat, SharedFrame};
// Brought into scope for the `#[enum_dispatch]` generated `impl FrameStore for
// FrameStoreKind`, which is emitted at this (the trait) site.
#[allow(unused_imports)]
use crate::core::store::{BoundedStore, FrameStoreKind, KeepLastStore, NoopStore};

/// How a displayed frame's buffer was obtained.
///
/// Reported back to the store so it can apply differentiated retention
/// (a freshly created frame is worth more than a reused one; fallback and
/// dropped frames are failures and never cached under the requested index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameOutcome {
    /// Already rendered and found in the cache
    Cached,
    /// Rendered into a buffer reclaimed from the store
    Reused,
    /// Rendered into a freshly allocated buffer
    Created,
    /// Requested frame could not be produced; a previous frame was shown
    Fallback,
    /// Nothing could be shown
    Dropped,
}

/// Caching strategy interface consumed by the playback backend.
///
/// All methods take `&self` and are safe to call concurrently; stores
/// synchronize internally.
#[enum_dispatch]
pub trait FrameStore: Send + Sync {
    /// Already-rendered frame at this index, if retained
    fn cached_frame(&self, index: usize) -> Option<SharedFrame>;

    /// Hand out a buffer the renderer may overwrite, if the store holds one
    /// that is no longer shared and matches the requested geometry. The
    /// buffer leaves the store.
    fn reusable_buffer(&self, width: u32, height: u32, format: PixelFormat)
        -> Option<FrameBuffer>;

    /// Best previously rendered frame to show instead of `index` when the
    /// requested frame cannot be produced
    fn fallback_frame(&self, index: usize) -> Option<SharedFrame>;

    fn contains(&self, index: usize) -> bool;

    /// Report a frame that was rendered and displayed
    fn on_frame_rendered(&self, index: usize, frame: &SharedFrame, outcome: FrameOutcome);

    /// Report a frame produced ahead of need by a preparation task
    fn on_frame_prepared(&self, index: usize, frame: &SharedFrame, outcome: FrameOutcome);

    fn size_in_bytes(&self) -> usize;

    fn clear(&self);
}
