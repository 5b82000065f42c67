//! Caching-strategy variants behind one interface
//!
//! A closed set of [`FrameStore`] implementations selected from
//! configuration by a single factory:
//!
//! - `Noop` - cache nothing, every frame is produced on demand
//! - `KeepLast` - one slot holding the last rendered frame; doubles as the
//!   reuse and fallback source
//! - `Bounded` - full per-animation frame retention over the counting cache

use std::sync::{Arc, Mutex};

use enum_dispatch::enum_dispatch;
use log::trace;

use crate::config::CachingKind;
use crate::core::anim_cache::AnimatedFrameCache;
use crate::entities::frame::{FrameBuffer, PixelFormat, SharedFrame};
use crate::entities::keys::{AnimationId, FrameKey};
use crate::entities::traits::{FrameOutcome, FrameStore};

/// Retains nothing
#[derive(Debug, Default)]
pub struct NoopStore;

impl FrameStore for NoopStore {
    fn cached_frame(&self, _index: usize) -> Option<SharedFrame> {
        None
    }

    fn reusable_buffer(
        &self,
        _width: u32,
        _height: u32,
        _format: PixelFormat,
    ) -> Option<FrameBuffer> {
        None
    }

    fn fallback_frame(&self, _index: usize) -> Option<SharedFrame> {
        None
    }

    fn contains(&self, _index: usize) -> bool {
        false
    }

    fn on_frame_rendered(&self, _index: usize, _frame: &SharedFrame, _outcome: FrameOutcome) {}

    fn on_frame_prepared(&self, _index: usize, _frame: &SharedFrame, _outcome: FrameOutcome) {}

    fn size_in_bytes(&self) -> usize {
        0
    }

    fn clear(&self) {}
}

/// Single-slot store: the last displayed frame only.
///
/// The held frame serves three roles: cache hit when the same index is
/// requested again, reusable render target once nobody else references it,
/// and fallback when the requested frame cannot be produced.
#[derive(Debug, Default)]
pub struct KeepLastStore {
    last: Mutex<Option<(usize, SharedFrame)>>,
}

impl KeepLastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameStore for KeepLastStore {
    fn cached_frame(&self, index: usize) -> Option<SharedFrame> {
        let last = self.last.lock().unwrap();
        last.as_ref()
            .filter(|(held, _)| *held == index)
            .map(|(_, frame)| frame.clone())
    }

    fn reusable_buffer(&self, width: u32, height: u32, format: PixelFormat)
        -> Option<FrameBuffer> {
        let mut last = self.last.lock().unwrap();
        let (index, frame) = last.take()?;
        if frame.width() == width && frame.height() == height && frame.format() == format {
            match frame.try_into_buffer() {
                Ok(buffer) => {
                    trace!("reusing last frame buffer for render");
                    return Some(buffer);
                }
                // still shared somewhere; put it back untouched
                Err(frame) => *last = Some((index, frame)),
            }
        } else {
            *last = Some((index, frame));
        }
        None
    }

    fn fallback_frame(&self, _index: usize) -> Option<SharedFrame> {
        let last = self.last.lock().unwrap();
        last.as_ref().map(|(_, frame)| frame.clone())
    }

    fn contains(&self, index: usize) -> bool {
        let last = self.last.lock().unwrap();
        matches!(last.as_ref(), Some((held, _)) if *held == index)
    }

    fn on_frame_rendered(&self, index: usize, frame: &SharedFrame, outcome: FrameOutcome) {
        if matches!(outcome, FrameOutcome::Fallback | FrameOutcome::Dropped) {
            return;
        }
        let mut last = self.last.lock().unwrap();
        *last = Some((index, frame.clone()));
    }

    fn on_frame_prepared(&self, _index: usize, _frame: &SharedFrame, _outcome: FrameOutcome) {
        // prepared frames were never displayed; the slot tracks display only
    }

    fn size_in_bytes(&self) -> usize {
        let last = self.last.lock().unwrap();
        last.as_ref().map(|(_, f)| f.size_in_bytes()).unwrap_or(0)
    }

    fn clear(&self) {
        let mut last = self.last.lock().unwrap();
        *last = None;
    }
}

/// Full retention through the shared per-animation counting cache
pub struct BoundedStore {
    animation: AnimationId,
    cache: Arc<AnimatedFrameCache>,
    /// Index of the last successfully displayed frame, for the fallback path
    last_rendered: Mutex<Option<usize>>,
}

impl BoundedStore {
    pub fn new(animation: AnimationId, cache: Arc<AnimatedFrameCache>) -> Self {
        Self {
            animation,
            cache,
            last_rendered: Mutex::new(None),
        }
    }

    fn save_one(&self, index: usize, frame: &SharedFrame) {
        let mut frames = std::collections::BTreeMap::new();
        frames.insert(index, frame.clone());
        self.cache.save(self.animation, frames);
    }
}

impl FrameStore for BoundedStore {
    fn cached_frame(&self, index: usize) -> Option<SharedFrame> {
        self.cache.get_frame(FrameKey::new(self.animation, index))
    }

    fn reusable_buffer(
        &self,
        _width: u32,
        _height: u32,
        _format: PixelFormat,
    ) -> Option<FrameBuffer> {
        // retained frames are worth more as future cache hits than as
        // scratch buffers
        None
    }

    fn fallback_frame(&self, _index: usize) -> Option<SharedFrame> {
        let last = *self.last_rendered.lock().unwrap();
        self.cache.get_frame(FrameKey::new(self.animation, last?))
    }

    fn contains(&self, index: usize) -> bool {
        self.cache.contains_frame(FrameKey::new(self.animation, index))
    }

    fn on_frame_rendered(&self, index: usize, frame: &SharedFrame, outcome: FrameOutcome) {
        if matches!(outcome, FrameOutcome::Fallback | FrameOutcome::Dropped) {
            return;
        }
        self.save_one(index, frame);
        *self.last_rendered.lock().unwrap() = Some(index);
    }

    fn on_frame_prepared(&self, index: usize, frame: &SharedFrame, outcome: FrameOutcome) {
        if matches!(outcome, FrameOutcome::Fallback | FrameOutcome::Dropped) {
            return;
        }
        // prepared but not displayed: retained, but not a fallback candidate
        self.save_one(index, frame);
    }

    fn size_in_bytes(&self) -> usize {
        self.cache.size_of(self.animation)
    }

    fn clear(&self) {
        self.cache.remove(self.animation);
        *self.last_rendered.lock().unwrap() = None;
    }
}

/// The closed strategy set. Dispatches [`FrameStore`] calls to the selected
/// variant without dynamic allocation.
#[enum_dispatch(FrameStore)]
pub enum FrameStoreKind {
    Noop(NoopStore),
    KeepLast(KeepLastStore),
    Bounded(BoundedStore),
}

impl FrameStoreKind {
    /// Single factory selecting a variant from configuration
    pub fn from_config(
        kind: CachingKind,
        animation: AnimationId,
        cache: &Arc<AnimatedFrameCache>,
    ) -> Self {
        match kind {
            CachingKind::None => FrameStoreKind::Noop(NoopStore),
            CachingKind::KeepLast => FrameStoreKind::KeepLast(KeepLastStore::new()),
            CachingKind::Bounded => {
                FrameStoreKind::Bounded(BoundedStore::new(animation, Arc::clone(cache)))
            }
        }
    }
}
