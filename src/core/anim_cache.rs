//! Per-animation frame sets over the counting cache
//!
//! One cache entry per animation, holding every decoded frame the
//! preparation passes have produced so far. Saves merge forward: a save
//! never loses frames that earlier passes already paid to decode.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::core::memory_cache::{BoundedCache, Cached};
use crate::core::params::{MemoryCacheParams, MemoryPressure, TrimStrategy};
use crate::entities::frame::SharedFrame;
use crate::entities::keys::{AnimationId, FrameKey};

/// All decoded frames of one animation, owned collectively by the cache
/// entry. Cloning the set clones every member handle (bumping buffer
/// counts); dropping the set releases them together.
#[derive(Debug, Clone, Default)]
pub struct AnimationFrameSet {
    frames: BTreeMap<usize, SharedFrame>,
}

impl AnimationFrameSet {
    pub fn new(frames: BTreeMap<usize, SharedFrame>) -> Self {
        Self { frames }
    }

    pub fn frame(&self, index: usize) -> Option<&SharedFrame> {
        self.frames.get(&index)
    }

    pub fn frames(&self) -> &BTreeMap<usize, SharedFrame> {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Cached for AnimationFrameSet {
    /// Collective size: the sum of member buffer sizes
    fn size_in_bytes(&self) -> usize {
        self.frames.values().map(SharedFrame::size_in_bytes).sum()
    }

    fn is_valid(&self) -> bool {
        self.frames.values().all(SharedFrame::is_valid)
    }
}

/// Facade storing whole frame sets keyed by animation identity.
///
/// Shared by every animation instance in the process; `remove` and eviction
/// work per animation. Writes that race a removal are harmless: they
/// repopulate an entry that is immediately eligible for normal eviction.
#[derive(Clone)]
pub struct AnimatedFrameCache {
    cache: BoundedCache<AnimationId, AnimationFrameSet>,
}

impl AnimatedFrameCache {
    pub fn new(params: MemoryCacheParams) -> Self {
        Self {
            cache: BoundedCache::new(params),
        }
    }

    pub fn with_supplier(
        supplier: impl Fn() -> MemoryCacheParams + Send + 'static,
        trim_strategy: Box<dyn TrimStrategy>,
    ) -> Self {
        Self {
            cache: BoundedCache::with_supplier(supplier, trim_strategy),
        }
    }

    /// Clone of the frame at `key`, or None when the animation entry or the
    /// frame is absent or invalid. Never fails louder than None.
    pub fn get_frame(&self, key: FrameKey) -> Option<SharedFrame> {
        let lease = self.cache.get(&key.animation)?;
        let frame = lease.frame(key.index)?;
        if !frame.is_valid() {
            return None;
        }
        // the clone keeps the buffer alive after the lease drops
        Some(frame.clone())
    }

    /// Frame presence without recency side effects
    pub fn contains_frame(&self, key: FrameKey) -> bool {
        self.cache
            .inspect(&key.animation)
            .map(|set| set.frame(key.index).is_some())
            .unwrap_or(false)
    }

    /// Collective byte size of one animation's cached frames
    pub fn size_of(&self, animation: AnimationId) -> usize {
        self.cache
            .inspect(&animation)
            .map(|set| set.size_in_bytes())
            .unwrap_or(0)
    }

    /// Save frames for an animation, merging with any existing set.
    ///
    /// Frames present in `new_frames` overwrite; frames only in the old set
    /// are cloned forward so incremental preparation passes never lose work.
    /// The merged set replaces the entry atomically - the old set is
    /// released only after the new one is installed.
    ///
    /// Note the merge deliberately resurrects frames missing from a smaller
    /// save; callers that want true replacement call [`remove`] first.
    ///
    /// [`remove`]: AnimatedFrameCache::remove
    pub fn save(&self, animation: AnimationId, new_frames: BTreeMap<usize, SharedFrame>) {
        // hold the old set until the merged one is in place
        let old = self.cache.get(&animation);

        let mut merged = new_frames;
        if let Some(old_lease) = &old {
            for (index, frame) in old_lease.frames() {
                merged.entry(*index).or_insert_with(|| frame.clone());
            }
        }
        let count = merged.len();
        let lease = self.cache.cache(animation, AnimationFrameSet::new(merged));

        drop(lease);
        drop(old);
        trace!("saved animation set: {} frames", count);
    }

    /// Drop an animation and release all member frames held by the cache.
    /// Outstanding frame clones stay valid until their holders drop them.
    pub fn remove(&self, animation: AnimationId) -> bool {
        let removed = self.cache.remove_all(|k| *k == animation) > 0;
        if removed {
            debug!("removed animation from frame cache");
        }
        removed
    }

    pub fn size_in_bytes(&self) -> usize {
        self.cache.size_in_bytes()
    }

    pub fn count(&self) -> usize {
        self.cache.count()
    }

    pub fn trim(&self, pressure: MemoryPressure) {
        self.cache.trim(pressure);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
