//! Cache identity for animations and frames
//!
//! Two animations decoded from the same bytes should share cache slots when
//! the host opts into deep equality; otherwise every decode gets its own
//! identity and its frames never collide with another instance's.

use std::hash::{DefaultHasher, Hash, Hasher};

use uuid::Uuid;

/// Identity of one animation inside the caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationId {
    /// Structural hash of the decoded result. Equal content maps to the
    /// same cache slots regardless of which decode produced it.
    Content(u64),
    /// Unique per decode instance
    Instance(Uuid),
}

impl AnimationId {
    /// Deep-equality identity from anything hashable (decoder output,
    /// source digest, url)
    pub fn content<H: Hash + ?Sized>(source: &H) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        AnimationId::Content(hasher.finish())
    }

    /// Fresh per-instance identity
    pub fn instance() -> Self {
        AnimationId::Instance(Uuid::new_v4())
    }
}

/// Identity of one frame: animation plus frame index.
/// Equal `(animation, index)` pairs always address the same cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub animation: AnimationId,
    pub index: usize,
}

impl FrameKey {
    pub fn new(animation: AnimationId, index: usize) -> Self {
        Self { animation, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: content identity is stable, instance identity is not
    #[test]
    fn test_identity_modes() {
        assert_eq!(AnimationId::content("same-bytes"), AnimationId::content("same-bytes"));
        assert_ne!(AnimationId::content("a"), AnimationId::content("b"));
        assert_ne!(AnimationId::instance(), AnimationId::instance());
    }

    #[test]
    fn test_frame_keys_collide_on_equal_parts() {
        let anim = AnimationId::content(&42u64);
        assert_eq!(FrameKey::new(anim, 3), FrameKey::new(anim, 3));
        assert_ne!(FrameKey::new(anim, 3), FrameKey::new(anim, 4));
    }
}
