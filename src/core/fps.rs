//! Frame-rate reduction
//!
//! Maps an animation timeline onto a reduced frame set honoring a target
//! frame-rate cap. Consecutive original frames collapse into runs; the run's
//! *first* index (the anchor) represents the whole run, so seeking any index
//! in a run lands on one decoded buffer.
//!
//! The compressor never releases buffers itself: superseded buffers are
//! handed back in [`CompressionResult::dropped`] and ownership stays with
//! the caller.

use std::collections::BTreeMap;

use log::debug;

use crate::entities::frame::SharedFrame;

/// Upper bound accepted for a target rate; higher requests clamp here
pub const MAX_TARGET_FPS: u32 = 60;

/// Output of one compression pass
#[derive(Debug, Default)]
pub struct CompressionResult {
    /// Retained buffers keyed by compressed (anchor) index
    pub frames: BTreeMap<usize, SharedFrame>,
    /// original index -> compressed index, defined for every original index
    pub index_map: BTreeMap<usize, usize>,
    /// Buffers superseded by their run anchor, for the caller to release
    pub dropped: Vec<SharedFrame>,
}

/// Map every original frame index to its anchor under the frame-rate cap.
///
/// Returns the identity map whenever `target_fps` already covers the
/// animation's native rate. An empty animation yields an empty map.
pub fn reduced_indexes(
    duration_ms: u64,
    frame_count: usize,
    target_fps: u32,
) -> BTreeMap<usize, usize> {
    let mut map = BTreeMap::new();
    if frame_count == 0 {
        return map;
    }

    let fps = target_fps.clamp(1, MAX_TARGET_FPS);
    if fps != target_fps {
        debug!("target fps {} clamped to {}", target_fps, fps);
    }

    let max_allowed = ((fps as u64).saturating_mul(duration_ms) / 1000) as usize;
    let max_allowed = max_allowed.min(frame_count);

    if max_allowed >= frame_count {
        for index in 0..frame_count {
            map.insert(index, index);
        }
        return map;
    }

    // zero allowed frames degenerates to "everything maps to frame 0"
    let skip_ratio = if max_allowed == 0 {
        frame_count as f64
    } else {
        frame_count as f64 / max_allowed as f64
    };
    let skip_ratio = if skip_ratio <= 0.0 { 1.0 } else { skip_ratio };

    let mut anchor = 0usize;
    for index in 0..frame_count {
        // a new run starts where the index crosses a skip-ratio boundary;
        // the anchor is sticky until the next run begins
        if (index as f64 % skip_ratio).floor() == 0.0 {
            anchor = index;
        }
        map.insert(index, anchor);
    }
    map
}

/// Collapse a frame map under the frame-rate cap.
///
/// Walks `frames` in original-index order; the first buffer seen for a
/// compressed index is retained under it, every later buffer mapping to the
/// same compressed index goes to `dropped`. Every input buffer ends up in
/// exactly one of the two output collections.
pub fn compress(
    duration_ms: u64,
    frames: BTreeMap<usize, SharedFrame>,
    target_fps: u32,
) -> CompressionResult {
    let frame_count = frames.keys().next_back().map(|&last| last + 1).unwrap_or(0);
    let index_map = reduced_indexes(duration_ms, frame_count, target_fps);

    let mut kept: BTreeMap<usize, SharedFrame> = BTreeMap::new();
    let mut dropped = Vec::new();

    for (index, frame) in frames {
        let compressed = index_map.get(&index).copied().unwrap_or(index);
        match kept.entry(compressed) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(frame);
            }
            std::collections::btree_map::Entry::Occupied(_) => dropped.push(frame),
        }
    }

    debug!(
        "fps compression: {} -> {} frames ({} dropped)",
        kept.len() + dropped.len(),
        kept.len(),
        dropped.len()
    );

    CompressionResult {
        frames: kept,
        index_map,
        dropped,
    }
}
