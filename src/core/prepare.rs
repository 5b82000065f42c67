//! Background frame preparation tasks
//!
//! Two units of work feed the cache ahead of display need:
//!
//! - [`PreloadTask`] renders a prefix of the animation through one reusable
//!   canvas, cloning each completed frame out. It reports all-or-nothing:
//!   any failure releases everything produced so far and calls `on_fail`.
//! - [`NearestFrameTask`] produces a single frame by replaying the renderer
//!   forward from the nearest cached ancestor, so seek cost is bounded by
//!   the distance to the closest cached frame instead of the distance to
//!   frame 0.
//!
//! Tasks have no cancellation primitive: output that is no longer wanted is
//! discarded by the cache-removal path.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::core::workers::TaskPriority;
use crate::entities::frame::{FrameBuffer, PixelFormat, SharedFrame};
use crate::entities::pool::BufferPool;
use crate::entities::renderer::FrameRenderer;

/// Resolver for already-cached frames, supplied by the scheduling side
pub type FrameLookup = Box<dyn Fn(usize) -> Option<SharedFrame> + Send>;

pub type PreloadSuccess = Box<dyn FnOnce(BTreeMap<usize, SharedFrame>) + Send>;
pub type PreloadFailure = Box<dyn FnOnce() + Send>;
pub type FrameReady = Box<dyn FnOnce(Option<SharedFrame>) + Send>;

/// Renders frames `[0, until_frame)` sequentially into a reusable canvas,
/// cloning each completed frame into the output map.
pub struct PreloadTask {
    renderer: Arc<dyn FrameRenderer>,
    pool: Arc<dyn BufferPool>,
    width: u32,
    height: u32,
    format: PixelFormat,
    until_frame: usize,
    on_success: PreloadSuccess,
    on_fail: PreloadFailure,
}

impl PreloadTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        renderer: Arc<dyn FrameRenderer>,
        pool: Arc<dyn BufferPool>,
        width: u32,
        height: u32,
        format: PixelFormat,
        until_frame: usize,
        on_success: PreloadSuccess,
        on_fail: PreloadFailure,
    ) -> Self {
        Self {
            renderer,
            pool,
            width,
            height,
            format,
            until_frame,
            on_success,
            on_fail,
        }
    }

    /// First-frame-only previews jump the queue; whole-animation preloads
    /// run behind everything else.
    pub fn priority(&self) -> TaskPriority {
        if self.until_frame <= 1 {
            TaskPriority::High
        } else {
            TaskPriority::Low
        }
    }

    pub fn run(self) {
        let PreloadTask {
            renderer,
            pool,
            width,
            height,
            format,
            until_frame,
            on_success,
            on_fail,
        } = self;

        let Some(mut canvas) = pool.acquire(width, height, format) else {
            warn!("preload aborted: no canvas buffer");
            on_fail();
            return;
        };

        let mut produced: BTreeMap<usize, SharedFrame> = BTreeMap::new();

        for index in 0..until_frame {
            if !canvas.is_valid() || !renderer.render_frame(index, &mut canvas) {
                warn!(
                    "preload failed at frame {}, discarding {} finished frames",
                    index,
                    produced.len()
                );
                return abort(produced, canvas, &pool, on_fail);
            }

            let Some(mut copy) = pool.acquire(width, height, format) else {
                warn!("preload failed at frame {}: no output buffer", index);
                return abort(produced, canvas, &pool, on_fail);
            };
            if !copy.copy_from(&canvas) {
                pool.release(copy);
                return abort(produced, canvas, &pool, on_fail);
            }
            produced.insert(index, SharedFrame::new(copy, Arc::clone(&pool)));
        }

        pool.release(canvas);
        debug!("preload finished: {} frames", produced.len());
        on_success(produced);
    }
}

/// No partial success: every buffer produced in this run and the canvas go
/// back before the failure is reported.
fn abort(
    produced: BTreeMap<usize, SharedFrame>,
    canvas: FrameBuffer,
    pool: &Arc<dyn BufferPool>,
    on_fail: PreloadFailure,
) {
    drop(produced);
    pool.release(canvas);
    on_fail();
}

/// Produces one frame on demand by replaying from the nearest cached
/// ancestor. Reports `None` when no ancestor exists or any replay step
/// fails; intermediate frames are overwritten in place and never reported.
pub struct NearestFrameTask {
    renderer: Arc<dyn FrameRenderer>,
    pool: Arc<dyn BufferPool>,
    target: usize,
    lookup: FrameLookup,
    on_done: FrameReady,
}

impl NearestFrameTask {
    pub fn new(
        renderer: Arc<dyn FrameRenderer>,
        pool: Arc<dyn BufferPool>,
        target: usize,
        lookup: FrameLookup,
        on_done: FrameReady,
    ) -> Self {
        Self {
            renderer,
            pool,
            target,
            lookup,
            on_done,
        }
    }

    pub fn priority(&self) -> TaskPriority {
        TaskPriority::Medium
    }

    pub fn run(self) {
        let NearestFrameTask {
            renderer,
            pool,
            target,
            lookup,
            on_done,
        } = self;

        // nearest cached ancestor, scanning target..=0
        let mut ancestor = None;
        for index in (0..=target).rev() {
            if let Some(frame) = lookup(index) {
                if frame.is_valid() {
                    ancestor = Some((index, frame));
                    break;
                }
            }
        }

        let Some((start, frame)) = ancestor else {
            debug!("no cached ancestor for frame {}", target);
            on_done(None);
            return;
        };

        if start == target {
            on_done(Some(frame));
            return;
        }

        let Some(mut canvas) = pool.acquire(frame.width(), frame.height(), frame.format()) else {
            on_done(None);
            return;
        };
        if !canvas.copy_from(frame.buffer()) {
            pool.release(canvas);
            on_done(None);
            return;
        }
        drop(frame);

        for index in start + 1..=target {
            if !renderer.render_frame(index, &mut canvas) {
                debug!("replay failed at frame {} (target {})", index, target);
                pool.release(canvas);
                on_done(None);
                return;
            }
        }

        on_done(Some(SharedFrame::new(canvas, pool)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::pool::testing::{CloneDyn, CountingPool};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Renderer that records requested indexes and fails on command.
    /// Writes the frame index into the first pixel byte on success.
    struct ScriptedRenderer {
        rendered: Mutex<Vec<usize>>,
        fail_at: Option<usize>,
    }

    impl ScriptedRenderer {
        fn new(fail_at: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                rendered: Mutex::new(Vec::new()),
                fail_at,
            })
        }

        fn rendered(&self) -> Vec<usize> {
            self.rendered.lock().unwrap().clone()
        }
    }

    impl FrameRenderer for ScriptedRenderer {
        fn render_frame(&self, index: usize, target: &mut FrameBuffer) -> bool {
            self.rendered.lock().unwrap().push(index);
            if self.fail_at == Some(index) {
                return false;
            }
            target.pixels_mut()[0] = index as u8;
            true
        }
    }

    #[test]
    fn test_preload_success() {
        let pool = CountingPool::shared();
        let renderer = ScriptedRenderer::new(None);
        let result: Arc<Mutex<Option<BTreeMap<usize, SharedFrame>>>> =
            Arc::new(Mutex::new(None));

        let result_slot = Arc::clone(&result);
        let task = PreloadTask::new(
            renderer.clone(),
            pool.clone_dyn(),
            2,
            2,
            PixelFormat::Rgba8888,
            4,
            Box::new(move |frames| {
                *result_slot.lock().unwrap() = Some(frames);
            }),
            Box::new(|| panic!("must not fail")),
        );
        assert_eq!(task.priority(), TaskPriority::Low);
        task.run();

        let frames = result.lock().unwrap().take().unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[&3].buffer().pixels()[0], 3);
        assert_eq!(renderer.rendered(), vec![0, 1, 2, 3]);
        // everything alive is exactly the four output frames
        assert_eq!(pool.outstanding(), 4);
        drop(frames);
        assert_eq!(pool.outstanding(), 0);
    }

    /// Test: a mid-run failure releases every produced buffer and the
    /// canvas, reports on_fail and never on_success
    #[test]
    fn test_preload_failure_containment() {
        let pool = CountingPool::shared();
        let renderer = ScriptedRenderer::new(Some(6));
        let failed = Arc::new(AtomicBool::new(false));

        let failed_flag = Arc::clone(&failed);
        let task = PreloadTask::new(
            renderer,
            pool.clone_dyn(),
            2,
            2,
            PixelFormat::Rgba8888,
            10,
            Box::new(|_| panic!("partial success reported")),
            Box::new(move || failed_flag.store(true, Ordering::SeqCst)),
        );
        task.run();

        assert!(failed.load(Ordering::SeqCst));
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_first_frame_preview_is_high_priority() {
        let pool = CountingPool::shared();
        let task = PreloadTask::new(
            ScriptedRenderer::new(None),
            pool.clone_dyn(),
            2,
            2,
            PixelFormat::Rgba8888,
            1,
            Box::new(|_| {}),
            Box::new(|| {}),
        );
        assert_eq!(task.priority(), TaskPriority::High);
    }

    /// Test: with frames {0, 3} cached, requesting frame 5 replays only
    /// 4 and 5 from ancestor 3 and reports frame 5's pixels
    #[test]
    fn test_nearest_ancestor_replay() {
        let pool = CountingPool::shared();
        let renderer = ScriptedRenderer::new(None);

        let mut cached: HashMap<usize, SharedFrame> = HashMap::new();
        for index in [0usize, 3] {
            let mut buf = pool.acquire(2, 2, PixelFormat::Rgba8888).unwrap();
            buf.pixels_mut()[0] = index as u8;
            cached.insert(index, SharedFrame::new(buf, pool.clone_dyn()));
        }

        let result: Arc<Mutex<Option<Option<SharedFrame>>>> = Arc::new(Mutex::new(None));
        let result_slot = Arc::clone(&result);
        let task = NearestFrameTask::new(
            renderer.clone(),
            pool.clone_dyn(),
            5,
            Box::new(move |index| cached.get(&index).cloned()),
            Box::new(move |frame| {
                *result_slot.lock().unwrap() = Some(frame);
            }),
        );
        assert_eq!(task.priority(), TaskPriority::Medium);
        task.run();

        let frame = result.lock().unwrap().take().unwrap().unwrap();
        assert_eq!(renderer.rendered(), vec![4, 5]);
        assert_eq!(frame.buffer().pixels()[0], 5);
    }

    #[test]
    fn test_no_ancestor_reports_none() {
        let pool = CountingPool::shared();
        let renderer = ScriptedRenderer::new(None);
        let result: Arc<Mutex<Option<Option<SharedFrame>>>> = Arc::new(Mutex::new(None));

        let result_slot = Arc::clone(&result);
        let task = NearestFrameTask::new(
            renderer.clone(),
            pool.clone_dyn(),
            5,
            Box::new(|_| None),
            Box::new(move |frame| {
                *result_slot.lock().unwrap() = Some(frame);
            }),
        );
        task.run();

        assert!(result.lock().unwrap().take().unwrap().is_none());
        assert!(renderer.rendered().is_empty());
        assert_eq!(pool.outstanding(), 0);
    }

    /// Test: a cached target frame is returned directly, no replay
    #[test]
    fn test_cached_target_returned_directly() {
        let pool = CountingPool::shared();
        let renderer = ScriptedRenderer::new(None);

        let buf = pool.acquire(2, 2, PixelFormat::Rgba8888).unwrap();
        let cached = SharedFrame::new(buf, pool.clone_dyn());
        let result: Arc<Mutex<Option<Option<SharedFrame>>>> = Arc::new(Mutex::new(None));

        let result_slot = Arc::clone(&result);
        let task = NearestFrameTask::new(
            renderer.clone(),
            pool.clone_dyn(),
            2,
            Box::new(move |index| (index == 2).then(|| cached.clone())),
            Box::new(move |frame| {
                *result_slot.lock().unwrap() = Some(frame);
            }),
        );
        task.run();

        assert!(result.lock().unwrap().take().unwrap().is_some());
        assert!(renderer.rendered().is_empty());
    }
}
