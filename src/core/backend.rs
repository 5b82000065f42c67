//! Animation playback backend - the per-frame decision chain
//!
//! **Why**: the rendering thread asks for one frame at a time and must never
//! block on the worker pool. For each request the backend walks a fixed
//! chain - cached, reuse, create, fallback, dropped - draws whatever it can,
//! reports exactly one outcome, and fires the look-ahead strategy so future
//! requests land on the cached path.
//!
//! **Used by**: the host's drawable/view layer, once per displayed frame

use std::sync::Arc;

use log::{debug, warn};

use crate::core::prepare::PreloadTask;
use crate::core::store::FrameStoreKind;
use crate::core::strategy::{PrepareContext, PrepareStrategy};
use crate::core::workers::PriorityWorkers;
use crate::entities::frame::{FrameBuffer, SharedFrame};
use crate::entities::pool::BufferPool;
use crate::entities::renderer::{AnimationInfo, DrawSurface, FrameRenderer};
use crate::entities::traits::{FrameOutcome, FrameStore};

type DrawStartListener = Box<dyn Fn(usize) + Send>;
type FrameDrawnListener = Box<dyn Fn(usize, FrameOutcome) + Send>;
type FrameDroppedListener = Box<dyn Fn(usize) + Send>;

/// Orchestrates cache, pool, renderer and preparation for one animation.
/// Lives on the rendering/query thread; the worker pool is fire-and-forget
/// relative to every draw.
pub struct PlaybackBackend {
    renderer: Arc<dyn FrameRenderer>,
    pool: Arc<dyn BufferPool>,
    store: Arc<FrameStoreKind>,
    workers: Arc<PriorityWorkers>,
    info: AnimationInfo,
    strategy: Box<dyn PrepareStrategy>,
    bounds: (u32, u32),
    on_draw_start: Option<DrawStartListener>,
    on_frame_drawn: Option<FrameDrawnListener>,
    on_frame_dropped: Option<FrameDroppedListener>,
}

impl PlaybackBackend {
    pub fn new(
        renderer: Arc<dyn FrameRenderer>,
        pool: Arc<dyn BufferPool>,
        store: Arc<FrameStoreKind>,
        workers: Arc<PriorityWorkers>,
        info: AnimationInfo,
        strategy: Box<dyn PrepareStrategy>,
    ) -> Self {
        let bounds = (info.width, info.height);
        Self {
            renderer,
            pool,
            store,
            workers,
            info,
            strategy,
            bounds,
            on_draw_start: None,
            on_frame_drawn: None,
            on_frame_dropped: None,
        }
    }

    /// Target render dimensions; never upscales past the native canvas
    pub fn set_bounds(&mut self, width: u32, height: u32) {
        self.bounds = (
            width.min(self.info.width).max(1),
            height.min(self.info.height).max(1),
        );
    }

    pub fn frame_count(&self) -> usize {
        self.info.frame_count()
    }

    /// 0 means loop forever
    pub fn loop_count(&self) -> u32 {
        self.info.loop_count
    }

    pub fn frame_duration_ms(&self, index: usize) -> Option<u32> {
        self.info.frame_duration_ms(index)
    }

    pub fn set_on_draw_start(&mut self, listener: DrawStartListener) {
        self.on_draw_start = Some(listener);
    }

    pub fn set_on_frame_drawn(&mut self, listener: FrameDrawnListener) {
        self.on_frame_drawn = Some(listener);
    }

    pub fn set_on_frame_dropped(&mut self, listener: FrameDroppedListener) {
        self.on_frame_dropped = Some(listener);
    }

    /// Produce and draw the frame at `index`, reporting exactly one outcome.
    ///
    /// Runs synchronously; never waits on the worker pool. Failures degrade
    /// to a fallback or dropped frame, never an error.
    pub fn draw_frame(&mut self, surface: &mut dyn DrawSurface, index: usize) -> FrameOutcome {
        if let Some(cb) = &self.on_draw_start {
            cb(index);
        }

        let outcome = self.produce_and_draw(surface, index);

        match outcome {
            FrameOutcome::Cached | FrameOutcome::Reused | FrameOutcome::Created => {
                if let Some(cb) = &self.on_frame_drawn {
                    cb(index, outcome);
                }
            }
            FrameOutcome::Fallback | FrameOutcome::Dropped => {
                if let Some(cb) = &self.on_frame_dropped {
                    cb(index);
                }
            }
        }

        // look-ahead runs for every outcome, including cache hits
        let ctx = self.prepare_context();
        self.strategy.prepare(&ctx, index);

        outcome
    }

    fn produce_and_draw(&mut self, surface: &mut dyn DrawSurface, index: usize) -> FrameOutcome {
        // 1. already rendered and cached
        if let Some(frame) = self.store.cached_frame(index) {
            surface.draw(frame.buffer());
            return FrameOutcome::Cached;
        }

        let (width, height) = self.bounds;
        let format = self.info.format;

        // 2. reuse a buffer the store no longer needs
        if let Some(buffer) = self.store.reusable_buffer(width, height, format) {
            if let Some(frame) = self.render_into(index, buffer) {
                surface.draw(frame.buffer());
                self.store
                    .on_frame_rendered(index, &frame, FrameOutcome::Reused);
                return FrameOutcome::Reused;
            }
        }

        // 3. fresh allocation
        if let Some(buffer) = self.pool.acquire(width, height, format) {
            if let Some(frame) = self.render_into(index, buffer) {
                surface.draw(frame.buffer());
                self.store
                    .on_frame_rendered(index, &frame, FrameOutcome::Created);
                return FrameOutcome::Created;
            }
        } else {
            debug!("buffer pool exhausted at frame {}", index);
        }

        // 4. show the last good frame instead
        if let Some(frame) = self.store.fallback_frame(index) {
            surface.draw(frame.buffer());
            return FrameOutcome::Fallback;
        }

        // 5. nothing to show
        warn!("frame {} dropped: no buffer, no fallback", index);
        FrameOutcome::Dropped
    }

    /// Render into an owned buffer; on failure the temporary goes straight
    /// back to the pool before returning.
    fn render_into(&self, index: usize, mut buffer: FrameBuffer) -> Option<SharedFrame> {
        if self.renderer.render_frame(index, &mut buffer) && buffer.is_valid() {
            Some(SharedFrame::new(buffer, Arc::clone(&self.pool)))
        } else {
            self.pool.release(buffer);
            None
        }
    }

    /// Queue a background preload of frames `[0, until_frame)` into the
    /// store. `until_frame == 1` is the first-frame preview path and jumps
    /// the queue.
    pub fn schedule_preload(&self, until_frame: usize) {
        let (width, height) = self.bounds;
        let store = Arc::clone(&self.store);
        let task = PreloadTask::new(
            Arc::clone(&self.renderer),
            Arc::clone(&self.pool),
            width,
            height,
            self.info.format,
            until_frame,
            Box::new(move |frames| {
                for (index, frame) in &frames {
                    store.on_frame_prepared(*index, frame, FrameOutcome::Created);
                }
            }),
            Box::new(move || {
                warn!("background preload failed");
            }),
        );
        let priority = task.priority();
        self.workers.execute(priority, move || task.run());
    }

    fn prepare_context(&self) -> PrepareContext {
        PrepareContext {
            renderer: Arc::clone(&self.renderer),
            pool: Arc::clone(&self.pool),
            store: Arc::clone(&self.store),
            workers: Arc::clone(&self.workers),
            info: self.info.clone(),
        }
    }
}
