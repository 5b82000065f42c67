//! Look-ahead preparation policies
//!
//! Strategies decide which frames to produce ahead of the playhead. They
//! run on the rendering/query thread and only *schedule* work: actual pixel
//! production happens on the worker pool, and completed frames flow back
//! into the store either directly (fixed-ahead) or over a channel drained
//! on the next call (buffered).

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;

use crate::core::fps::reduced_indexes;
use crate::core::prepare::NearestFrameTask;
use crate::core::store::FrameStoreKind;
use crate::core::workers::{PriorityWorkers, TaskPriority};
use crate::entities::frame::SharedFrame;
use crate::entities::pool::BufferPool;
use crate::entities::renderer::{AnimationInfo, FrameRenderer};
use crate::entities::traits::{FrameOutcome, FrameStore};

/// Everything a strategy needs to schedule preparation work
pub struct PrepareContext {
    pub renderer: Arc<dyn FrameRenderer>,
    pub pool: Arc<dyn BufferPool>,
    pub store: Arc<FrameStoreKind>,
    pub workers: Arc<PriorityWorkers>,
    pub info: AnimationInfo,
}

/// Policy deciding which frames to proactively schedule
pub trait PrepareStrategy: Send {
    /// Called after every displayed frame with the current position
    fn prepare(&mut self, ctx: &PrepareContext, current_index: usize);
}

type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// Schedule the next N frames (wrapping), skipping frames already cached.
///
/// The completion callback fires once all N have been *attempted* - already
/// cached counts as attempted, and failures are tolerated; they never block
/// the callback.
pub struct FixedAheadStrategy {
    ahead: usize,
    on_complete: Option<CompletionCallback>,
}

impl FixedAheadStrategy {
    pub fn new(ahead: usize) -> Self {
        Self {
            ahead,
            on_complete: None,
        }
    }

    pub fn with_completion(ahead: usize, on_complete: CompletionCallback) -> Self {
        Self {
            ahead,
            on_complete: Some(on_complete),
        }
    }
}

fn attempted(pending: &AtomicUsize, on_complete: Option<&CompletionCallback>) {
    if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
        if let Some(cb) = on_complete {
            cb();
        }
    }
}

impl PrepareStrategy for FixedAheadStrategy {
    fn prepare(&mut self, ctx: &PrepareContext, current_index: usize) {
        let frame_count = ctx.info.frame_count();
        if self.ahead == 0 || frame_count == 0 {
            if let Some(cb) = &self.on_complete {
                cb();
            }
            return;
        }

        let pending = Arc::new(AtomicUsize::new(self.ahead));
        for step in 1..=self.ahead {
            let index = (current_index + step) % frame_count;
            if ctx.store.contains(index) {
                attempted(&pending, self.on_complete.as_ref());
                continue;
            }

            let store = Arc::clone(&ctx.store);
            let lookup_store = Arc::clone(&ctx.store);
            let pending = Arc::clone(&pending);
            let on_complete = self.on_complete.clone();
            let task = NearestFrameTask::new(
                Arc::clone(&ctx.renderer),
                Arc::clone(&ctx.pool),
                index,
                Box::new(move |i| lookup_store.cached_frame(i)),
                Box::new(move |result| {
                    if let Some(frame) = result {
                        store.on_frame_prepared(index, &frame, FrameOutcome::Created);
                    }
                    attempted(&pending, on_complete.as_ref());
                }),
            );
            let priority = task.priority();
            ctx.workers.execute(priority, move || task.run());
        }
    }
}

/// Rolling decoded-frame window ahead of the playhead.
///
/// The display-size downscale and the frame-rate cap apply here: fill tasks
/// render at the bounded display dimensions, and only run anchors under the
/// cap are ever produced, so a capped animation decodes a fraction of its
/// frames. Completed frames come back over a channel and are drained into
/// the store at the start of the next `prepare` call.
pub struct BufferedStrategy {
    buffer_ahead: usize,
    fps_cap: u32,
    bounds: Option<(u32, u32)>,
    index_map: Option<BTreeMap<usize, usize>>,
    /// Anchors scheduled but not yet drained, to avoid duplicate fills
    inflight: HashSet<usize>,
    completed_tx: Sender<(usize, Option<SharedFrame>)>,
    completed_rx: Receiver<(usize, Option<SharedFrame>)>,
}

impl BufferedStrategy {
    pub fn new(buffer_ahead: usize, fps_cap: u32) -> Self {
        let (completed_tx, completed_rx) = unbounded();
        Self {
            buffer_ahead,
            fps_cap,
            bounds: None,
            index_map: None,
            inflight: HashSet::new(),
            completed_tx,
            completed_rx,
        }
    }

    /// Downscale fills to the display size; never upscales past native
    pub fn set_bounds(&mut self, width: u32, height: u32) {
        self.bounds = Some((width, height));
    }

    fn render_dims(&self, info: &AnimationInfo) -> (u32, u32) {
        match self.bounds {
            Some((w, h)) => (w.min(info.width).max(1), h.min(info.height).max(1)),
            None => (info.width, info.height),
        }
    }

    fn drain_completed(&mut self, ctx: &PrepareContext) {
        while let Ok((index, frame)) = self.completed_rx.try_recv() {
            self.inflight.remove(&index);
            if let Some(frame) = frame {
                trace!("buffered fill completed: frame {}", index);
                ctx.store.on_frame_prepared(index, &frame, FrameOutcome::Created);
            }
        }
    }
}

impl PrepareStrategy for BufferedStrategy {
    fn prepare(&mut self, ctx: &PrepareContext, current_index: usize) {
        self.drain_completed(ctx);

        let frame_count = ctx.info.frame_count();
        if frame_count == 0 {
            return;
        }

        let (width, height) = self.render_dims(&ctx.info);
        let fps_cap = self.fps_cap;
        let map = self
            .index_map
            .get_or_insert_with(|| reduced_indexes(ctx.info.duration_ms(), frame_count, fps_cap));

        // step 0 services the immediately-needed frame ahead of the window
        for step in 0..=self.buffer_ahead {
            let index = (current_index + step) % frame_count;
            let anchor = map.get(&index).copied().unwrap_or(index);
            if ctx.store.contains(anchor) || self.inflight.contains(&anchor) {
                continue;
            }
            self.inflight.insert(anchor);

            let priority = if step == 0 {
                TaskPriority::High
            } else {
                TaskPriority::Medium
            };
            let renderer = Arc::clone(&ctx.renderer);
            let pool = Arc::clone(&ctx.pool);
            let tx = self.completed_tx.clone();
            let format = ctx.info.format;
            ctx.workers.execute(priority, move || {
                let Some(mut buf) = pool.acquire(width, height, format) else {
                    let _ = tx.send((anchor, None));
                    return;
                };
                if renderer.render_frame(anchor, &mut buf) {
                    let _ = tx.send((anchor, Some(SharedFrame::new(buf, pool))));
                } else {
                    pool.release(buf);
                    let _ = tx.send((anchor, None));
                }
            });
        }
    }
}

/// Delays full look-ahead while the position is changing rapidly.
///
/// Seek storms would otherwise flood the scheduler with work that is stale
/// before it runs. The immediately-needed frame is still produced by the
/// synchronous path; only the look-ahead is debounced.
#[derive(Debug, Clone)]
pub struct DebouncedPrepare {
    delay: Duration,
    pending: Option<(usize, Instant)>,
}

impl Default for DebouncedPrepare {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(150),
            pending: None,
        }
    }
}

impl DebouncedPrepare {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay.as_millis() as u64
    }

    /// Schedule look-ahead around `index`. Re-scheduling resets the timer.
    pub fn schedule(&mut self, index: usize) {
        self.pending = Some((index, Instant::now() + self.delay));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Returns the settled position once the delay has elapsed, then clears
    pub fn tick(&mut self) -> Option<usize> {
        let (index, trigger_at) = self.pending?;
        if Instant::now() >= trigger_at {
            self.pending = None;
            Some(index)
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_index(&self) -> Option<usize> {
        self.pending.map(|(index, _)| index)
    }
}
