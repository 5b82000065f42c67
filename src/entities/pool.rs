//! Buffer pool boundary
//!
//! The engine never allocates pixel storage directly: every buffer is born
//! from a [`BufferPool`] and dies through one. Hosts plug in their own
//! allocator (GPU-backed, bitmap-recycling, instrumented); [`HeapPool`] and
//! [`RecyclingPool`] cover plain in-process use.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::trace;

use crate::entities::frame::{FrameBuffer, PixelFormat};

/// Allocator boundary for decoded frame storage.
///
/// `acquire` may fail (pool exhausted); callers treat that like any other
/// allocation failure and fall back. `release` must accept any buffer the
/// pool handed out, from any thread.
pub trait BufferPool: Send + Sync {
    fn acquire(&self, width: u32, height: u32, format: PixelFormat) -> Option<FrameBuffer>;
    fn release(&self, buffer: FrameBuffer);
}

/// Plain heap allocator: acquire allocates, release drops.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapPool;

impl BufferPool for HeapPool {
    fn acquire(&self, width: u32, height: u32, format: PixelFormat) -> Option<FrameBuffer> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(FrameBuffer::new(width, height, format))
    }

    fn release(&self, _buffer: FrameBuffer) {}
}

/// Heap pool that keeps a bounded number of released buffers around and
/// reuses them when geometry matches. Avoids churn during steady playback
/// where every frame has identical dimensions.
#[derive(Debug)]
pub struct RecyclingPool {
    idle: Mutex<VecDeque<FrameBuffer>>,
    max_idle: usize,
}

impl RecyclingPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(VecDeque::with_capacity(max_idle)),
            max_idle,
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}

impl Default for RecyclingPool {
    fn default() -> Self {
        Self::new(8)
    }
}

impl BufferPool for RecyclingPool {
    fn acquire(&self, width: u32, height: u32, format: PixelFormat) -> Option<FrameBuffer> {
        if width == 0 || height == 0 {
            return None;
        }
        let mut idle = self.idle.lock().unwrap();
        if let Some(pos) = idle
            .iter()
            .position(|b| b.width() == width && b.height() == height && b.format() == format)
        {
            let mut buf = idle.remove(pos)?;
            buf.pixels_mut().fill(0);
            trace!("pool reuse: {}x{} ({:?})", width, height, format);
            return Some(buf);
        }
        drop(idle);
        Some(FrameBuffer::new(width, height, format))
    }

    fn release(&self, buffer: FrameBuffer) {
        let mut idle = self.idle.lock().unwrap();
        // bounded retention, extra buffers just drop
        if idle.len() < self.max_idle {
            idle.push_back(buffer);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Instrumented pool shared by tests across the crate

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts every acquire and release; `outstanding()` catches leaks and
    /// double-frees alike.
    #[derive(Debug, Default)]
    pub struct CountingPool {
        acquired: AtomicUsize,
        released: AtomicUsize,
        deny_after: AtomicUsize,
    }

    impl CountingPool {
        pub fn shared() -> Arc<Self> {
            Arc::new(Self {
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                deny_after: AtomicUsize::new(usize::MAX),
            })
        }

        /// Fail every acquire after the first `n` successes
        pub fn deny_after(&self, n: usize) {
            self.deny_after.store(n, Ordering::SeqCst);
        }

        pub fn acquired(&self) -> usize {
            self.acquired.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }

        pub fn outstanding(&self) -> usize {
            self.acquired() - self.released()
        }
    }

    impl BufferPool for CountingPool {
        fn acquire(&self, width: u32, height: u32, format: PixelFormat) -> Option<FrameBuffer> {
            if self.acquired.load(Ordering::SeqCst) >= self.deny_after.load(Ordering::SeqCst) {
                return None;
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Some(FrameBuffer::new(width, height, format))
        }

        fn release(&self, _buffer: FrameBuffer) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Arc<CountingPool> -> Arc<dyn BufferPool> without losing the original
    pub trait CloneDyn {
        fn clone_dyn(&self) -> Arc<dyn BufferPool>;
    }

    impl CloneDyn for Arc<CountingPool> {
        fn clone_dyn(&self) -> Arc<dyn BufferPool> {
            Arc::clone(self) as Arc<dyn BufferPool>
        }
    }
}
