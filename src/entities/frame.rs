//! Frame buffers and shared ownership handles
//!
//! **Why**: decoded frames are large (a 480x480 RGBA frame is ~900 KB) and
//! travel between the render thread, the worker pool and the cache. A single
//! owner with reference-counted handles keeps "who frees this buffer"
//! unambiguous: the buffer goes back to its pool exactly once, when the last
//! handle drops.
//!
//! **Used by**: cache entries, preparation tasks (canvas + output), playback
//! backend (draw path)

use std::sync::Arc;

use crate::entities::pool::BufferPool;

/// Pixel format of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba8888,
    /// Packed 5-6-5 RGB, 2 bytes per pixel (low-memory option)
    Rgb565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

/// Owned raster for one decoded animation frame
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Create a zeroed buffer of the given dimensions
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            pixels: vec![0u8; len],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Memory footprint. A pure function of dimensions and pixel format.
    pub fn size_in_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Copy pixel content from another buffer.
    /// Fails (returns false) on any dimension or format mismatch.
    pub fn copy_from(&mut self, other: &FrameBuffer) -> bool {
        if self.width != other.width || self.height != other.height || self.format != other.format
        {
            return false;
        }
        self.pixels.copy_from_slice(&other.pixels);
        true
    }

    /// A buffer is valid when its storage matches its declared geometry
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len()
                == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// Interior of a shared frame: the buffer plus the pool it returns to.
struct FrameCore {
    /// Some for the whole life of the handle; taken exactly once on teardown
    buffer: Option<FrameBuffer>,
    pool: Arc<dyn BufferPool>,
}

impl Drop for FrameCore {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

/// Reference-counted handle to a decoded frame.
///
/// Cloning a handle is the only way to share the underlying buffer; dropping
/// a handle is the only way to release it. When the last handle drops, the
/// buffer is returned to its [`BufferPool`] exactly once. Counter updates are
/// atomic, so handles can be cloned and dropped from any thread.
pub struct SharedFrame {
    core: Arc<FrameCore>,
}

impl SharedFrame {
    /// Take ownership of a buffer; it will be released to `pool` when the
    /// last handle drops.
    pub fn new(buffer: FrameBuffer, pool: Arc<dyn BufferPool>) -> Self {
        Self {
            core: Arc::new(FrameCore {
                buffer: Some(buffer),
                pool,
            }),
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        // taken only during teardown, never observable through a live handle
        self.core.buffer.as_ref().expect("frame buffer already released")
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer().width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer().height()
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.buffer().format()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.buffer().size_in_bytes()
    }

    /// Number of live handles to this frame
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.core)
    }

    /// True when this is the only handle, i.e. the buffer can be reused
    pub fn is_exclusive(&self) -> bool {
        self.ref_count() == 1
    }

    pub fn is_valid(&self) -> bool {
        self.core
            .buffer
            .as_ref()
            .map(FrameBuffer::is_valid)
            .unwrap_or(false)
    }

    /// Recover exclusive ownership of the buffer for in-place reuse.
    ///
    /// Succeeds only when no other handle exists; the buffer is detached
    /// from the pool-return path (the caller now owns it). Otherwise the
    /// handle is returned unchanged.
    pub fn try_into_buffer(self) -> Result<FrameBuffer, SharedFrame> {
        match Arc::try_unwrap(self.core) {
            Ok(mut core) => Ok(core
                .buffer
                .take()
                .expect("frame buffer already released")),
            Err(core) => Err(SharedFrame { core }),
        }
    }
}

impl Clone for SharedFrame {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl std::fmt::Debug for SharedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.core.buffer.as_ref() {
            Some(b) => f
                .debug_struct("SharedFrame")
                .field("dimensions", &format!("{}x{}", b.width(), b.height()))
                .field("format", &b.format())
                .field("refs", &self.ref_count())
                .finish(),
            None => f.write_str("SharedFrame(released)"),
        }
    }
}
