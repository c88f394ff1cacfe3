//! Reference-counted pool of decode output buffers
//!
//! A video decode engine asks the pool for output buffers and hands each
//! decoded frame to the application without copying. The application keeps a
//! frame alive by holding its `Arc<FrameBuffer>`; once the last outside
//! reference drops, the pool's own reference is the only one left and the
//! entry becomes free for the next request.
//!
//! ```text
//!   get_frame_buffer ──► entry (pool + engine + app hold refs)
//!   engine releases  ──► entry (pool + app)
//!   app drops frame  ──► entry (pool only) == free
//! ```

use adaptive_codec_engines::{FrameBuffer, FrameBufferProvider, SimulatedVp9Decoder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Pool tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Soft ceiling on pooled entries; growing past it is reported
    pub max_num_buffers: usize,
    /// Panic instead of warning when the ceiling is exceeded
    pub strict: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_num_buffers: 10,
            strict: cfg!(debug_assertions),
        }
    }
}

#[derive(Default)]
struct PoolInner {
    buffers: Vec<Arc<FrameBuffer>>,
    /// Entries dropped by `clear_pool` while still referenced elsewhere.
    retired: Vec<Weak<FrameBuffer>>,
}

/// Pool of reusable [`FrameBuffer`]s
#[derive(Default)]
pub struct FrameBufferPool {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

fn is_free(buffer: &Arc<FrameBuffer>) -> bool {
    Arc::strong_count(buffer) == 1
}

impl FrameBufferPool {
    /// Create an empty pool with the default ceiling
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty pool with explicit tuning
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Active tuning
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Hand out a buffer of exactly `min_size` bytes, recycling a free entry
    /// when one exists.
    ///
    /// Free entries that already have the capacity are preferred; otherwise
    /// the first free entry is grown; otherwise a new entry is allocated.
    ///
    /// # Panics
    ///
    /// Panics when a new entry takes the pool past
    /// [`PoolConfig::max_num_buffers`] and the pool is strict (the default in
    /// debug builds and with the `strict-pool` feature).
    pub fn get_frame_buffer(&self, min_size: usize) -> Arc<FrameBuffer> {
        let mut inner = self.inner.lock();
        inner.retired.retain(|weak| weak.strong_count() > 0);

        let reusable = inner
            .buffers
            .iter()
            .position(|b| is_free(b) && b.capacity() >= min_size)
            .or_else(|| inner.buffers.iter().position(is_free));

        let buffer = match reusable {
            Some(index) => {
                trace!(index, min_size, "Recycling pooled frame buffer");
                Arc::clone(&inner.buffers[index])
            }
            None => {
                let buffer = Arc::new(FrameBuffer::new(min_size));
                inner.buffers.push(Arc::clone(&buffer));
                let pooled = inner.buffers.len();
                if pooled > self.config.max_num_buffers {
                    warn!(
                        pooled,
                        max = self.config.max_num_buffers,
                        "Frame buffer pool exceeded its ceiling; frames are being held too long"
                    );
                    assert!(
                        !(self.config.strict || cfg!(feature = "strict-pool")),
                        "frame buffer pool grew to {pooled} entries, ceiling is {}",
                        self.config.max_num_buffers
                    );
                }
                buffer
            }
        };

        buffer.set_size(min_size);
        buffer
    }

    /// Entries currently referenced from outside the pool, including
    /// cleared entries not yet dropped by their holders
    pub fn num_buffers_in_use(&self) -> usize {
        let inner = self.inner.lock();
        let pooled = inner.buffers.iter().filter(|b| !is_free(b)).count();
        let retired = inner
            .retired
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count();
        pooled + retired
    }

    /// Entries owned by the pool, free or not
    pub fn num_buffers_pooled(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    /// Drop every free entry and stop recycling the referenced ones.
    ///
    /// Referenced entries stay alive with their holders and still count as
    /// in use; they are freed when the last holder lets go.
    pub fn clear_pool(&self) {
        let mut inner = self.inner.lock();
        let buffers = std::mem::take(&mut inner.buffers);
        let mut freed = 0usize;
        for buffer in buffers {
            if is_free(&buffer) {
                freed += 1;
            } else {
                inner.retired.push(Arc::downgrade(&buffer));
            }
        }
        inner.retired.retain(|weak| weak.strong_count() > 0);
        debug!(freed, retired = inner.retired.len(), "Frame buffer pool cleared");
    }

    /// Route `engine`'s output buffer requests through this pool.
    pub fn initialize_engine_use_pool(self: &Arc<Self>, engine: &mut SimulatedVp9Decoder) {
        let provider: Arc<dyn FrameBufferProvider> = Arc::clone(self) as Arc<dyn FrameBufferProvider>;
        engine.set_frame_buffer_provider(provider);
        debug!(
            max_num_buffers = self.config.max_num_buffers,
            "Decode engine attached to frame buffer pool"
        );
    }
}

impl FrameBufferProvider for FrameBufferPool {
    fn get_frame_buffer(&self, min_size: usize) -> adaptive_codec_engines::Result<Arc<FrameBuffer>> {
        Ok(FrameBufferPool::get_frame_buffer(self, min_size))
    }

    fn release_frame_buffer(&self, buffer: Arc<FrameBuffer>) {
        trace!(size = buffer.size(), "Engine released frame buffer");
        drop(buffer);
    }
}
