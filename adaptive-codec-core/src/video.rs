//! Video decoding through the buffer pool
//!
//! [`PooledVideoDecoder`] pairs a decode engine with a [`FrameBufferPool`] so
//! decoded frames reach the application in the very buffer the engine wrote,
//! and recycling happens as soon as the application drops a frame.

use crate::buffer_pool::{FrameBufferPool, PoolConfig};
use crate::codec::Result;
use adaptive_codec_engines::{DecodedImage, SimulatedVp9Decoder};
use std::sync::Arc;
use tracing::debug;

/// Video decoder whose output buffers come from a [`FrameBufferPool`]
pub struct PooledVideoDecoder {
    engine: SimulatedVp9Decoder,
    pool: Arc<FrameBufferPool>,
    initialized: bool,
}

impl Default for PooledVideoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PooledVideoDecoder {
    /// Create a decoder with a default pool
    pub fn new() -> Self {
        Self::with_pool_config(PoolConfig::default())
    }

    /// Create a decoder with a tuned pool
    pub fn with_pool_config(config: PoolConfig) -> Self {
        Self {
            engine: SimulatedVp9Decoder::new(),
            pool: Arc::new(FrameBufferPool::with_config(config)),
            initialized: false,
        }
    }

    /// Prepare for a stream of `width` x `height` frames
    pub fn init_decode(&mut self, width: u32, height: u32) -> Result<()> {
        self.pool.initialize_engine_use_pool(&mut self.engine);
        self.engine.init(width, height)?;
        self.initialized = true;
        debug!(width, height, "Pooled video decoder initialized");
        Ok(())
    }

    /// Decode one payload. The returned image's buffer is the pool entry the
    /// engine decoded into.
    pub fn decode(&mut self, payload: &[u8]) -> Result<DecodedImage> {
        Ok(self.engine.decode(payload)?)
    }

    /// Tear down the engine state and drop every free pool entry.
    ///
    /// Frames the application still holds stay valid.
    pub fn release(&mut self) {
        self.engine.reset();
        self.pool.clear_pool();
        self.initialized = false;
    }

    /// Whether [`PooledVideoDecoder::init_decode`] succeeded since the last
    /// release
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Pool entries referenced outside the pool (engine reference frame
    /// included)
    pub fn num_buffers_in_use(&self) -> usize {
        self.pool.num_buffers_in_use()
    }

    /// The backing pool
    pub fn pool(&self) -> &Arc<FrameBufferPool> {
        &self.pool
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use adaptive_codec_engines::{SimulatedVp9Encoder, VideoFrame};

    fn frame(width: u32, height: u32, value: u8, timestamp: u64) -> VideoFrame {
        let size = adaptive_codec_engines::i420_size(width, height).unwrap();
        VideoFrame {
            data: vec![value; size],
            width,
            height,
            timestamp,
        }
    }

    #[test]
    fn test_decoded_frame_lives_in_pool_buffer() {
        let mut encoder = SimulatedVp9Encoder::with_dimensions(16, 16).unwrap();
        let mut decoder = PooledVideoDecoder::new();
        decoder.init_decode(16, 16).unwrap();

        let payload = encoder.encode(&frame(16, 16, 7, 1)).unwrap();
        let image = decoder.decode(&payload).unwrap();
        assert!(image.keyframe);
        assert!(image.buffer.to_vec().iter().all(|&b| b == 7));
        // Held by the application and as the engine's reference frame.
        assert_eq!(decoder.num_buffers_in_use(), 1);
        assert_eq!(std::sync::Arc::strong_count(&image.buffer), 3);
    }

    #[test]
    fn test_dropped_frames_are_recycled() {
        let mut encoder = SimulatedVp9Encoder::with_dimensions(8, 8).unwrap();
        let mut decoder = PooledVideoDecoder::new();
        decoder.init_decode(8, 8).unwrap();

        for ts in 0..20 {
            let payload = encoder.encode(&frame(8, 8, ts as u8, ts)).unwrap();
            let image = decoder.decode(&payload).unwrap();
            drop(image);
        }
        // The reference frame and the one being replaced alternate.
        assert!(decoder.pool().num_buffers_pooled() <= 2);
    }

    #[test]
    fn test_release_keeps_held_frames_valid() {
        let mut encoder = SimulatedVp9Encoder::with_dimensions(8, 8).unwrap();
        let mut decoder = PooledVideoDecoder::new();
        decoder.init_decode(8, 8).unwrap();
        let payload = encoder.encode(&frame(8, 8, 3, 0)).unwrap();
        let held = decoder.decode(&payload).unwrap();

        decoder.release();
        assert!(!decoder.is_initialized());
        assert_eq!(decoder.num_buffers_in_use(), 1);
        assert!(held.buffer.to_vec().iter().all(|&b| b == 3));
        drop(held);
        assert_eq!(decoder.num_buffers_in_use(), 0);
    }

    #[test]
    fn test_decode_before_init_fails() {
        let mut decoder = PooledVideoDecoder::new();
        let err = decoder.decode(&[0; 20]).unwrap_err();
        assert_eq!(err.engine_code(), Some(6610));
    }
}
