//! VP9-style video engine
//!
//! # ⚠️ SIMULATION IMPLEMENTATION
//!
//! Frames are run-length coded I420 images. The point of this engine is the
//! decoder's buffer handling: when a [`FrameBufferProvider`] is installed the
//! decoder requests every output buffer from it, keeps the most recent one as
//! its reference frame, and hands the previous reference back through
//! `release_frame_buffer`.
//!
//! **Not suitable for production video calls.**

use crate::frame_buffer::{FrameBuffer, FrameBufferProvider};
use crate::{EngineError, Result};
use crate::{MAX_HEIGHT, MAX_I420_SIZE, MAX_WIDTH};
use bytes::Bytes;
use std::sync::Arc;

/// width (4) + height (4) + timestamp (8) + flags (1)
const HEADER_SIZE: usize = 17;
const FLAG_KEYFRAME: u8 = 0x01;

/// Raw I420 frame handed to the encoder
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: u64,
}

/// Decoded image whose pixels live in a (possibly pooled) frame buffer
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub buffer: Arc<FrameBuffer>,
    pub width: u32,
    pub height: u32,
    pub timestamp: u64,
    pub keyframe: bool,
}

/// Byte size of an I420 image, validating the dimensions.
pub fn i420_size(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(EngineError::InvalidDimensions(width, height));
    }
    if width > MAX_WIDTH || height > MAX_HEIGHT {
        return Err(EngineError::InvalidDimensions(width, height));
    }

    let luma = width.checked_mul(height).ok_or(EngineError::Overflow)?;
    let chroma = width
        .div_ceil(2)
        .checked_mul(height.div_ceil(2))
        .and_then(|c| c.checked_mul(2))
        .ok_or(EngineError::Overflow)?;
    let size = luma.checked_add(chroma).ok_or(EngineError::Overflow)? as usize;

    if size > MAX_I420_SIZE {
        return Err(EngineError::SizeExceeded {
            actual: size,
            max: MAX_I420_SIZE,
        });
    }
    Ok(size)
}

/// VP9 video encoder (simulation)
pub struct SimulatedVp9Encoder {
    width: u32,
    height: u32,
    frame_size: usize,
    pending_keyframe: bool,
}

impl SimulatedVp9Encoder {
    pub fn new() -> Result<Self> {
        Self::with_dimensions(640, 480)
    }

    pub fn with_dimensions(width: u32, height: u32) -> Result<Self> {
        let frame_size = i420_size(width, height)?;
        Ok(Self {
            width,
            height,
            frame_size,
            pending_keyframe: true,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn request_keyframe(&mut self) {
        self.pending_keyframe = true;
    }

    pub fn encode(&mut self, frame: &VideoFrame) -> Result<Bytes> {
        if frame.width != self.width || frame.height != self.height {
            return Err(EngineError::InvalidDimensions(frame.width, frame.height));
        }
        if frame.data.len() != self.frame_size {
            return Err(EngineError::InvalidData("frame size does not match I420 layout"));
        }

        let flags = if self.pending_keyframe { FLAG_KEYFRAME } else { 0 };
        let mut compressed = Vec::with_capacity(HEADER_SIZE + frame.data.len() / 4);
        compressed.extend_from_slice(&frame.width.to_le_bytes());
        compressed.extend_from_slice(&frame.height.to_le_bytes());
        compressed.extend_from_slice(&frame.timestamp.to_le_bytes());
        compressed.push(flags);

        let mut i = 0;
        while i < frame.data.len() {
            let mut count = 1;
            while i + count < frame.data.len()
                && frame.data[i] == frame.data[i + count]
                && count < 255
            {
                count += 1;
            }
            compressed.push(count as u8);
            compressed.push(frame.data[i]);
            i += count;
        }

        self.pending_keyframe = false;
        Ok(Bytes::from(compressed))
    }
}

/// VP9 video decoder (simulation)
#[derive(Default)]
pub struct SimulatedVp9Decoder {
    dimensions: Option<(u32, u32)>,
    provider: Option<Arc<dyn FrameBufferProvider>>,
    reference: Option<Arc<FrameBuffer>>,
}

impl SimulatedVp9Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for a stream of `width` x `height` frames.
    pub fn init(&mut self, width: u32, height: u32) -> Result<()> {
        i420_size(width, height)?;
        self.reset();
        self.dimensions = Some((width, height));
        Ok(())
    }

    /// Route output buffer requests through `provider`.
    pub fn set_frame_buffer_provider(&mut self, provider: Arc<dyn FrameBufferProvider>) {
        self.release_reference();
        self.provider = Some(provider);
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Drop decoder state, releasing the reference frame.
    pub fn reset(&mut self) {
        self.release_reference();
    }

    fn release_reference(&mut self) {
        if let Some(buffer) = self.reference.take() {
            match &self.provider {
                Some(provider) => provider.release_frame_buffer(buffer),
                None => drop(buffer),
            }
        }
    }

    fn obtain_buffer(&self, size: usize) -> Result<Arc<FrameBuffer>> {
        let buffer = match &self.provider {
            Some(provider) => provider.get_frame_buffer(size)?,
            None => Arc::new(FrameBuffer::new(size)),
        };
        if buffer.size() < size {
            return Err(EngineError::BufferUnavailable(size));
        }
        Ok(buffer)
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<DecodedImage> {
        let (cfg_width, cfg_height) = self.dimensions.ok_or(EngineError::NotInitialized)?;
        if data.len() < HEADER_SIZE {
            return Err(EngineError::InvalidData("data too small for header"));
        }

        let width_bytes: [u8; 4] = data
            .get(0..4)
            .and_then(|s| s.try_into().ok())
            .ok_or(EngineError::InvalidData("missing width"))?;
        let width = u32::from_le_bytes(width_bytes);

        let height_bytes: [u8; 4] = data
            .get(4..8)
            .and_then(|s| s.try_into().ok())
            .ok_or(EngineError::InvalidData("missing height"))?;
        let height = u32::from_le_bytes(height_bytes);

        let timestamp_bytes: [u8; 8] = data
            .get(8..16)
            .and_then(|s| s.try_into().ok())
            .ok_or(EngineError::InvalidData("missing timestamp"))?;
        let timestamp = u64::from_le_bytes(timestamp_bytes);

        let keyframe = data[16] & FLAG_KEYFRAME != 0;

        let size = i420_size(width, height)?;
        if (width, height) != (cfg_width, cfg_height) && !keyframe {
            return Err(EngineError::InvalidDimensions(width, height));
        }
        if !keyframe && self.reference.is_none() {
            return Err(EngineError::InvalidData("delta frame without reference"));
        }

        let buffer = self.obtain_buffer(size)?;
        {
            let mut out = buffer.bytes();
            let mut pos = 0;
            for pair in data[HEADER_SIZE..].chunks_exact(2) {
                if pos >= size {
                    break;
                }
                let run = (pair[0] as usize).min(size - pos);
                out[pos..pos + run].fill(pair[1]);
                pos += run;
            }
            out[pos..size].fill(0);
        }

        self.dimensions = Some((width, height));
        if let Some(previous) = self.reference.replace(Arc::clone(&buffer)) {
            match &self.provider {
                Some(provider) => provider.release_frame_buffer(previous),
                None => drop(previous),
            }
        }

        Ok(DecodedImage {
            buffer,
            width,
            height,
            timestamp,
            keyframe,
        })
    }
}

impl Drop for SimulatedVp9Decoder {
    fn drop(&mut self) {
        self.release_reference();
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_encode_decode_preserves_image(
            width in 1u32..=64,
            height in 1u32..=64,
            timestamp in any::<u64>(),
            seed in any::<u8>(),
        ) {
            let size = i420_size(width, height)?;
            let data: Vec<u8> = (0..size).map(|i| seed.wrapping_add((i / 7) as u8)).collect();
            let frame = VideoFrame { data: data.clone(), width, height, timestamp };

            let mut encoder = SimulatedVp9Encoder::with_dimensions(width, height)?;
            let mut decoder = SimulatedVp9Decoder::new();
            decoder.init(width, height)?;

            let compressed = encoder.encode(&frame)?;
            let decoded = decoder.decode(&compressed)?;

            prop_assert_eq!(decoded.width, width);
            prop_assert_eq!(decoded.height, height);
            prop_assert_eq!(decoded.timestamp, timestamp);
            prop_assert_eq!(decoded.buffer.to_vec(), data);
        }

        #[test]
        fn prop_decoder_handles_arbitrary_data(
            body in proptest::collection::vec(any::<u8>(), 0..256),
            flags in any::<u8>(),
        ) {
            let mut decoder = SimulatedVp9Decoder::new();
            decoder.init(8, 8)?;

            let mut data = Vec::new();
            data.extend_from_slice(&8u32.to_le_bytes());
            data.extend_from_slice(&8u32.to_le_bytes());
            data.extend_from_slice(&0u64.to_le_bytes());
            data.push(flags);
            data.extend_from_slice(&body);

            if let Ok(decoded) = decoder.decode(&data) {
                prop_assert_eq!(decoded.buffer.size(), i420_size(8, 8)?);
            }
        }
    }
}
