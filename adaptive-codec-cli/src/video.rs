//! Video decode demo through the buffer pool

use adaptive_codec_core::{PoolConfig, PooledVideoDecoder};
use adaptive_codec_engines::{i420_size, DecodedImage, SimulatedVp9Encoder, VideoFrame};
use anyhow::Result;
use std::collections::VecDeque;
use tracing::info;

/// Outcome of a video session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
    pub frames_decoded: usize,
    pub max_in_use: usize,
    pub final_in_use: usize,
    pub buffers_pooled: usize,
}

fn gradient_frame(width: u32, height: u32, index: u64) -> Result<VideoFrame> {
    let size = i420_size(width, height)?;
    let row = width as usize;
    Ok(VideoFrame {
        data: (0..size)
            .map(|i| ((i % row) as u64 + index) as u8)
            .collect(),
        width,
        height,
        timestamp: index * 3000,
    })
}

/// Encode and decode `frames` synthetic frames, holding the newest `hold`
/// decoded frames the way a renderer queue would.
pub fn run(frames: u64, width: u32, height: u32, hold: usize, pool: PoolConfig) -> Result<VideoReport> {
    let mut encoder = SimulatedVp9Encoder::with_dimensions(width, height)?;
    let mut decoder = PooledVideoDecoder::with_pool_config(pool);
    decoder.init_decode(width, height)?;

    let mut held: VecDeque<DecodedImage> = VecDeque::with_capacity(hold + 1);
    let mut max_in_use = 0;
    for index in 0..frames {
        let payload = encoder.encode(&gradient_frame(width, height, index)?)?;
        let image = decoder.decode(&payload)?;
        held.push_back(image);
        while held.len() > hold {
            held.pop_front();
        }
        max_in_use = max_in_use.max(decoder.num_buffers_in_use());
    }

    held.clear();
    let final_in_use = decoder.num_buffers_in_use();
    let buffers_pooled = decoder.pool().num_buffers_pooled();
    decoder.release();
    info!(frames, max_in_use, buffers_pooled, "Video session finished");

    Ok(VideoReport {
        frames_decoded: frames as usize,
        max_in_use,
        final_in_use,
        buffers_pooled,
    })
}
