//! Buffer pool behavior under a real decode engine and across threads

use adaptive_codec_core::{FrameBufferPool, PoolConfig, PooledVideoDecoder};
use adaptive_codec_engines::{i420_size, SimulatedVp9Decoder, SimulatedVp9Encoder, VideoFrame};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

fn synthetic_frame(width: u32, height: u32, index: u64) -> VideoFrame {
    let size = i420_size(width, height).unwrap();
    VideoFrame {
        data: (0..size).map(|i| ((i / 64) as u64 + index) as u8).collect(),
        width,
        height,
        timestamp: index * 3000,
    }
}

#[test]
fn test_held_frames_stay_in_use_until_dropped() {
    let mut encoder = SimulatedVp9Encoder::with_dimensions(32, 16).unwrap();
    let mut decoder = PooledVideoDecoder::new();
    decoder.init_decode(32, 16).unwrap();

    let mut held = VecDeque::new();
    for index in 0..8 {
        let payload = encoder.encode(&synthetic_frame(32, 16, index)).unwrap();
        let image = decoder.decode(&payload).unwrap();
        assert_eq!(image.timestamp, index * 3000);
        held.push_back(image);
        if held.len() > 3 {
            held.pop_front();
        }
    }

    // Three frames held by the application, the newest also being the
    // engine's reference.
    assert_eq!(decoder.num_buffers_in_use(), 3);
    held.clear();
    assert_eq!(decoder.num_buffers_in_use(), 1);
    assert!(decoder.pool().num_buffers_pooled() <= 5);
}

#[test]
fn test_decoded_pixels_match_source() {
    let mut encoder = SimulatedVp9Encoder::with_dimensions(16, 8).unwrap();
    let mut decoder = PooledVideoDecoder::new();
    decoder.init_decode(16, 8).unwrap();

    let source = synthetic_frame(16, 8, 5);
    let payload = encoder.encode(&source).unwrap();
    let image = decoder.decode(&payload).unwrap();
    assert_eq!(image.buffer.to_vec(), source.data);
}

#[test]
fn test_engine_released_on_decoder_drop() {
    let pool = Arc::new(FrameBufferPool::new());
    let mut engine = SimulatedVp9Decoder::new();
    pool.initialize_engine_use_pool(&mut engine);
    engine.init(8, 8).unwrap();

    let mut encoder = SimulatedVp9Encoder::with_dimensions(8, 8).unwrap();
    let payload = encoder.encode(&synthetic_frame(8, 8, 0)).unwrap();
    let image = engine.decode(&payload).unwrap();
    drop(image);
    assert_eq!(pool.num_buffers_in_use(), 1);

    drop(engine);
    assert_eq!(pool.num_buffers_in_use(), 0);
}

#[test]
fn test_shared_pool_across_decode_threads() {
    let pool = Arc::new(FrameBufferPool::with_config(PoolConfig {
        max_num_buffers: 64,
        strict: true,
    }));

    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut engine = SimulatedVp9Decoder::new();
                pool.initialize_engine_use_pool(&mut engine);
                engine.init(16, 16).unwrap();
                let mut encoder = SimulatedVp9Encoder::with_dimensions(16, 16).unwrap();

                for index in 0..50 {
                    let source = synthetic_frame(16, 16, worker * 100 + index);
                    let payload = encoder.encode(&source).unwrap();
                    let image = engine.decode(&payload).unwrap();
                    // No other thread may be writing into this buffer.
                    assert_eq!(image.buffer.to_vec(), source.data);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(pool.num_buffers_in_use(), 0);
    assert!(pool.num_buffers_pooled() <= 8);
}

#[test]
fn test_clear_pool_then_fresh_allocation() {
    let pool = FrameBufferPool::new();
    let held = pool.get_frame_buffer(128);
    held.bytes()[0] = 0xAA;
    pool.clear_pool();
    assert_eq!(pool.num_buffers_in_use(), 1);

    drop(held);
    assert_eq!(pool.num_buffers_in_use(), 0);

    let fresh = pool.get_frame_buffer(128);
    assert_eq!(fresh.to_vec()[0], 0);
    assert_eq!(pool.num_buffers_pooled(), 1);
}
