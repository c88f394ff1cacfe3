#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(unsafe_code)]

//! Native codec engine contracts and simulated engines
//!
//! The adapter layer in `adaptive-codec-core` never talks to a codec library
//! directly. It drives an *engine*: a synchronous, fixed-call object that
//! encodes one 10 ms block at a time, decodes one payload at a time, and, for
//! adaptive speech codecs, exchanges an opaque [`BandwidthInfo`] blob.
//!
//! # Implementation Status
//!
//! The engines shipped here are **simulation implementations** designed for:
//! - Exercising the adapter state machines without a native library
//! - Deterministic tests of packet boundaries, rate switching and buffer reuse
//! - Demo sessions in the `acodec` binary
//!
//! ## iSAC-style speech engine ([`isac`])
//! - **Current**: Buffers 10 ms blocks, emits 30/60 ms packets sized from the
//!   bit rate, estimates bandwidth from packet arrivals
//! - **Status**: Obeys the engine contract; performs no real compression
//!
//! ## VP9-style video engine ([`vp9`])
//! - **Current**: Run-length coded I420 frames; the decoder obtains output
//!   buffers through the [`FrameBufferProvider`] protocol
//! - **Status**: Obeys the buffer protocol; performs no real compression
//!
//! A native binding only has to implement the same traits to plug in.

pub mod frame_buffer;
pub mod isac;
pub mod vp9;

use serde::{Deserialize, Serialize};

/// Engine error types
///
/// Every variant maps onto a numeric engine status code via
/// [`EngineError::code`], mirroring the error codes native engines report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine used before initialization")]
    NotInitialized,
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),
    #[error("Unsupported frame size: {0} ms")]
    UnsupportedFrameSize(u32),
    #[error("Bit rate out of range: {0} bps")]
    BitRateOutOfRange(u32),
    #[error("Payload size limit out of range: {0} bytes")]
    PayloadLimitOutOfRange(usize),
    #[error("Input length mismatch: got {actual} samples, expected {expected}")]
    InputLength { actual: usize, expected: usize },
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall { needed: usize, available: usize },
    #[error("Invalid codec data: {0}")]
    InvalidData(&'static str),
    #[error("Invalid dimensions: width={0}, height={1}")]
    InvalidDimensions(u32, u32),
    #[error("Numeric overflow in codec operation")]
    Overflow,
    #[error("Data size exceeds maximum allowed: {actual} > {max}")]
    SizeExceeded { actual: usize, max: usize },
    #[error("Frame buffer unavailable for {0} bytes")]
    BufferUnavailable(usize),
}

impl EngineError {
    /// Numeric status code as a native engine would report it.
    pub fn code(&self) -> i16 {
        match self {
            EngineError::NotInitialized => 6610,
            EngineError::UnsupportedSampleRate(_) => 6020,
            EngineError::UnsupportedFrameSize(_) => 6050,
            EngineError::BitRateOutOfRange(_) => 6010,
            EngineError::PayloadLimitOutOfRange(_) => 6030,
            EngineError::InputLength { .. } => 6400,
            EngineError::OutputTooSmall { .. } => 6410,
            EngineError::InvalidData(_) => 6640,
            EngineError::InvalidDimensions(..) => 7010,
            EngineError::Overflow => 7020,
            EngineError::SizeExceeded { .. } => 7030,
            EngineError::BufferUnavailable(_) => 7040,
        }
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Maximum allowed dimensions for safety
pub const MAX_WIDTH: u32 = 8192;
pub const MAX_HEIGHT: u32 = 8192;
pub const MAX_I420_SIZE: usize = 100 * 1024 * 1024; // 100MB

/// Snapshot of channel conditions exchanged between a decoder's estimator
/// and an adaptive encoder.
///
/// Treated as an opaque blob by the adapter layer; it is only ever copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthInfo {
    /// Whether the estimator has seen any traffic yet
    pub in_use: bool,
    /// Smoothed estimate of the available send rate in bits per second
    pub send_bw_avg_bps: u32,
    /// Smoothed maximum delay in milliseconds
    pub send_max_delay_avg_ms: u32,
    /// Quantized bottleneck rate (0..=11)
    pub bottleneck_index: u8,
    /// Quantized jitter level (0..=3)
    pub jitter_index: u8,
    /// Observed packet loss in percent
    pub loss_percent: u8,
}

/// Classification of decoded audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechType {
    Speech,
    ComfortNoise,
}

pub use frame_buffer::{FrameBuffer, FrameBufferProvider};
pub use isac::{CodingMode, IsacEngine, IsacFix, IsacFloat, SimulatedIsac};
pub use vp9::{i420_size, DecodedImage, SimulatedVp9Decoder, SimulatedVp9Encoder, VideoFrame};
