//! Adaptive codec adapter layer
//!
//! This library sits between a real-time media pipeline and native codec
//! engines. It features:
//!
//! - **Adaptive Packetizer**: iSAC encoding driven one 10 ms block at a time,
//!   emitting variable-length units stamped with the timestamp of their first
//!   block
//! - **Bandwidth Sharing**: the decoder of a call publishes its channel
//!   estimate so the encoder of the same call can steer rate and frame size
//! - **Uniform Codec Contract**: every adapter is reachable as
//!   `Box<dyn AudioEncoder>` / `Box<dyn AudioDecoder>`
//! - **Zero-copy Video Output**: a reference-counted buffer pool serves the
//!   decode engine and recycles buffers as soon as frames are dropped
//!
//! # Examples
//!
//! ```rust
//! use adaptive_codec_core::prelude::*;
//! use bytes::BytesMut;
//!
//! # fn example() -> Result<(), CodecError> {
//! let mut encoder = AudioEncoderIsac::new(IsacConfig::default())?;
//! let mut payload = BytesMut::new();
//!
//! for (i, ts) in [0u32, 160, 320].into_iter().enumerate() {
//!     let info = encoder.encode(ts, &[0i16; 160], MAX_ENCODED_BYTES, &mut payload)?;
//!     if i < 2 {
//!         assert!(info.is_empty());
//!     } else {
//!         assert_eq!(info.encoded_timestamp, 0);
//!     }
//! }
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Shared bandwidth estimate store
pub mod bandwidth;

/// Reference-counted decode buffer pool
pub mod buffer_pool;

/// Encoder and decoder capability contract
pub mod codec;

/// Call-level encoder ownership
pub mod codec_owner;

/// Decoder table
pub mod decoder_factory;

/// iSAC packetizer and depacketizer
pub mod isac;

/// Linear PCM adapters
pub mod pcm16b;

/// Process-scoped platform context
pub mod platform;

/// Copy-redundancy encoder wrapper
pub mod red;

/// Codec descriptors and shared data types
pub mod types;

/// Pooled video decoding
pub mod video;

// Re-export main types at crate root
pub use bandwidth::{LockedBandwidthInfo, SharedBandwidthInfo};
pub use buffer_pool::{FrameBufferPool, PoolConfig};
pub use codec::{AudioDecoder, AudioEncoder, CodecError, ConfigError, EncodedInfo, EncodedInfoLeaf};
pub use codec_owner::CodecOwner;
pub use decoder_factory::{create_audio_decoder, DecoderKind};
pub use isac::{
    AudioDecoderIsac, AudioDecoderIsacFix, AudioEncoderIsac, AudioEncoderIsacFix, IsacConfig,
    IsacDecoder, IsacEncoder, MAX_ENCODED_BYTES,
};
pub use pcm16b::{Pcm16bConfig, Pcm16bDecoder, Pcm16bEncoder};
pub use platform::{PlatformContext, PlatformError, ThreadAttachment};
pub use red::CopyRedEncoder;
pub use types::*;
pub use video::PooledVideoDecoder;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bandwidth::{LockedBandwidthInfo, SharedBandwidthInfo};
    pub use crate::buffer_pool::{FrameBufferPool, PoolConfig};
    pub use crate::codec::{AudioDecoder, AudioEncoder, CodecError, ConfigError, EncodedInfo};
    pub use crate::codec_owner::CodecOwner;
    pub use crate::decoder_factory::{create_audio_decoder, DecoderKind};
    pub use crate::isac::{AudioDecoderIsac, AudioEncoderIsac, IsacConfig, MAX_ENCODED_BYTES};
    pub use crate::pcm16b::{Pcm16bDecoder, Pcm16bEncoder};
    pub use crate::types::{BandwidthInfo, CodecInst, SpeechType};
    pub use crate::video::PooledVideoDecoder;
}
