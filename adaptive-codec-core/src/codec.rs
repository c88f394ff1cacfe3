//! Codec capability contract
//!
//! [`AudioEncoder`] and [`AudioDecoder`] are the operation sets every speech
//! codec adapter implements. Consumers hold them as `Box<dyn AudioEncoder>`
//! and `Box<dyn AudioDecoder>`, so any conforming adapter plugs in.
//!
//! Optional capabilities (FEC, DTX, application mode, playback rate, loss
//! rate, target bit rate) are toggles that report whether they were honored.
//! An adapter that lacks a capability keeps the provided implementation,
//! which reports "not honored" instead of silently ignoring the request.

use crate::types::Application;
use adaptive_codec_engines::{EngineError, SpeechType};
use bytes::BytesMut;
use thiserror::Error;

/// Codec adapter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Configuration rejected before use
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The native engine reported a failure
    #[error("Engine failure (code {code}): {0}", code = .0.code())]
    Engine(#[from] EngineError),

    /// Payload could not be parsed by the adapter itself
    #[error("Malformed payload: {0}")]
    Malformed(&'static str),

    /// No adapter exists for the requested codec
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
}

impl CodecError {
    /// Numeric engine status, if this error came from an engine
    pub fn engine_code(&self) -> Option<i16> {
        match self {
            CodecError::Engine(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// Configuration validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Rate ceiling below the lowest allowed ceiling
    #[error("maximum bit rate {0} bps is below 32000 bps")]
    MaxBitRateTooLow(u32),

    /// Rate ceiling above what the profile allows
    #[error("maximum bit rate {actual} bps exceeds {limit} bps at {sample_rate_hz} Hz")]
    MaxBitRateTooHigh {
        /// Requested ceiling
        actual: u32,
        /// Profile limit
        limit: u32,
        /// Sample rate of the profile
        sample_rate_hz: u32,
    },

    /// Payload ceiling below the lowest allowed ceiling
    #[error("maximum payload size {0} bytes is below 120 bytes")]
    MaxPayloadTooSmall(usize),

    /// Payload ceiling above what the profile allows
    #[error("maximum payload size {actual} bytes exceeds {limit} bytes at {sample_rate_hz} Hz")]
    MaxPayloadTooLarge {
        /// Requested ceiling
        actual: usize,
        /// Profile limit
        limit: usize,
        /// Sample rate of the profile
        sample_rate_hz: u32,
    },

    /// Adaptive mode needs somewhere to read the estimate from
    #[error("adaptive mode requires a bandwidth store")]
    MissingBandwidthStore,

    /// Sample rate outside every profile
    #[error("unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    /// Super-wideband profile requested from a wideband-only engine
    #[error("engine {engine} has no super-wideband support for {sample_rate_hz} Hz")]
    SuperWidebandUnsupported {
        /// Engine name
        engine: &'static str,
        /// Requested sample rate
        sample_rate_hz: u32,
    },

    /// Frame duration not allowed at this sample rate
    #[error("frame size {frame_size_ms} ms not allowed at {sample_rate_hz} Hz")]
    UnsupportedFrameSize {
        /// Requested frame duration
        frame_size_ms: u32,
        /// Sample rate of the profile
        sample_rate_hz: u32,
    },

    /// Bit rate outside the profile's range
    #[error("bit rate {bit_rate} bps outside the allowed range at {sample_rate_hz} Hz")]
    BitRateOutOfRange {
        /// Requested bit rate
        bit_rate: u32,
        /// Sample rate of the profile
        sample_rate_hz: u32,
    },

    /// Packet size does not correspond to a whole number of milliseconds
    #[error("packet of {packet_size_samples} samples is not a whole number of ms at {clock_rate_hz} Hz")]
    InexactFrameSize {
        /// Samples per packet
        packet_size_samples: u32,
        /// Clock rate
        clock_rate_hz: u32,
    },

    /// Channel count not supported
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),

    /// Packet must hold at least one 10 ms frame
    #[error("invalid number of 10 ms frames per packet: {0}")]
    InvalidFramesPerPacket(usize),
}

/// Codec result type
pub type Result<T> = std::result::Result<T, CodecError>;

/// Description of one encoded sub-unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInfoLeaf {
    /// Payload length in bytes
    pub encoded_bytes: usize,
    /// RTP timestamp of the first input that went into the payload
    pub encoded_timestamp: u32,
    /// RTP payload type
    pub payload_type: u8,
    /// Whether the payload carries speech (as opposed to comfort noise)
    pub speech: bool,
}

impl Default for EncodedInfoLeaf {
    fn default() -> Self {
        Self {
            encoded_bytes: 0,
            encoded_timestamp: 0,
            payload_type: 0,
            speech: true,
        }
    }
}

impl From<&EncodedInfo> for EncodedInfoLeaf {
    fn from(info: &EncodedInfo) -> Self {
        Self {
            encoded_bytes: info.encoded_bytes,
            encoded_timestamp: info.encoded_timestamp,
            payload_type: info.payload_type,
            speech: info.speech,
        }
    }
}

/// Result of one encode call.
///
/// `encoded_bytes == 0` means input was consumed but no unit is ready yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedInfo {
    /// Payload length in bytes
    pub encoded_bytes: usize,
    /// RTP timestamp of the first input that went into the payload
    pub encoded_timestamp: u32,
    /// RTP payload type
    pub payload_type: u8,
    /// Whether the payload carries speech (as opposed to comfort noise)
    pub speech: bool,
    /// Transmit even when `encoded_bytes` is zero
    pub send_even_if_empty: bool,
    /// Redundant or FEC sub-units carried in the same payload
    pub redundant: Vec<EncodedInfoLeaf>,
}

impl EncodedInfo {
    /// Empty unit: input accepted, nothing emitted
    pub fn empty() -> Self {
        Self {
            speech: true,
            ..Default::default()
        }
    }

    /// Whether nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.encoded_bytes == 0
    }
}

/// Speech encoder capability contract
pub trait AudioEncoder: Send {
    /// Input sample rate
    fn sample_rate_hz(&self) -> u32;

    /// Input channel count
    fn num_channels(&self) -> usize;

    /// RTP clock rate; differs from the sample rate for a few codecs
    fn rtp_timestamp_rate_hz(&self) -> u32 {
        self.sample_rate_hz()
    }

    /// Upper bound on the size of any single encoded unit
    fn max_encoded_bytes(&self) -> usize;

    /// 10 ms frames the packet currently being built will contain
    fn num_10ms_frames_in_next_packet(&self) -> usize;

    /// Upper bound on 10 ms frames per packet
    fn max_10ms_frames_in_a_packet(&self) -> usize;

    /// Configured bit rate, or `None` when the encoder adapts it itself
    fn target_bitrate(&self) -> Option<u32>;

    /// Feed 10 ms of interleaved audio, appending any finished unit to
    /// `encoded`.
    ///
    /// # Panics
    ///
    /// Panics if `audio` does not hold exactly `num_channels() *
    /// sample_rate_hz() / 100` samples, or if the adapter produced more than
    /// `max_encoded_bytes`. Both indicate a broken caller or adapter.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Engine`] when the native engine fails.
    fn encode(
        &mut self,
        rtp_timestamp: u32,
        audio: &[i16],
        max_encoded_bytes: usize,
        encoded: &mut BytesMut,
    ) -> Result<EncodedInfo> {
        let expected = self.num_channels() * (self.sample_rate_hz() / 100) as usize;
        assert_eq!(
            audio.len(),
            expected,
            "encode requires exactly 10 ms of audio ({expected} samples)"
        );
        let start = encoded.len();
        let info = self.encode_internal(rtp_timestamp, audio, max_encoded_bytes, encoded)?;
        assert!(
            info.encoded_bytes <= max_encoded_bytes,
            "encoder produced {} bytes, more than the declared maximum of {}",
            info.encoded_bytes,
            max_encoded_bytes
        );
        debug_assert_eq!(encoded.len() - start, info.encoded_bytes);
        Ok(info)
    }

    /// Adapter-specific part of [`AudioEncoder::encode`]
    fn encode_internal(
        &mut self,
        rtp_timestamp: u32,
        audio: &[i16],
        max_encoded_bytes: usize,
        encoded: &mut BytesMut,
    ) -> Result<EncodedInfo>;

    /// Drop any buffered input and return to the configured state
    fn reset(&mut self) -> Result<()>;

    /// Request forward error correction; returns whether honored
    fn set_fec(&mut self, enable: bool) -> bool {
        !enable
    }

    /// Request discontinuous transmission; returns whether honored
    fn set_dtx(&mut self, enable: bool) -> bool {
        !enable
    }

    /// Select the tuning target; returns whether honored
    fn set_application(&mut self, _application: Application) -> bool {
        false
    }

    /// Cap the playback rate the far end needs; returns whether honored
    fn set_max_playback_rate(&mut self, _frequency_hz: u32) -> bool {
        false
    }

    /// Announce the expected loss fraction; returns whether honored
    fn set_projected_packet_loss_rate(&mut self, _fraction: f64) -> bool {
        false
    }

    /// Change the target bit rate; returns whether honored
    fn set_target_bitrate(&mut self, _target_bps: u32) -> bool {
        false
    }
}

/// Speech decoder capability contract
pub trait AudioDecoder: Send {
    /// Decode one payload at `sample_rate_hz`, appending samples to
    /// `decoded`. Returns the number of samples appended and the speech tag.
    ///
    /// On failure nothing is left appended.
    fn decode(
        &mut self,
        encoded: &[u8],
        sample_rate_hz: u32,
        decoded: &mut Vec<i16>,
    ) -> Result<(usize, SpeechType)> {
        let start = decoded.len();
        let result = self.decode_internal(encoded, sample_rate_hz, decoded);
        if result.is_err() {
            decoded.truncate(start);
        }
        result
    }

    /// Adapter-specific part of [`AudioDecoder::decode`]
    fn decode_internal(
        &mut self,
        encoded: &[u8],
        sample_rate_hz: u32,
        decoded: &mut Vec<i16>,
    ) -> Result<(usize, SpeechType)>;

    /// Decode the redundant part of a payload
    fn decode_redundant(
        &mut self,
        encoded: &[u8],
        sample_rate_hz: u32,
        decoded: &mut Vec<i16>,
    ) -> Result<(usize, SpeechType)> {
        self.decode(encoded, sample_rate_hz, decoded)
    }

    /// Return to the freshly constructed state
    fn reset(&mut self);

    /// Output channel count
    fn channels(&self) -> usize;

    /// Samples per channel in `encoded`, if knowable without decoding
    fn packet_duration(&self, _encoded: &[u8]) -> Option<usize> {
        None
    }

    /// Samples per channel in the redundant part of `encoded`
    fn packet_duration_redundant(&self, _encoded: &[u8]) -> Option<usize> {
        None
    }

    /// Whether `encoded` carries FEC data
    fn packet_has_fec(&self, _encoded: &[u8]) -> bool {
        false
    }

    /// Whether [`AudioDecoder::decode_plc`] produces meaningful audio
    fn has_decode_plc(&self) -> bool {
        false
    }

    /// Synthesize `num_frames` lost frames, appending to `decoded`.
    /// Returns the number of samples appended.
    fn decode_plc(&mut self, _num_frames: usize, _decoded: &mut Vec<i16>) -> usize {
        0
    }

    /// Bandwidth bookkeeping for an arriving packet. Produces no audio.
    fn incoming_packet(
        &mut self,
        _payload: &[u8],
        _rtp_sequence_number: u16,
        _rtp_timestamp: u32,
        _arrival_timestamp: u32,
    ) -> Result<()> {
        Ok(())
    }

    /// Code of the most recent engine failure, 0 if none
    fn error_code(&self) -> i16 {
        0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Emits the high byte of every sample of each 10 ms block.
    struct EchoEncoder;

    impl AudioEncoder for EchoEncoder {
        fn sample_rate_hz(&self) -> u32 {
            8000
        }
        fn num_channels(&self) -> usize {
            1
        }
        fn max_encoded_bytes(&self) -> usize {
            160
        }
        fn num_10ms_frames_in_next_packet(&self) -> usize {
            1
        }
        fn max_10ms_frames_in_a_packet(&self) -> usize {
            1
        }
        fn target_bitrate(&self) -> Option<u32> {
            Some(64000)
        }
        fn encode_internal(
            &mut self,
            rtp_timestamp: u32,
            audio: &[i16],
            _max_encoded_bytes: usize,
            encoded: &mut BytesMut,
        ) -> Result<EncodedInfo> {
            encoded.extend(audio.iter().map(|&s| (s >> 8) as u8));
            Ok(EncodedInfo {
                encoded_bytes: audio.len(),
                encoded_timestamp: rtp_timestamp,
                ..EncodedInfo::empty()
            })
        }
        fn reset(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FailingDecoder;

    impl AudioDecoder for FailingDecoder {
        fn decode_internal(
            &mut self,
            _encoded: &[u8],
            _sample_rate_hz: u32,
            decoded: &mut Vec<i16>,
        ) -> Result<(usize, SpeechType)> {
            decoded.extend_from_slice(&[1, 2, 3]);
            Err(CodecError::Malformed("always fails"))
        }
        fn reset(&mut self) {}
        fn channels(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_default_toggles_report_not_honored() {
        let mut encoder = EchoEncoder;
        assert!(encoder.set_fec(false));
        assert!(!encoder.set_fec(true));
        assert!(encoder.set_dtx(false));
        assert!(!encoder.set_dtx(true));
        assert!(!encoder.set_application(Application::Speech));
        assert!(!encoder.set_max_playback_rate(8000));
        assert!(!encoder.set_projected_packet_loss_rate(0.1));
        assert!(!encoder.set_target_bitrate(32000));
        assert_eq!(encoder.rtp_timestamp_rate_hz(), 8000);
    }

    #[test]
    fn test_encode_passes_through() {
        let mut encoder = EchoEncoder;
        let mut out = BytesMut::new();
        let info = encoder.encode(77, &[0x100; 80], 160, &mut out).unwrap();
        assert_eq!(info.encoded_bytes, 80);
        assert_eq!(info.encoded_timestamp, 77);
        assert_eq!(out.len(), 80);
    }

    #[test]
    #[should_panic(expected = "exactly 10 ms")]
    fn test_encode_rejects_wrong_block_length() {
        let mut encoder = EchoEncoder;
        let mut out = BytesMut::new();
        let _ = encoder.encode(0, &[0; 79], 160, &mut out);
    }

    #[test]
    #[should_panic(expected = "more than the declared maximum")]
    fn test_encode_rejects_overrun() {
        let mut encoder = EchoEncoder;
        let mut out = BytesMut::new();
        let _ = encoder.encode(0, &[0; 80], 40, &mut out);
    }

    #[test]
    fn test_decode_failure_leaves_output_untouched() {
        let mut decoder = FailingDecoder;
        let mut decoded = vec![9i16];
        assert!(decoder.decode(&[0], 8000, &mut decoded).is_err());
        assert_eq!(decoded, vec![9]);
        assert!(!decoder.has_decode_plc());
        assert_eq!(decoder.decode_plc(3, &mut decoded), 0);
        assert!(decoder.incoming_packet(&[0], 0, 0, 0).is_ok());
        assert_eq!(decoder.packet_duration(&[0]), None);
        assert_eq!(decoder.error_code(), 0);
    }

    #[test]
    fn test_engine_code_exposed() {
        let err = CodecError::from(EngineError::NotInitialized);
        assert_eq!(err.engine_code(), Some(EngineError::NotInitialized.code()));
        assert_eq!(CodecError::Malformed("x").engine_code(), None);
    }
}
