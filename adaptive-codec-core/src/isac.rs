//! Adaptive iSAC packetizer and depacketizer
//!
//! [`IsacEncoder`] turns the fixed 10 ms call pattern of an [`IsacEngine`]
//! into variable-length encoded units whose boundaries the engine chooses,
//! stamping each unit with the RTP timestamp of the first block that went
//! into it. [`IsacDecoder`] feeds payloads back into an engine and publishes
//! the engine's bandwidth estimate so the encoder of the same call can steer
//! by it.
//!
//! ```text
//!   far end ──► IsacDecoder::incoming_packet ──► LockedBandwidthInfo
//!                                                      │ copy
//!   mic ──────► IsacEncoder::encode ◄──────────────────┘ (every call)
//! ```

use crate::bandwidth::SharedBandwidthInfo;
use crate::codec::{AudioDecoder, AudioEncoder, CodecError, ConfigError, EncodedInfo, Result};
use crate::types::{CodecInst, SpeechType};
use adaptive_codec_engines::{CodingMode, EngineError, IsacEngine, IsacFix, IsacFloat};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Upper bound on the size of one iSAC payload
pub const MAX_ENCODED_BYTES: usize = 400;

/// Longest packet is 60 ms
const MAX_10MS_FRAMES_IN_A_PACKET: usize = 6;

/// Bit rate used when the configuration says 0
const DEFAULT_BIT_RATE: u32 = 32000;

const MIN_BIT_RATE: u32 = 10000;
const MIN_MAX_BIT_RATE: u32 = 32000;
const MIN_MAX_PAYLOAD_BYTES: usize = 120;

/// Per-profile limits
struct Profile {
    max_bit_rate: u32,
    max_rate_ceiling: u32,
    max_payload_ceiling: usize,
    frame_sizes_ms: &'static [u32],
}

const WIDEBAND: Profile = Profile {
    max_bit_rate: 32000,
    max_rate_ceiling: 53400,
    max_payload_ceiling: 400,
    frame_sizes_ms: &[30, 60],
};

const SUPER_WIDEBAND: Profile = Profile {
    max_bit_rate: 56000,
    max_rate_ceiling: 160000,
    max_payload_ceiling: 600,
    frame_sizes_ms: &[30],
};

/// iSAC encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsacConfig {
    /// RTP payload type stamped on every unit
    pub payload_type: u8,
    /// Input sample rate: 16000, 32000 or 48000
    pub sample_rate_hz: u32,
    /// Packet duration in ms
    pub frame_size_ms: u32,
    /// Nominal bit rate; 0 selects the codec default
    pub bit_rate: u32,
    /// Hard ceiling on the instantaneous bit rate
    pub max_bit_rate: Option<u32>,
    /// Hard ceiling on the payload size
    pub max_payload_size_bytes: Option<usize>,
    /// Let the engine steer rate and frame size from the bandwidth estimate
    pub adaptive_mode: bool,
    /// Keep `frame_size_ms` even in adaptive mode
    pub enforce_frame_size: bool,
    /// Where the estimate is read from (encoder) or published to (decoder)
    #[serde(skip)]
    pub bandwidth_info: Option<SharedBandwidthInfo>,
}

impl Default for IsacConfig {
    fn default() -> Self {
        Self {
            payload_type: 103,
            sample_rate_hz: 16000,
            frame_size_ms: 30,
            bit_rate: DEFAULT_BIT_RATE,
            max_bit_rate: None,
            max_payload_size_bytes: None,
            adaptive_mode: false,
            enforce_frame_size: false,
            bandwidth_info: None,
        }
    }
}

impl IsacConfig {
    /// Derive a configuration from a negotiated codec descriptor.
    ///
    /// The descriptor's packet size must be a whole number of milliseconds.
    /// A descriptor without a rate selects adaptive mode, which needs
    /// `bandwidth_info` to pass validation.
    pub fn from_codec_inst(
        inst: &CodecInst,
        bandwidth_info: Option<SharedBandwidthInfo>,
    ) -> std::result::Result<Self, ConfigError> {
        if inst.clock_rate_hz == 0 {
            return Err(ConfigError::UnsupportedSampleRate(0));
        }
        let scaled = u64::from(inst.packet_size_samples) * 1000;
        if scaled % u64::from(inst.clock_rate_hz) != 0 {
            return Err(ConfigError::InexactFrameSize {
                packet_size_samples: inst.packet_size_samples,
                clock_rate_hz: inst.clock_rate_hz,
            });
        }
        let frame_size_ms = u32::try_from(scaled / u64::from(inst.clock_rate_hz)).map_err(|_| {
            ConfigError::InexactFrameSize {
                packet_size_samples: inst.packet_size_samples,
                clock_rate_hz: inst.clock_rate_hz,
            }
        })?;

        Ok(Self {
            payload_type: inst.payload_type,
            sample_rate_hz: inst.clock_rate_hz,
            frame_size_ms,
            bit_rate: inst.rate.unwrap_or(DEFAULT_BIT_RATE),
            adaptive_mode: inst.rate.is_none(),
            bandwidth_info,
            ..Default::default()
        })
    }

    /// Check this configuration against the capabilities of engine `E`.
    pub fn validate<E: IsacEngine>(&self) -> std::result::Result<(), ConfigError> {
        if let Some(max_bit_rate) = self.max_bit_rate {
            if max_bit_rate < MIN_MAX_BIT_RATE {
                return Err(ConfigError::MaxBitRateTooLow(max_bit_rate));
            }
        }
        if let Some(max_payload) = self.max_payload_size_bytes {
            if max_payload < MIN_MAX_PAYLOAD_BYTES {
                return Err(ConfigError::MaxPayloadTooSmall(max_payload));
            }
        }
        if self.adaptive_mode && self.bandwidth_info.is_none() {
            return Err(ConfigError::MissingBandwidthStore);
        }

        let profile = match self.sample_rate_hz {
            16000 => &WIDEBAND,
            32000 | 48000 if E::HAS_SUPER_WIDEBAND => &SUPER_WIDEBAND,
            32000 | 48000 => {
                return Err(ConfigError::SuperWidebandUnsupported {
                    engine: E::NAME,
                    sample_rate_hz: self.sample_rate_hz,
                })
            }
            other => return Err(ConfigError::UnsupportedSampleRate(other)),
        };

        if let Some(max_bit_rate) = self.max_bit_rate {
            if max_bit_rate > profile.max_rate_ceiling {
                return Err(ConfigError::MaxBitRateTooHigh {
                    actual: max_bit_rate,
                    limit: profile.max_rate_ceiling,
                    sample_rate_hz: self.sample_rate_hz,
                });
            }
        }
        if let Some(max_payload) = self.max_payload_size_bytes {
            if max_payload > profile.max_payload_ceiling {
                return Err(ConfigError::MaxPayloadTooLarge {
                    actual: max_payload,
                    limit: profile.max_payload_ceiling,
                    sample_rate_hz: self.sample_rate_hz,
                });
            }
        }
        if !profile.frame_sizes_ms.contains(&self.frame_size_ms) {
            return Err(ConfigError::UnsupportedFrameSize {
                frame_size_ms: self.frame_size_ms,
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        if self.bit_rate != 0 && !(MIN_BIT_RATE..=profile.max_bit_rate).contains(&self.bit_rate) {
            return Err(ConfigError::BitRateOutOfRange {
                bit_rate: self.bit_rate,
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        Ok(())
    }

    /// Whether [`IsacConfig::validate`] accepts this configuration
    pub fn is_ok<E: IsacEngine>(&self) -> bool {
        self.validate::<E>().is_ok()
    }

    fn effective_bit_rate(&self) -> u32 {
        if self.bit_rate == 0 {
            DEFAULT_BIT_RATE
        } else {
            self.bit_rate
        }
    }
}

fn engine_error(operation: &'static str, engine: &'static str, err: EngineError) -> CodecError {
    warn!(engine, operation, code = err.code(), %err, "iSAC engine call failed");
    CodecError::Engine(err)
}

/// Packetizing encoder adapter over an [`IsacEngine`]
pub struct IsacEncoder<E: IsacEngine> {
    config: IsacConfig,
    engine: E,
    packet_in_progress: bool,
    packet_timestamp: u32,
    last_encoded_timestamp: u32,
}

/// Super-wideband capable encoder
pub type AudioEncoderIsac = IsacEncoder<IsacFloat>;
/// Wideband-only fixed-point encoder
pub type AudioEncoderIsacFix = IsacEncoder<IsacFix>;

impl<E: IsacEngine> IsacEncoder<E> {
    /// Create an encoder, rejecting invalid configurations.
    pub fn new(config: IsacConfig) -> Result<Self> {
        config.validate::<E>()?;
        let engine = Self::configure_engine(&config)?;
        Ok(Self {
            config,
            engine,
            packet_in_progress: false,
            packet_timestamp: 0,
            last_encoded_timestamp: 0,
        })
    }

    /// Create an encoder from a negotiated codec descriptor.
    pub fn from_codec_inst(
        inst: &CodecInst,
        bandwidth_info: Option<SharedBandwidthInfo>,
    ) -> Result<Self> {
        Self::new(IsacConfig::from_codec_inst(inst, bandwidth_info)?)
    }

    /// Replace the configuration, starting over with a fresh engine.
    ///
    /// An invalid configuration leaves the encoder untouched.
    pub fn reconfigure(&mut self, config: IsacConfig) -> Result<()> {
        config.validate::<E>()?;
        self.engine = Self::configure_engine(&config)?;
        self.packet_in_progress = false;
        self.config = config;
        Ok(())
    }

    /// Active configuration
    pub fn config(&self) -> &IsacConfig {
        &self.config
    }

    /// Whether input has been accepted for a unit not yet emitted
    pub fn packet_in_progress(&self) -> bool {
        self.packet_in_progress
    }

    /// Timestamp of the most recently emitted unit
    pub fn last_encoded_timestamp(&self) -> u32 {
        self.last_encoded_timestamp
    }

    fn configure_engine(config: &IsacConfig) -> Result<E> {
        let fail = |operation| move |err| engine_error(operation, E::NAME, err);

        let mut engine = E::create().map_err(fail("create"))?;
        let mode = if config.adaptive_mode {
            CodingMode::Adaptive
        } else {
            CodingMode::ChannelIndependent
        };
        engine.encoder_init(mode).map_err(fail("encoder_init"))?;
        engine
            .set_enc_samp_rate(config.sample_rate_hz)
            .map_err(fail("set_enc_samp_rate"))?;

        let bit_rate = config.effective_bit_rate();
        if config.adaptive_mode {
            engine
                .control_bwe(bit_rate, config.frame_size_ms, config.enforce_frame_size)
                .map_err(fail("control_bwe"))?;
        } else {
            engine
                .control(bit_rate, config.frame_size_ms)
                .map_err(fail("control"))?;
        }
        if let Some(max_payload) = config.max_payload_size_bytes {
            engine
                .set_max_payload_size(max_payload)
                .map_err(fail("set_max_payload_size"))?;
        }
        if let Some(max_bit_rate) = config.max_bit_rate {
            engine.set_max_rate(max_bit_rate).map_err(fail("set_max_rate"))?;
        }

        // The decoder half never runs above 32 kHz.
        engine
            .set_dec_samp_rate(config.sample_rate_hz.min(32000))
            .map_err(fail("set_dec_samp_rate"))?;

        debug!(
            engine = E::NAME,
            sample_rate_hz = config.sample_rate_hz,
            frame_size_ms = config.frame_size_ms,
            bit_rate,
            adaptive = config.adaptive_mode,
            enforce_frame_size = config.enforce_frame_size,
            "iSAC encoder configured"
        );
        Ok(engine)
    }
}

impl<E: IsacEngine> AudioEncoder for IsacEncoder<E> {
    fn sample_rate_hz(&self) -> u32 {
        self.config.sample_rate_hz
    }

    fn num_channels(&self) -> usize {
        1
    }

    fn max_encoded_bytes(&self) -> usize {
        MAX_ENCODED_BYTES
    }

    fn num_10ms_frames_in_next_packet(&self) -> usize {
        let samples_per_10ms = (self.config.sample_rate_hz / 100) as usize;
        self.engine.new_frame_len() / samples_per_10ms
    }

    fn max_10ms_frames_in_a_packet(&self) -> usize {
        MAX_10MS_FRAMES_IN_A_PACKET
    }

    fn target_bitrate(&self) -> Option<u32> {
        if self.config.adaptive_mode {
            None
        } else {
            Some(self.config.effective_bit_rate())
        }
    }

    fn encode_internal(
        &mut self,
        rtp_timestamp: u32,
        audio: &[i16],
        max_encoded_bytes: usize,
        encoded: &mut BytesMut,
    ) -> Result<EncodedInfo> {
        let packet_timestamp = if self.packet_in_progress {
            self.packet_timestamp
        } else {
            rtp_timestamp
        };

        if let Some(store) = &self.config.bandwidth_info {
            let info = store.get();
            self.engine.set_bandwidth_info(&info);
        }

        // The engine always gets room for a full payload; an overrun of the
        // caller's limit is caught by `encode`.
        let start = encoded.len();
        encoded.resize(start + MAX_ENCODED_BYTES.max(max_encoded_bytes), 0);
        let written = match self.engine.encode(audio, &mut encoded[start..]) {
            Ok(written) => written,
            Err(err) => {
                encoded.truncate(start);
                return Err(engine_error("encode", E::NAME, err));
            }
        };
        encoded.truncate(start + written);

        if written == 0 {
            self.packet_in_progress = true;
            self.packet_timestamp = packet_timestamp;
            return Ok(EncodedInfo::empty());
        }

        self.packet_in_progress = false;
        self.last_encoded_timestamp = packet_timestamp;
        Ok(EncodedInfo {
            encoded_bytes: written,
            encoded_timestamp: packet_timestamp,
            payload_type: self.config.payload_type,
            ..EncodedInfo::empty()
        })
    }

    fn reset(&mut self) -> Result<()> {
        let config = self.config.clone();
        self.reconfigure(config)
    }
}

/// Decoding adapter over an [`IsacEngine`]
pub struct IsacDecoder<E: IsacEngine> {
    engine: E,
    bandwidth_info: Option<SharedBandwidthInfo>,
    decoder_sample_rate_hz: Option<u32>,
}

/// Super-wideband capable decoder
pub type AudioDecoderIsac = IsacDecoder<IsacFloat>;
/// Wideband-only fixed-point decoder
pub type AudioDecoderIsacFix = IsacDecoder<IsacFix>;

impl<E: IsacEngine> IsacDecoder<E> {
    /// Create a decoder. With a store attached, the fresh engine's estimate
    /// is published into it right away.
    pub fn new(bandwidth_info: Option<SharedBandwidthInfo>) -> Result<Self> {
        let mut engine = E::create().map_err(|err| engine_error("create", E::NAME, err))?;
        engine.decoder_init();
        if let Some(store) = &bandwidth_info {
            store.set(engine.bandwidth_info());
        }
        Ok(Self {
            engine,
            bandwidth_info,
            decoder_sample_rate_hz: None,
        })
    }

    /// Output rate the engine is currently configured for
    pub fn decoder_sample_rate_hz(&self) -> Option<u32> {
        self.decoder_sample_rate_hz
    }

    /// Map a requested output rate onto one the engine produces.
    ///
    /// Full-band requests are served at super-wideband rate.
    fn engine_rate(sample_rate_hz: u32) -> u32 {
        match sample_rate_hz {
            48000 => 32000,
            other => other,
        }
    }
}

impl<E: IsacEngine> AudioDecoder for IsacDecoder<E> {
    /// # Panics
    ///
    /// Panics if `sample_rate_hz` is not 16000, 32000 or 48000.
    fn decode_internal(
        &mut self,
        encoded: &[u8],
        sample_rate_hz: u32,
        decoded: &mut Vec<i16>,
    ) -> Result<(usize, SpeechType)> {
        let rate = Self::engine_rate(sample_rate_hz);
        assert!(
            rate == 16000 || rate == 32000,
            "unsupported iSAC decode rate {sample_rate_hz} Hz"
        );

        if self.decoder_sample_rate_hz != Some(rate) {
            self.engine
                .set_dec_samp_rate(rate)
                .map_err(|err| engine_error("set_dec_samp_rate", E::NAME, err))?;
            debug!(
                engine = E::NAME,
                from = ?self.decoder_sample_rate_hz,
                to = rate,
                "iSAC decoder rate switched"
            );
            self.decoder_sample_rate_hz = Some(rate);
        }

        self.engine
            .decode(encoded, decoded)
            .map_err(|err| engine_error("decode", E::NAME, err))
    }

    fn reset(&mut self) {
        self.engine.decoder_init();
    }

    fn channels(&self) -> usize {
        1
    }

    fn decode_plc(&mut self, num_frames: usize, decoded: &mut Vec<i16>) -> usize {
        self.engine.decode_plc(num_frames, decoded)
    }

    fn incoming_packet(
        &mut self,
        payload: &[u8],
        rtp_sequence_number: u16,
        rtp_timestamp: u32,
        arrival_timestamp: u32,
    ) -> Result<()> {
        let status = self.engine.update_bw_estimate(
            payload,
            rtp_sequence_number,
            rtp_timestamp,
            arrival_timestamp,
        );
        if let Some(store) = &self.bandwidth_info {
            store.set(self.engine.bandwidth_info());
        }
        status.map_err(|err| engine_error("update_bw_estimate", E::NAME, err))
    }

    fn error_code(&self) -> i16 {
        self.engine.error_code()
    }
}
