//! Linear 16-bit PCM adapters
//!
//! The simplest conforming codec: samples travel as big-endian 16-bit words.
//! It shares the packet-in-progress timestamp rule of the iSAC packetizer
//! and keeps every optional toggle at "not honored".

use crate::codec::{AudioDecoder, AudioEncoder, CodecError, ConfigError, EncodedInfo, Result};
use crate::types::{CodecInst, SpeechType};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

const SUPPORTED_RATES: [u32; 4] = [8000, 16000, 32000, 48000];

/// PCM16 encoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pcm16bConfig {
    /// RTP payload type
    pub payload_type: u8,
    /// Sample rate; one of 8000, 16000, 32000, 48000
    pub sample_rate_hz: u32,
    /// Interleaved channel count
    pub num_channels: usize,
    /// 10 ms blocks per packet
    pub frames_per_packet: usize,
}

impl Default for Pcm16bConfig {
    fn default() -> Self {
        Self {
            payload_type: 107,
            sample_rate_hz: 8000,
            num_channels: 1,
            frames_per_packet: 1,
        }
    }
}

impl Pcm16bConfig {
    /// Derive a configuration from a negotiated codec descriptor
    pub fn from_codec_inst(inst: &CodecInst) -> std::result::Result<Self, ConfigError> {
        let block = inst.clock_rate_hz / 100;
        if block == 0 || inst.packet_size_samples % block != 0 {
            return Err(ConfigError::InexactFrameSize {
                packet_size_samples: inst.packet_size_samples,
                clock_rate_hz: inst.clock_rate_hz,
            });
        }
        Ok(Self {
            payload_type: inst.payload_type,
            sample_rate_hz: inst.clock_rate_hz,
            num_channels: inst.channels,
            frames_per_packet: (inst.packet_size_samples / block) as usize,
        })
    }

    /// Check the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !SUPPORTED_RATES.contains(&self.sample_rate_hz) {
            return Err(ConfigError::UnsupportedSampleRate(self.sample_rate_hz));
        }
        if self.num_channels == 0 {
            return Err(ConfigError::UnsupportedChannels(self.num_channels));
        }
        if self.frames_per_packet == 0 {
            return Err(ConfigError::InvalidFramesPerPacket(self.frames_per_packet));
        }
        Ok(())
    }

    fn samples_per_packet(&self) -> usize {
        self.frames_per_packet * self.num_channels * (self.sample_rate_hz / 100) as usize
    }
}

/// Big-endian PCM16 encoder
#[derive(Debug)]
pub struct Pcm16bEncoder {
    config: Pcm16bConfig,
    pending: Vec<i16>,
    packet_in_progress: bool,
    packet_timestamp: u32,
}

impl Pcm16bEncoder {
    /// Create an encoder, rejecting invalid configurations.
    pub fn new(config: Pcm16bConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pending: Vec::with_capacity(config.samples_per_packet()),
            config,
            packet_in_progress: false,
            packet_timestamp: 0,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Pcm16bConfig {
        &self.config
    }

    /// Whether input has been accepted for a unit not yet emitted
    pub fn packet_in_progress(&self) -> bool {
        self.packet_in_progress
    }
}

impl AudioEncoder for Pcm16bEncoder {
    fn sample_rate_hz(&self) -> u32 {
        self.config.sample_rate_hz
    }

    fn num_channels(&self) -> usize {
        self.config.num_channels
    }

    fn max_encoded_bytes(&self) -> usize {
        self.config.samples_per_packet() * 2
    }

    fn num_10ms_frames_in_next_packet(&self) -> usize {
        self.config.frames_per_packet
    }

    fn max_10ms_frames_in_a_packet(&self) -> usize {
        self.config.frames_per_packet
    }

    fn target_bitrate(&self) -> Option<u32> {
        Some(self.config.sample_rate_hz * 16 * self.config.num_channels as u32)
    }

    fn encode_internal(
        &mut self,
        rtp_timestamp: u32,
        audio: &[i16],
        _max_encoded_bytes: usize,
        encoded: &mut BytesMut,
    ) -> Result<EncodedInfo> {
        if !self.packet_in_progress {
            self.packet_in_progress = true;
            self.packet_timestamp = rtp_timestamp;
        }
        self.pending.extend_from_slice(audio);
        if self.pending.len() < self.config.samples_per_packet() {
            return Ok(EncodedInfo::empty());
        }

        encoded.reserve(self.pending.len() * 2);
        for &sample in &self.pending {
            encoded.put_i16(sample);
        }
        let encoded_bytes = self.pending.len() * 2;
        self.pending.clear();
        self.packet_in_progress = false;

        Ok(EncodedInfo {
            encoded_bytes,
            encoded_timestamp: self.packet_timestamp,
            payload_type: self.config.payload_type,
            ..EncodedInfo::empty()
        })
    }

    fn reset(&mut self) -> Result<()> {
        self.pending.clear();
        self.packet_in_progress = false;
        Ok(())
    }
}

/// Big-endian PCM16 decoder
#[derive(Debug, Clone)]
pub struct Pcm16bDecoder {
    sample_rate_hz: u32,
    channels: usize,
}

impl Pcm16bDecoder {
    /// Create a decoder for the given rate and channel count
    pub fn new(sample_rate_hz: u32, channels: usize) -> Result<Self> {
        Pcm16bConfig {
            sample_rate_hz,
            num_channels: channels,
            ..Default::default()
        }
        .validate()?;
        Ok(Self {
            sample_rate_hz,
            channels,
        })
    }

    /// Native sample rate
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

impl AudioDecoder for Pcm16bDecoder {
    /// # Panics
    ///
    /// Panics if `sample_rate_hz` differs from the decoder's own rate; PCM
    /// does not resample.
    fn decode_internal(
        &mut self,
        encoded: &[u8],
        sample_rate_hz: u32,
        decoded: &mut Vec<i16>,
    ) -> Result<(usize, SpeechType)> {
        assert_eq!(
            sample_rate_hz, self.sample_rate_hz,
            "PCM16 decoder asked for a different output rate"
        );
        if encoded.len() % 2 != 0 {
            return Err(CodecError::Malformed("odd-length PCM16 payload"));
        }
        decoded.extend(
            encoded
                .chunks_exact(2)
                .map(|pair| i16::from_be_bytes([pair[0], pair[1]])),
        );
        Ok((encoded.len() / 2, SpeechType::Speech))
    }

    fn reset(&mut self) {}

    fn channels(&self) -> usize {
        self.channels
    }

    fn packet_duration(&self, encoded: &[u8]) -> Option<usize> {
        Some(encoded.len() / (2 * self.channels))
    }
}
