//! Codec descriptors and shared data types

use serde::{Deserialize, Serialize};

pub use adaptive_codec_engines::{BandwidthInfo, SpeechType};

/// Payload description negotiated for a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecInst {
    /// Payload name (e.g. `"ISAC"`, `"L16"`), matched case-insensitively
    pub payload_name: String,
    /// RTP payload type
    pub payload_type: u8,
    /// Clock rate in Hz
    pub clock_rate_hz: u32,
    /// Samples per packet at the clock rate
    pub packet_size_samples: u32,
    /// Channel count
    pub channels: usize,
    /// Bit rate in bits per second; `None` selects adaptive rate control
    pub rate: Option<u32>,
}

impl CodecInst {
    /// Wideband iSAC, 30 ms packets, adaptive rate
    pub fn isac_wideband() -> Self {
        Self {
            payload_name: "ISAC".to_string(),
            payload_type: 103,
            clock_rate_hz: 16000,
            packet_size_samples: 480,
            channels: 1,
            rate: None,
        }
    }

    /// Super-wideband iSAC, 30 ms packets, adaptive rate
    pub fn isac_super_wideband() -> Self {
        Self {
            payload_name: "ISAC".to_string(),
            payload_type: 104,
            clock_rate_hz: 32000,
            packet_size_samples: 960,
            channels: 1,
            rate: None,
        }
    }

    /// Linear 16-bit PCM, 10 ms packets
    pub fn l16(clock_rate_hz: u32, channels: usize) -> Self {
        Self {
            payload_name: "L16".to_string(),
            payload_type: 107,
            clock_rate_hz,
            packet_size_samples: clock_rate_hz / 100,
            channels,
            rate: Some(clock_rate_hz * 16 * channels as u32),
        }
    }

    /// Case-insensitive payload name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.payload_name.eq_ignore_ascii_case(name)
    }
}

/// Encoder tuning target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Application {
    /// Optimize for voice
    Speech,
    /// Optimize for general audio
    Audio,
}
