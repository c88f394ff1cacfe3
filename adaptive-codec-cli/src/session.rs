//! Session configuration file

use adaptive_codec_core::{CodecInst, PoolConfig};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for a loopback or video session, loadable from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Payload name: "isac" or "l16"
    pub codec: String,
    pub sample_rate_hz: u32,
    /// Fixed bit rate; absent selects adaptive mode
    pub bit_rate: Option<u32>,
    pub frame_ms: u32,
    pub duration_ms: u32,
    /// Percentage of units dropped in transit
    pub loss_percent: u8,
    /// Seed for the loss pattern
    pub seed: Option<u64>,
    /// Payload type for copy redundancy; absent disables it
    pub red_payload_type: Option<u8>,
    /// Decode buffer pool used by the video session
    pub pool: PoolConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            codec: "isac".to_string(),
            sample_rate_hz: 16000,
            bit_rate: Some(32000),
            frame_ms: 30,
            duration_ms: 3000,
            loss_percent: 0,
            seed: None,
            red_payload_type: None,
            pool: PoolConfig {
                strict: false,
                ..PoolConfig::default()
            },
        }
    }
}

impl SessionConfig {
    /// Read a JSON session file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing session file {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    /// Reject settings no codec could use
    pub fn check(&self) -> Result<()> {
        if self.loss_percent > 100 {
            bail!("loss_percent must be at most 100, got {}", self.loss_percent);
        }
        if self.sample_rate_hz == 0 || self.frame_ms == 0 {
            bail!("sample rate and frame duration must be non-zero");
        }
        if self.red_payload_type == Some(self.codec_inst().payload_type) {
            bail!("RED payload type must differ from the speech payload type");
        }
        Ok(())
    }

    /// Codec descriptor for this session
    pub fn codec_inst(&self) -> CodecInst {
        let packet_size_samples = self.sample_rate_hz * self.frame_ms / 1000;
        if self.codec.eq_ignore_ascii_case("l16") {
            CodecInst {
                packet_size_samples,
                ..CodecInst::l16(self.sample_rate_hz, 1)
            }
        } else {
            let base = if self.sample_rate_hz == 16000 {
                CodecInst::isac_wideband()
            } else {
                CodecInst::isac_super_wideband()
            };
            CodecInst {
                payload_name: self.codec.clone(),
                clock_rate_hz: self.sample_rate_hz,
                packet_size_samples,
                rate: self.bit_rate,
                ..base
            }
        }
    }
}
