//! Encoder/decoder ownership for one call
//!
//! A [`CodecOwner`] holds the speech encoder of a call together with the
//! bandwidth store that links it to the call's iSAC decoder, so whatever the
//! decoder learns from arriving packets steers the encoder. When a RED
//! payload type is given, the speech encoder is wrapped in a
//! [`CopyRedEncoder`] and [`CodecOwner::encoder`] returns the wrapper.

use crate::bandwidth::{LockedBandwidthInfo, SharedBandwidthInfo};
use crate::codec::{AudioEncoder, CodecError, Result};
use crate::isac::{AudioDecoderIsac, AudioEncoderIsac};
use crate::pcm16b::{Pcm16bConfig, Pcm16bEncoder};
use crate::red::CopyRedEncoder;
use crate::types::CodecInst;
use tracing::{debug, info};

enum EncoderChain {
    Speech(Box<dyn AudioEncoder>),
    Red(CopyRedEncoder),
}

struct ActiveEncoder {
    external: bool,
    chain: EncoderChain,
}

/// Owner of a call's speech encoder and paired iSAC decoder
pub struct CodecOwner {
    bandwidth_info: SharedBandwidthInfo,
    encoder: Option<ActiveEncoder>,
    isac_decoder: Option<AudioDecoderIsac>,
}

impl Default for CodecOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecOwner {
    /// Create an owner with a fresh bandwidth store and no encoder
    pub fn new() -> Self {
        Self {
            bandwidth_info: LockedBandwidthInfo::shared(),
            encoder: None,
            isac_decoder: None,
        }
    }

    /// Build the speech encoder for `codec_inst`, replacing any encoder
    /// currently installed. With `red_payload_type` set, the encoder is
    /// wrapped for copy redundancy.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnsupportedCodec`] for unknown payload names, or the
    /// adapter's configuration error. The installed encoder is kept on
    /// failure.
    pub fn set_encoders(
        &mut self,
        codec_inst: &CodecInst,
        red_payload_type: Option<u8>,
    ) -> Result<()> {
        let encoder: Box<dyn AudioEncoder> = if codec_inst.is_named("isac") {
            Box::new(AudioEncoderIsac::from_codec_inst(
                codec_inst,
                Some(self.bandwidth_info.clone()),
            )?)
        } else if codec_inst.is_named("l16") {
            Box::new(Pcm16bEncoder::new(Pcm16bConfig::from_codec_inst(
                codec_inst,
            )?)?)
        } else {
            return Err(CodecError::UnsupportedCodec(codec_inst.payload_name.clone()));
        };

        info!(
            codec = %codec_inst.payload_name,
            sample_rate_hz = encoder.sample_rate_hz(),
            payload_type = codec_inst.payload_type,
            adaptive = encoder.target_bitrate().is_none(),
            red_payload_type,
            "Speech encoder installed"
        );
        self.install(encoder, false, red_payload_type)
    }

    /// Install a caller-built encoder in place of the internal one
    ///
    /// # Errors
    ///
    /// Propagates a failed reset of `encoder` when RED is requested.
    pub fn set_external_encoder(
        &mut self,
        encoder: Box<dyn AudioEncoder>,
        red_payload_type: Option<u8>,
    ) -> Result<()> {
        debug!(
            sample_rate_hz = encoder.sample_rate_hz(),
            red_payload_type,
            "External speech encoder installed"
        );
        self.install(encoder, true, red_payload_type)
    }

    fn install(
        &mut self,
        mut encoder: Box<dyn AudioEncoder>,
        external: bool,
        red_payload_type: Option<u8>,
    ) -> Result<()> {
        let chain = match red_payload_type {
            Some(payload_type) => {
                // The wrapper must start in sync with the speech encoder.
                encoder.reset()?;
                EncoderChain::Red(CopyRedEncoder::new(payload_type, encoder))
            }
            None => EncoderChain::Speech(encoder),
        };
        self.encoder = Some(ActiveEncoder { external, chain });
        Ok(())
    }

    /// Whether the active encoder was supplied by the caller
    pub fn has_external_encoder(&self) -> bool {
        self.encoder.as_ref().is_some_and(|active| active.external)
    }

    /// Whether the active encoder adds copy redundancy
    pub fn has_red_encoder(&self) -> bool {
        matches!(
            self.encoder,
            Some(ActiveEncoder {
                chain: EncoderChain::Red(_),
                ..
            })
        )
    }

    /// Encoder to feed audio into: the RED wrapper when enabled, otherwise
    /// the speech encoder
    pub fn encoder(&self) -> Option<&dyn AudioEncoder> {
        self.encoder.as_ref().map(|active| match &active.chain {
            EncoderChain::Speech(e) => e.as_ref(),
            EncoderChain::Red(red) => red as &dyn AudioEncoder,
        })
    }

    /// Active encoder, mutably
    pub fn encoder_mut(&mut self) -> Option<&mut (dyn AudioEncoder + 'static)> {
        match &mut self.encoder {
            Some(ActiveEncoder { chain, .. }) => Some(match chain {
                EncoderChain::Speech(e) => e.as_mut(),
                EncoderChain::Red(red) => red as &mut (dyn AudioEncoder + 'static),
            }),
            None => None,
        }
    }

    /// Speech encoder underneath any RED wrapper
    pub fn speech_encoder(&self) -> Option<&dyn AudioEncoder> {
        self.encoder.as_ref().map(|active| match &active.chain {
            EncoderChain::Speech(e) => e.as_ref(),
            EncoderChain::Red(red) => red.speech_encoder(),
        })
    }

    /// iSAC decoder sharing this owner's bandwidth store, created on first
    /// use
    pub fn isac_decoder(&mut self) -> Result<&mut AudioDecoderIsac> {
        let decoder = self.take_isac_decoder()?;
        Ok(self.isac_decoder.insert(decoder))
    }

    /// Take the paired decoder out, e.g. to run it on another thread
    pub fn take_isac_decoder(&mut self) -> Result<AudioDecoderIsac> {
        match self.isac_decoder.take() {
            Some(decoder) => Ok(decoder),
            None => AudioDecoderIsac::new(Some(self.bandwidth_info.clone())),
        }
    }

    /// Shared bandwidth store
    pub fn bandwidth_info(&self) -> &SharedBandwidthInfo {
        &self.bandwidth_info
    }
}
