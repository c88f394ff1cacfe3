//! Decoder table keyed by payload kind

use crate::bandwidth::SharedBandwidthInfo;
use crate::codec::{AudioDecoder, Result};
use crate::isac::AudioDecoderIsac;
use crate::pcm16b::Pcm16bDecoder;
use serde::{Deserialize, Serialize};

/// Decoders this crate can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecoderKind {
    /// PCM16, 8 kHz mono
    Pcm16B,
    /// PCM16, 16 kHz mono
    Pcm16BWb,
    /// PCM16, 32 kHz mono
    Pcm16BSwb32kHz,
    /// PCM16, 48 kHz mono
    Pcm16BSwb48kHz,
    /// PCM16, 8 kHz stereo
    Pcm16B2ch,
    /// PCM16, 16 kHz stereo
    Pcm16BWb2ch,
    /// PCM16, 32 kHz stereo
    Pcm16BSwb32kHz2ch,
    /// PCM16, 48 kHz stereo
    Pcm16BSwb48kHz2ch,
    /// PCM16, 8 kHz, five channels
    Pcm16B5ch,
    /// iSAC wideband
    Isac,
    /// iSAC super-wideband
    IsacSwb,
    /// iSAC full-band request, served at super-wideband rate
    IsacFb,
}

impl DecoderKind {
    /// Every kind, in table order
    pub const ALL: [DecoderKind; 12] = [
        DecoderKind::Pcm16B,
        DecoderKind::Pcm16BWb,
        DecoderKind::Pcm16BSwb32kHz,
        DecoderKind::Pcm16BSwb48kHz,
        DecoderKind::Pcm16B2ch,
        DecoderKind::Pcm16BWb2ch,
        DecoderKind::Pcm16BSwb32kHz2ch,
        DecoderKind::Pcm16BSwb48kHz2ch,
        DecoderKind::Pcm16B5ch,
        DecoderKind::Isac,
        DecoderKind::IsacSwb,
        DecoderKind::IsacFb,
    ];

    /// Native output rate
    pub fn sample_rate_hz(self) -> u32 {
        match self {
            DecoderKind::Pcm16B | DecoderKind::Pcm16B2ch | DecoderKind::Pcm16B5ch => 8000,
            DecoderKind::Pcm16BWb | DecoderKind::Pcm16BWb2ch | DecoderKind::Isac => 16000,
            DecoderKind::Pcm16BSwb32kHz
            | DecoderKind::Pcm16BSwb32kHz2ch
            | DecoderKind::IsacSwb
            | DecoderKind::IsacFb => 32000,
            DecoderKind::Pcm16BSwb48kHz | DecoderKind::Pcm16BSwb48kHz2ch => 48000,
        }
    }

    /// Output channel count
    pub fn channels(self) -> usize {
        match self {
            DecoderKind::Pcm16B2ch
            | DecoderKind::Pcm16BWb2ch
            | DecoderKind::Pcm16BSwb32kHz2ch
            | DecoderKind::Pcm16BSwb48kHz2ch => 2,
            DecoderKind::Pcm16B5ch => 5,
            _ => 1,
        }
    }

    /// Whether this kind is served by the iSAC adapter
    pub fn is_isac(self) -> bool {
        matches!(
            self,
            DecoderKind::Isac | DecoderKind::IsacSwb | DecoderKind::IsacFb
        )
    }
}

/// Build a decoder for `kind`.
///
/// iSAC decoders publish their bandwidth estimate into `bandwidth_info`;
/// other kinds ignore it.
pub fn create_audio_decoder(
    kind: DecoderKind,
    bandwidth_info: Option<SharedBandwidthInfo>,
) -> Result<Box<dyn AudioDecoder>> {
    if kind.is_isac() {
        return Ok(Box::new(AudioDecoderIsac::new(bandwidth_info)?));
    }
    Ok(Box::new(Pcm16bDecoder::new(
        kind.sample_rate_hz(),
        kind.channels(),
    )?))
}
