//! Copy-redundancy encoder
//!
//! [`CopyRedEncoder`] wraps a speech encoder and appends the previous unit
//! to every new one, so a single lost packet can be recovered from the next.
//! The primary unit comes first in the payload and is described by
//! `redundant[0]`; the repeated unit, when there is one, follows it and is
//! described by `redundant[1]`.

use crate::codec::{AudioEncoder, EncodedInfo, EncodedInfoLeaf, Result};
use crate::types::Application;
use bytes::{Bytes, BytesMut};
use tracing::trace;

/// Speech encoder wrapper that re-sends the previous unit with each new one
pub struct CopyRedEncoder {
    payload_type: u8,
    speech_encoder: Box<dyn AudioEncoder>,
    secondary_encoded: Bytes,
    secondary_info: EncodedInfoLeaf,
}

impl CopyRedEncoder {
    /// Wrap `speech_encoder`, stamping combined units with `payload_type`
    pub fn new(payload_type: u8, speech_encoder: Box<dyn AudioEncoder>) -> Self {
        Self {
            payload_type,
            speech_encoder,
            secondary_encoded: Bytes::new(),
            secondary_info: EncodedInfoLeaf {
                speech: false,
                ..Default::default()
            },
        }
    }

    /// RTP payload type of combined units
    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Wrapped speech encoder
    pub fn speech_encoder(&self) -> &dyn AudioEncoder {
        self.speech_encoder.as_ref()
    }

    /// Unwrap, returning the speech encoder
    pub fn into_speech_encoder(self) -> Box<dyn AudioEncoder> {
        self.speech_encoder
    }
}

impl AudioEncoder for CopyRedEncoder {
    fn sample_rate_hz(&self) -> u32 {
        self.speech_encoder.sample_rate_hz()
    }

    fn num_channels(&self) -> usize {
        self.speech_encoder.num_channels()
    }

    fn rtp_timestamp_rate_hz(&self) -> u32 {
        self.speech_encoder.rtp_timestamp_rate_hz()
    }

    fn max_encoded_bytes(&self) -> usize {
        2 * self.speech_encoder.max_encoded_bytes()
    }

    fn num_10ms_frames_in_next_packet(&self) -> usize {
        self.speech_encoder.num_10ms_frames_in_next_packet()
    }

    fn max_10ms_frames_in_a_packet(&self) -> usize {
        self.speech_encoder.max_10ms_frames_in_a_packet()
    }

    fn target_bitrate(&self) -> Option<u32> {
        self.speech_encoder.target_bitrate()
    }

    /// # Panics
    ///
    /// Panics if the wrapped encoder itself reports redundant units.
    fn encode_internal(
        &mut self,
        rtp_timestamp: u32,
        audio: &[i16],
        max_encoded_bytes: usize,
        encoded: &mut BytesMut,
    ) -> Result<EncodedInfo> {
        let primary_offset = encoded.len();
        let primary_limit = max_encoded_bytes.saturating_sub(self.secondary_encoded.len());
        let mut info = self
            .speech_encoder
            .encode(rtp_timestamp, audio, primary_limit, encoded)?;
        assert!(
            info.redundant.is_empty(),
            "redundant encoders cannot be nested"
        );

        if info.encoded_bytes > 0 {
            let primary = EncodedInfoLeaf::from(&info);
            info.redundant.push(primary.clone());
            if self.secondary_info.encoded_bytes > 0 {
                encoded.extend_from_slice(&self.secondary_encoded);
                info.redundant.push(self.secondary_info.clone());
            }
            self.secondary_encoded = Bytes::copy_from_slice(
                &encoded[primary_offset..primary_offset + primary.encoded_bytes],
            );
            trace!(
                primary_timestamp = primary.encoded_timestamp,
                units = info.redundant.len(),
                "Redundant unit built"
            );
            self.secondary_info = primary;
        }

        info.payload_type = self.payload_type;
        info.encoded_bytes = info.redundant.iter().map(|leaf| leaf.encoded_bytes).sum();
        Ok(info)
    }

    fn reset(&mut self) -> Result<()> {
        self.speech_encoder.reset()?;
        self.secondary_encoded = Bytes::new();
        self.secondary_info.encoded_bytes = 0;
        Ok(())
    }

    fn set_fec(&mut self, enable: bool) -> bool {
        self.speech_encoder.set_fec(enable)
    }

    fn set_dtx(&mut self, enable: bool) -> bool {
        self.speech_encoder.set_dtx(enable)
    }

    fn set_application(&mut self, application: Application) -> bool {
        self.speech_encoder.set_application(application)
    }

    fn set_max_playback_rate(&mut self, frequency_hz: u32) -> bool {
        self.speech_encoder.set_max_playback_rate(frequency_hz)
    }

    fn set_projected_packet_loss_rate(&mut self, fraction: f64) -> bool {
        self.speech_encoder.set_projected_packet_loss_rate(fraction)
    }

    fn set_target_bitrate(&mut self, target_bps: u32) -> bool {
        self.speech_encoder.set_target_bitrate(target_bps)
    }
}
