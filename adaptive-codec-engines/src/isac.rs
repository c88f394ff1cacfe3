//! iSAC-style adaptive speech engine
//!
//! # ⚠️ SIMULATION IMPLEMENTATION
//!
//! [`SimulatedIsac`] obeys the [`IsacEngine`] contract (10 ms input blocks,
//! 30/60 ms packets, bandwidth-driven rate and frame size, arrival based
//! bandwidth estimation) but does not perform real audio compression. The
//! payload body is a coarse, rate-sized summary of the input samples.
//!
//! **Not suitable for production audio calls.**

use crate::{BandwidthInfo, EngineError, Result, SpeechType};

/// Packet header: 10 ms frame count, sample rate code.
const HEADER_SIZE: usize = 2;

const MIN_BIT_RATE: u32 = 10000;
const DEFAULT_BIT_RATE: u32 = 32000;
const WIDEBAND_MAX_BIT_RATE: u32 = 32000;
const SUPER_WIDEBAND_MAX_BIT_RATE: u32 = 56000;

const MIN_PAYLOAD_LIMIT: usize = 120;
const WIDEBAND_MAX_PAYLOAD: usize = 400;
const SUPER_WIDEBAND_MAX_PAYLOAD: usize = 600;

const MIN_RATE_LIMIT: u32 = 32000;
const WIDEBAND_MAX_RATE_LIMIT: u32 = 53400;
const SUPER_WIDEBAND_MAX_RATE_LIMIT: u32 = 160000;

/// Below this estimate an unlocked wideband encoder switches to 60 ms packets.
const LONG_FRAME_THRESHOLD_BPS: u32 = 20000;

/// Duration of one concealment frame.
const PLC_FRAME_MS: usize = 30;

/// Encoder coding mode selected at `encoder_init`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingMode {
    /// Bit rate and frame size follow the pushed bandwidth estimate
    Adaptive,
    /// Bit rate and frame size are fixed through `control`
    ChannelIndependent,
}

/// Operation set of an iSAC-style native engine.
///
/// One engine instance carries both encoder and decoder state, like the
/// native library does. `encode` consumes exactly one 10 ms block per call
/// and returns `Ok(0)` until it has buffered a full packet.
pub trait IsacEngine: Send + Sized {
    /// Engine name for diagnostics
    const NAME: &'static str;
    /// Whether 32/48 kHz encoding is available
    const HAS_SUPER_WIDEBAND: bool;

    /// Allocate a fresh engine instance.
    fn create() -> Result<Self>;

    fn encoder_init(&mut self, mode: CodingMode) -> Result<()>;
    fn set_enc_samp_rate(&mut self, sample_rate_hz: u32) -> Result<()>;
    fn enc_samp_rate(&self) -> u32;
    fn set_dec_samp_rate(&mut self, sample_rate_hz: u32) -> Result<()>;

    /// Fixed-rate control directive.
    fn control(&mut self, bit_rate: u32, frame_size_ms: u32) -> Result<()>;
    /// Adaptive "bandwidth control" directive: starting rate, starting frame
    /// size, and whether the frame size is locked.
    fn control_bwe(
        &mut self,
        bit_rate: u32,
        frame_size_ms: u32,
        enforce_frame_size: bool,
    ) -> Result<()>;
    fn set_max_payload_size(&mut self, max_payload_bytes: usize) -> Result<()>;
    fn set_max_rate(&mut self, max_bit_rate: u32) -> Result<()>;

    /// Samples the next packet will contain.
    fn new_frame_len(&self) -> usize;

    /// Feed one 10 ms block. Returns the number of bytes written to
    /// `encoded`, zero while a packet is still being accumulated.
    fn encode(&mut self, audio: &[i16], encoded: &mut [u8]) -> Result<usize>;

    fn decoder_init(&mut self);
    /// Decode one payload, appending samples to `decoded`.
    fn decode(&mut self, encoded: &[u8], decoded: &mut Vec<i16>) -> Result<(usize, SpeechType)>;
    /// Conceal `num_frames` lost frames, appending samples to `decoded`.
    fn decode_plc(&mut self, num_frames: usize, decoded: &mut Vec<i16>) -> usize;

    /// Feed arrival information of one packet into the bandwidth estimator.
    fn update_bw_estimate(
        &mut self,
        payload: &[u8],
        rtp_sequence_number: u16,
        rtp_timestamp: u32,
        arrival_timestamp: u32,
    ) -> Result<()>;
    /// Current estimate produced by this engine's estimator.
    fn bandwidth_info(&self) -> BandwidthInfo;
    /// Estimate the encoder should steer by.
    fn set_bandwidth_info(&mut self, info: &BandwidthInfo);

    /// Code of the most recent failure, 0 if none.
    fn error_code(&self) -> i16;
}

/// Float engine: wideband and super-wideband.
pub type IsacFloat = SimulatedIsac<true>;
/// Fixed-point engine: wideband only.
pub type IsacFix = SimulatedIsac<false>;

#[derive(Debug, Clone, Copy)]
struct Arrival {
    sequence_number: u16,
    rtp_timestamp: u32,
    arrival_timestamp: u32,
}

/// Arrival-driven estimator kept by the decoder half of the engine.
#[derive(Debug, Default)]
struct ArrivalEstimator {
    last: Option<Arrival>,
    received: u32,
    lost: u32,
    avg_bps: Option<u32>,
    avg_delay_ms: u32,
}

impl ArrivalEstimator {
    fn update(&mut self, payload_len: usize, arrival: Arrival, clock_hz: u32, max_bps: u32) {
        if let Some(prev) = self.last {
            let gap = arrival.sequence_number.wrapping_sub(prev.sequence_number);
            if gap > 1 && gap < 0x8000 {
                self.lost = self.lost.saturating_add(u32::from(gap - 1));
            }

            let elapsed = arrival.arrival_timestamp.wrapping_sub(prev.arrival_timestamp);
            if elapsed > 0 && elapsed < u32::MAX / 2 {
                let bits = payload_len as u64 * 8;
                let inst = (bits * u64::from(clock_hz) / u64::from(elapsed))
                    .clamp(u64::from(MIN_BIT_RATE), u64::from(max_bps)) as u32;
                self.avg_bps = Some(match self.avg_bps {
                    Some(avg) => ((u64::from(avg) * 7 + u64::from(inst)) / 8) as u32,
                    None => inst,
                });
            }

            let transit = arrival.arrival_timestamp.wrapping_sub(arrival.rtp_timestamp) as i32;
            let prev_transit = prev.arrival_timestamp.wrapping_sub(prev.rtp_timestamp) as i32;
            let delta = transit.wrapping_sub(prev_transit).unsigned_abs();
            let delay_ms = (u64::from(delta) * 1000 / u64::from(clock_hz.max(1))).min(1000) as u32;
            self.avg_delay_ms = (self.avg_delay_ms * 15 + delay_ms) / 16;
        }
        self.received = self.received.saturating_add(1);
        self.last = Some(arrival);
    }

    fn info(&self, max_bps: u32) -> BandwidthInfo {
        let Some(avg) = self.avg_bps else {
            return BandwidthInfo::default();
        };
        let span = max_bps.saturating_sub(MIN_BIT_RATE).max(1);
        let total = self.received.saturating_add(self.lost).max(1);
        BandwidthInfo {
            in_use: true,
            send_bw_avg_bps: avg,
            send_max_delay_avg_ms: self.avg_delay_ms,
            bottleneck_index: (avg.saturating_sub(MIN_BIT_RATE) * 11 / span).min(11) as u8,
            jitter_index: match self.avg_delay_ms {
                0..=9 => 0,
                10..=24 => 1,
                25..=49 => 2,
                _ => 3,
            },
            loss_percent: (u64::from(self.lost) * 100 / u64::from(total)) as u8,
        }
    }
}

/// Simulated iSAC engine. `SWB` selects super-wideband support.
#[derive(Debug)]
pub struct SimulatedIsac<const SWB: bool> {
    mode: Option<CodingMode>,
    enc_rate_hz: u32,
    dec_rate_hz: u32,
    bit_rate: u32,
    frame_size_ms: u32,
    enforce_frame_size: bool,
    max_payload_bytes: Option<usize>,
    max_rate_bps: Option<u32>,
    pending: Vec<i16>,
    /// Frame size and bit rate fixed at the first block of a packet.
    packet: Option<(u32, u32)>,
    remote_bw: BandwidthInfo,
    estimator: ArrivalEstimator,
    last_error: i16,
}

impl<const SWB: bool> SimulatedIsac<SWB> {
    fn fail<T>(&mut self, err: EngineError) -> Result<T> {
        tracing::trace!(engine = <Self as IsacEngine>::NAME, code = err.code(), %err, "engine call failed");
        self.last_error = err.code();
        Err(err)
    }

    fn is_wideband(&self) -> bool {
        self.enc_rate_hz == 16000
    }

    fn max_bit_rate(&self) -> u32 {
        if self.is_wideband() {
            WIDEBAND_MAX_BIT_RATE
        } else {
            SUPER_WIDEBAND_MAX_BIT_RATE
        }
    }

    fn estimator_max_bps() -> u32 {
        if SWB {
            SUPER_WIDEBAND_MAX_BIT_RATE
        } else {
            WIDEBAND_MAX_BIT_RATE
        }
    }

    fn check_rate_and_frame(&mut self, bit_rate: u32, frame_size_ms: u32) -> Result<()> {
        if self.mode.is_none() {
            return self.fail(EngineError::NotInitialized);
        }
        if !(MIN_BIT_RATE..=self.max_bit_rate()).contains(&bit_rate) {
            return self.fail(EngineError::BitRateOutOfRange(bit_rate));
        }
        let frame_ok = match frame_size_ms {
            30 => true,
            60 => self.is_wideband(),
            _ => false,
        };
        if !frame_ok {
            return self.fail(EngineError::UnsupportedFrameSize(frame_size_ms));
        }
        Ok(())
    }

    /// Frame size and bit rate a packet starting now would use.
    fn next_packet_params(&self) -> (u32, u32) {
        if self.mode == Some(CodingMode::Adaptive) && self.remote_bw.in_use {
            let bit_rate = self
                .remote_bw
                .send_bw_avg_bps
                .clamp(MIN_BIT_RATE, self.max_bit_rate());
            let frame_size_ms = if self.enforce_frame_size {
                self.frame_size_ms
            } else if self.is_wideband() && bit_rate < LONG_FRAME_THRESHOLD_BPS {
                60
            } else {
                30
            };
            (frame_size_ms, bit_rate)
        } else {
            (self.frame_size_ms, self.bit_rate)
        }
    }

    fn payload_len(&self, frame_size_ms: u32, bit_rate: u32) -> usize {
        let frame = frame_size_ms as usize;
        let mut len = bit_rate as usize * frame / 8000;
        if let Some(max_rate) = self.max_rate_bps {
            len = len.min(max_rate as usize * frame / 8000);
        }
        let ceiling = self.max_payload_bytes.unwrap_or(if self.is_wideband() {
            WIDEBAND_MAX_PAYLOAD
        } else {
            SUPER_WIDEBAND_MAX_PAYLOAD
        });
        len.min(ceiling).max(HEADER_SIZE + 1)
    }
}

fn rate_code(sample_rate_hz: u32) -> u8 {
    match sample_rate_hz {
        32000 => 2,
        48000 => 3,
        _ => 1,
    }
}

impl<const SWB: bool> IsacEngine for SimulatedIsac<SWB> {
    const NAME: &'static str = if SWB { "isac" } else { "isacfix" };
    const HAS_SUPER_WIDEBAND: bool = SWB;

    fn create() -> Result<Self> {
        Ok(Self {
            mode: None,
            enc_rate_hz: 16000,
            dec_rate_hz: 16000,
            bit_rate: DEFAULT_BIT_RATE,
            frame_size_ms: 30,
            enforce_frame_size: false,
            max_payload_bytes: None,
            max_rate_bps: None,
            pending: Vec::new(),
            packet: None,
            remote_bw: BandwidthInfo::default(),
            estimator: ArrivalEstimator::default(),
            last_error: 0,
        })
    }

    fn encoder_init(&mut self, mode: CodingMode) -> Result<()> {
        self.mode = Some(mode);
        self.bit_rate = DEFAULT_BIT_RATE;
        self.frame_size_ms = 30;
        self.enforce_frame_size = false;
        self.max_payload_bytes = None;
        self.max_rate_bps = None;
        self.pending.clear();
        self.packet = None;
        Ok(())
    }

    fn set_enc_samp_rate(&mut self, sample_rate_hz: u32) -> Result<()> {
        match sample_rate_hz {
            16000 => {}
            32000 | 48000 if SWB => {}
            other => return self.fail(EngineError::UnsupportedSampleRate(other)),
        }
        self.enc_rate_hz = sample_rate_hz;
        self.pending.clear();
        self.packet = None;
        Ok(())
    }

    fn enc_samp_rate(&self) -> u32 {
        self.enc_rate_hz
    }

    fn set_dec_samp_rate(&mut self, sample_rate_hz: u32) -> Result<()> {
        match sample_rate_hz {
            16000 => {}
            32000 if SWB => {}
            other => return self.fail(EngineError::UnsupportedSampleRate(other)),
        }
        self.dec_rate_hz = sample_rate_hz;
        Ok(())
    }

    fn control(&mut self, bit_rate: u32, frame_size_ms: u32) -> Result<()> {
        self.check_rate_and_frame(bit_rate, frame_size_ms)?;
        self.bit_rate = bit_rate;
        self.frame_size_ms = frame_size_ms;
        Ok(())
    }

    fn control_bwe(
        &mut self,
        bit_rate: u32,
        frame_size_ms: u32,
        enforce_frame_size: bool,
    ) -> Result<()> {
        self.check_rate_and_frame(bit_rate, frame_size_ms)?;
        self.bit_rate = bit_rate;
        self.frame_size_ms = frame_size_ms;
        self.enforce_frame_size = enforce_frame_size;
        Ok(())
    }

    fn set_max_payload_size(&mut self, max_payload_bytes: usize) -> Result<()> {
        let limit = if self.is_wideband() {
            WIDEBAND_MAX_PAYLOAD
        } else {
            SUPER_WIDEBAND_MAX_PAYLOAD
        };
        if !(MIN_PAYLOAD_LIMIT..=limit).contains(&max_payload_bytes) {
            return self.fail(EngineError::PayloadLimitOutOfRange(max_payload_bytes));
        }
        self.max_payload_bytes = Some(max_payload_bytes);
        Ok(())
    }

    fn set_max_rate(&mut self, max_bit_rate: u32) -> Result<()> {
        let limit = if self.is_wideband() {
            WIDEBAND_MAX_RATE_LIMIT
        } else {
            SUPER_WIDEBAND_MAX_RATE_LIMIT
        };
        if !(MIN_RATE_LIMIT..=limit).contains(&max_bit_rate) {
            return self.fail(EngineError::BitRateOutOfRange(max_bit_rate));
        }
        self.max_rate_bps = Some(max_bit_rate);
        Ok(())
    }

    fn new_frame_len(&self) -> usize {
        let (frame_size_ms, _) = self.packet.unwrap_or_else(|| self.next_packet_params());
        (frame_size_ms * self.enc_rate_hz / 1000) as usize
    }

    fn encode(&mut self, audio: &[i16], encoded: &mut [u8]) -> Result<usize> {
        if self.mode.is_none() {
            return self.fail(EngineError::NotInitialized);
        }
        let block = (self.enc_rate_hz / 100) as usize;
        if audio.len() != block {
            return self.fail(EngineError::InputLength {
                actual: audio.len(),
                expected: block,
            });
        }

        let (frame_size_ms, bit_rate) = match self.packet {
            Some(params) => params,
            None => {
                let params = self.next_packet_params();
                self.packet = Some(params);
                params
            }
        };

        let frame_len = (frame_size_ms * self.enc_rate_hz / 1000) as usize;
        if self.pending.len() + audio.len() < frame_len {
            self.pending.extend_from_slice(audio);
            return Ok(0);
        }

        // A rejected block is not buffered.
        let payload_len = self.payload_len(frame_size_ms, bit_rate);
        if encoded.len() < payload_len {
            return self.fail(EngineError::OutputTooSmall {
                needed: payload_len,
                available: encoded.len(),
            });
        }
        self.pending.extend_from_slice(audio);

        encoded[0] = (frame_size_ms / 10) as u8;
        encoded[1] = rate_code(self.enc_rate_hz);

        // Each body byte summarizes an equal slice of the packet's samples.
        let samples = &self.pending[..frame_len];
        let body_len = payload_len - HEADER_SIZE;
        for (j, out) in encoded[HEADER_SIZE..payload_len].iter_mut().enumerate() {
            let start = (j * frame_len / body_len).min(frame_len - 1);
            let end = ((j + 1) * frame_len / body_len).clamp(start + 1, frame_len);
            let slice = &samples[start..end];
            let sum: i64 = slice.iter().map(|&s| i64::from(s)).sum();
            let mean = sum / slice.len() as i64;
            *out = ((mean >> 8) as i8) as u8;
        }

        self.pending.drain(..frame_len);
        self.packet = None;
        Ok(payload_len)
    }

    fn decoder_init(&mut self) {
        self.estimator = ArrivalEstimator::default();
        self.last_error = 0;
    }

    fn decode(&mut self, encoded: &[u8], decoded: &mut Vec<i16>) -> Result<(usize, SpeechType)> {
        if encoded.len() <= HEADER_SIZE {
            return self.fail(EngineError::InvalidData("isac payload too small"));
        }
        let frames = encoded[0] as usize;
        if frames != 3 && frames != 6 {
            return self.fail(EngineError::InvalidData("invalid frame count"));
        }
        match encoded[1] {
            1 => {}
            2 | 3 if SWB => {}
            2 => return self.fail(EngineError::UnsupportedSampleRate(32000)),
            3 => return self.fail(EngineError::UnsupportedSampleRate(48000)),
            _ => return self.fail(EngineError::InvalidData("invalid rate code")),
        }

        let body = &encoded[HEADER_SIZE..];
        let out_len = frames * (self.dec_rate_hz / 100) as usize;
        decoded.reserve(out_len);
        for i in 0..out_len {
            let value = body[i * body.len() / out_len] as i8;
            decoded.push(i16::from(value) << 8);
        }

        let speech_type = if body.iter().all(|&b| b == 0) {
            SpeechType::ComfortNoise
        } else {
            SpeechType::Speech
        };
        Ok((out_len, speech_type))
    }

    fn decode_plc(&mut self, num_frames: usize, decoded: &mut Vec<i16>) -> usize {
        let samples = num_frames * PLC_FRAME_MS * self.dec_rate_hz as usize / 1000;
        decoded.resize(decoded.len() + samples, 0);
        samples
    }

    fn update_bw_estimate(
        &mut self,
        payload: &[u8],
        rtp_sequence_number: u16,
        rtp_timestamp: u32,
        arrival_timestamp: u32,
    ) -> Result<()> {
        if payload.len() <= HEADER_SIZE {
            return self.fail(EngineError::InvalidData("isac payload too small"));
        }
        let arrival = Arrival {
            sequence_number: rtp_sequence_number,
            rtp_timestamp,
            arrival_timestamp,
        };
        self.estimator
            .update(payload.len(), arrival, self.dec_rate_hz, Self::estimator_max_bps());
        Ok(())
    }

    fn bandwidth_info(&self) -> BandwidthInfo {
        self.estimator.info(Self::estimator_max_bps())
    }

    fn set_bandwidth_info(&mut self, info: &BandwidthInfo) {
        self.remote_bw = *info;
    }

    fn error_code(&self) -> i16 {
        self.last_error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fixed_engine(rate: u32, bit_rate: u32, frame_ms: u32) -> IsacFloat {
        let mut engine = IsacFloat::create().unwrap();
        engine.encoder_init(CodingMode::ChannelIndependent).unwrap();
        engine.set_enc_samp_rate(rate).unwrap();
        engine.control(bit_rate, frame_ms).unwrap();
        engine
    }

    fn feed_blocks(engine: &mut impl IsacEngine, blocks: usize, value: i16) -> Vec<usize> {
        let block = vec![value; (engine.enc_samp_rate() / 100) as usize];
        let mut out = [0u8; 600];
        (0..blocks)
            .map(|_| engine.encode(&block, &mut out).unwrap())
            .collect()
    }

    #[test]
    fn test_encode_requires_init() {
        let mut engine = IsacFloat::create().unwrap();
        let mut out = [0u8; 400];
        let err = engine.encode(&[0; 160], &mut out).unwrap_err();
        assert_eq!(err, EngineError::NotInitialized);
        assert_eq!(engine.error_code(), EngineError::NotInitialized.code());
    }

    #[test]
    fn test_encode_input_length_mismatch() {
        let mut engine = fixed_engine(16000, 32000, 30);
        let mut out = [0u8; 400];
        let err = engine.encode(&[0; 100], &mut out).unwrap_err();
        assert!(matches!(err, EngineError::InputLength { actual: 100, expected: 160 }));
    }

    #[test]
    fn test_30ms_packet_after_three_blocks() {
        let mut engine = fixed_engine(16000, 32000, 30);
        assert_eq!(engine.new_frame_len(), 480);
        let sizes = feed_blocks(&mut engine, 3, 1000);
        assert_eq!(sizes, vec![0, 0, 120]);
    }

    #[test]
    fn test_60ms_packet_after_six_blocks() {
        let mut engine = fixed_engine(16000, 20000, 60);
        assert_eq!(engine.new_frame_len(), 960);
        let sizes = feed_blocks(&mut engine, 6, 1000);
        assert_eq!(sizes, vec![0, 0, 0, 0, 0, 150]);
    }

    #[test]
    fn test_payload_ceiling_limits_packet() {
        let mut engine = fixed_engine(32000, 56000, 30);
        engine.set_max_payload_size(150).unwrap();
        let sizes = feed_blocks(&mut engine, 3, 1000);
        assert_eq!(sizes[2], 150);
    }

    #[test]
    fn test_rate_ceiling_limits_packet() {
        let mut engine = fixed_engine(32000, 56000, 30);
        engine.set_max_rate(40000).unwrap();
        let sizes = feed_blocks(&mut engine, 3, 1000);
        assert_eq!(sizes[2], 150);
    }

    #[test]
    fn test_output_too_small() {
        let mut engine = fixed_engine(16000, 32000, 30);
        let block = [0i16; 160];
        let mut out = [0u8; 16];
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 0);
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 0);
        assert!(matches!(
            engine.encode(&block, &mut out),
            Err(EngineError::OutputTooSmall { needed: 120, available: 16 })
        ));

        // Retrying the same block with room completes the packet.
        let mut out = [0u8; 400];
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 120);
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 0);
    }

    #[test]
    fn test_fix_engine_rejects_super_wideband() {
        let mut engine = IsacFix::create().unwrap();
        engine.encoder_init(CodingMode::ChannelIndependent).unwrap();
        assert!(engine.set_enc_samp_rate(32000).is_err());
        assert!(engine.set_dec_samp_rate(32000).is_err());
        assert_eq!(IsacFix::NAME, "isacfix");
        assert!(!IsacFix::HAS_SUPER_WIDEBAND);
    }

    #[test]
    fn test_control_validates_ranges() {
        let mut engine = fixed_engine(16000, 32000, 30);
        assert!(engine.control(9999, 30).is_err());
        assert!(engine.control(32001, 30).is_err());
        assert!(engine.control(32000, 20).is_err());
        engine.set_enc_samp_rate(32000).unwrap();
        assert!(engine.control(56000, 60).is_err());
        assert!(engine.control(56000, 30).is_ok());
    }

    #[test]
    fn test_decode_reconstructs_packet_duration() {
        let mut engine = fixed_engine(16000, 32000, 30);
        let block = vec![4000i16; 160];
        let mut out = [0u8; 400];
        let mut len = 0;
        for _ in 0..3 {
            len = engine.encode(&block, &mut out).unwrap();
        }

        let mut decoded = Vec::new();
        let (samples, speech_type) = engine.decode(&out[..len], &mut decoded).unwrap();
        assert_eq!(samples, 480);
        assert_eq!(decoded.len(), 480);
        assert_eq!(speech_type, SpeechType::Speech);
        assert!(decoded.iter().all(|&s| s == 15 << 8));
    }

    #[test]
    fn test_decode_silence_is_comfort_noise() {
        let mut engine = fixed_engine(16000, 32000, 30);
        let sizes = feed_blocks(&mut engine, 3, 0);
        let payload = vec![3u8, 1, 0, 0, 0, 0];
        assert_eq!(sizes[2], 120);
        let mut decoded = Vec::new();
        let (_, speech_type) = engine.decode(&payload, &mut decoded).unwrap();
        assert_eq!(speech_type, SpeechType::ComfortNoise);
    }

    #[test]
    fn test_decode_corrupted_data() {
        let mut engine = IsacFloat::create().unwrap();
        let mut decoded = Vec::new();
        assert!(engine.decode(&[3], &mut decoded).is_err());
        assert!(engine.decode(&[4, 1, 0], &mut decoded).is_err());
        assert!(engine.decode(&[3, 9, 0], &mut decoded).is_err());
        assert_ne!(engine.error_code(), 0);
        assert!(decoded.is_empty());

        let mut fix = IsacFix::create().unwrap();
        assert!(matches!(
            fix.decode(&[3, 2, 1], &mut decoded),
            Err(EngineError::UnsupportedSampleRate(32000))
        ));
    }

    #[test]
    fn test_decode_plc_appends_silence() {
        let mut engine = IsacFloat::create().unwrap();
        let mut decoded = vec![1i16];
        assert_eq!(engine.decode_plc(2, &mut decoded), 960);
        assert_eq!(decoded.len(), 961);
    }

    #[test]
    fn test_estimator_needs_two_arrivals() {
        let mut engine = IsacFloat::create().unwrap();
        let payload = [3u8; 120];
        engine.update_bw_estimate(&payload, 1, 0, 1000).unwrap();
        assert!(!engine.bandwidth_info().in_use);

        engine.update_bw_estimate(&payload, 2, 480, 1480).unwrap();
        let info = engine.bandwidth_info();
        assert!(info.in_use);
        // 120 bytes every 480 samples at 16 kHz is 32 kbps.
        assert_eq!(info.send_bw_avg_bps, 32000);
        assert_eq!(info.loss_percent, 0);
    }

    #[test]
    fn test_estimator_tracks_loss() {
        let mut engine = IsacFloat::create().unwrap();
        let payload = [3u8; 60];
        engine.update_bw_estimate(&payload, 10, 0, 0).unwrap();
        engine.update_bw_estimate(&payload, 12, 960, 960).unwrap();
        let info = engine.bandwidth_info();
        assert!(info.in_use);
        // One lost out of three sent.
        assert_eq!(info.loss_percent, 33);
    }

    #[test]
    fn test_decoder_init_resets_estimate() {
        let mut engine = IsacFloat::create().unwrap();
        let payload = [3u8; 60];
        engine.update_bw_estimate(&payload, 1, 0, 0).unwrap();
        engine.update_bw_estimate(&payload, 2, 480, 480).unwrap();
        assert!(engine.bandwidth_info().in_use);
        engine.decoder_init();
        assert_eq!(engine.bandwidth_info(), BandwidthInfo::default());
    }

    #[test]
    fn test_adaptive_low_estimate_switches_to_60ms() {
        let mut engine = IsacFloat::create().unwrap();
        engine.encoder_init(CodingMode::Adaptive).unwrap();
        engine.control_bwe(32000, 30, false).unwrap();
        engine.set_bandwidth_info(&BandwidthInfo {
            in_use: true,
            send_bw_avg_bps: 12000,
            ..Default::default()
        });
        assert_eq!(engine.new_frame_len(), 960);
        let sizes = feed_blocks(&mut engine, 6, 500);
        assert_eq!(sizes, vec![0, 0, 0, 0, 0, 90]);
    }

    #[test]
    fn test_adaptive_enforced_frame_size_stays() {
        let mut engine = IsacFloat::create().unwrap();
        engine.encoder_init(CodingMode::Adaptive).unwrap();
        engine.control_bwe(32000, 30, true).unwrap();
        engine.set_bandwidth_info(&BandwidthInfo {
            in_use: true,
            send_bw_avg_bps: 12000,
            ..Default::default()
        });
        let sizes = feed_blocks(&mut engine, 3, 500);
        assert_eq!(sizes, vec![0, 0, 45]);
    }

    #[test]
    fn test_packet_params_fixed_at_packet_start() {
        let mut engine = IsacFloat::create().unwrap();
        engine.encoder_init(CodingMode::Adaptive).unwrap();
        engine.control_bwe(32000, 30, false).unwrap();
        let block = [0i16; 160];
        let mut out = [0u8; 400];
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 0);

        // A low estimate arriving mid-packet applies to the next packet only.
        engine.set_bandwidth_info(&BandwidthInfo {
            in_use: true,
            send_bw_avg_bps: 12000,
            ..Default::default()
        });
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 0);
        assert_eq!(engine.encode(&block, &mut out).unwrap(), 120);
        assert_eq!(engine.new_frame_len(), 960);
    }
}
