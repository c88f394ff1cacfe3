//! Speech loopback over a lossy in-process channel

use crate::session::SessionConfig;
use adaptive_codec_core::{
    create_audio_decoder, AudioDecoder, BandwidthInfo, CodecOwner, DecoderKind,
};
use anyhow::{anyhow, bail, Result};
use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One encoded unit in transit
#[derive(Debug)]
struct Packet {
    sequence_number: u16,
    timestamp: u32,
    payload: Bytes,
    /// Length of the primary unit; anything after it repeats the previous one
    primary_bytes: usize,
}

/// What the sender side observed
#[derive(Debug, Default)]
struct SendStats {
    units_sent: usize,
    units_lost: usize,
    bytes_sent: usize,
}

/// What the receiver side observed
#[derive(Debug, Default)]
struct ReceiveStats {
    units_decoded: usize,
    samples_decoded: usize,
    samples_concealed: usize,
    units_recovered: usize,
}

/// Outcome of a loopback session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackReport {
    pub units_sent: usize,
    pub units_lost: usize,
    pub bytes_sent: usize,
    pub units_decoded: usize,
    pub samples_decoded: usize,
    pub samples_concealed: usize,
    pub units_recovered: usize,
    pub estimate: BandwidthInfo,
}

fn pcm_decoder_kind(sample_rate_hz: u32) -> Result<DecoderKind> {
    Ok(match sample_rate_hz {
        8000 => DecoderKind::Pcm16B,
        16000 => DecoderKind::Pcm16BWb,
        32000 => DecoderKind::Pcm16BSwb32kHz,
        48000 => DecoderKind::Pcm16BSwb48kHz,
        other => bail!("no PCM16 decoder for {other} Hz"),
    })
}

fn tone_block(sample_rate_hz: u32, block: u32) -> Vec<i16> {
    let samples = sample_rate_hz / 100;
    (0..samples)
        .map(|i| {
            let n = (block * samples + i) as f32;
            ((2.0 * PI * 440.0 * n / sample_rate_hz as f32).sin() * 8000.0) as i16
        })
        .collect()
}

fn send_loop(
    mut owner: CodecOwner,
    tx: mpsc::Sender<Packet>,
    config: SessionConfig,
) -> Result<SendStats> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let encoder = owner
        .encoder_mut()
        .ok_or_else(|| anyhow!("no speech encoder installed"))?;
    let max_bytes = encoder.max_encoded_bytes();

    let mut stats = SendStats::default();
    let mut payload = BytesMut::with_capacity(max_bytes);
    let mut sequence_number: u16 = 0;
    let samples_per_block = config.sample_rate_hz / 100;

    for block in 0..config.duration_ms / 10 {
        let audio = tone_block(config.sample_rate_hz, block);
        let info = encoder.encode(block * samples_per_block, &audio, max_bytes, &mut payload)?;
        if info.is_empty() {
            continue;
        }

        let primary_bytes = info
            .redundant
            .first()
            .map_or(info.encoded_bytes, |leaf| leaf.encoded_bytes);
        let unit = payload.split_to(info.encoded_bytes).freeze();
        let packet = Packet {
            sequence_number,
            timestamp: info.encoded_timestamp,
            payload: unit,
            primary_bytes,
        };
        sequence_number = sequence_number.wrapping_add(1);
        stats.units_sent += 1;
        stats.bytes_sent += info.encoded_bytes;

        if rng.gen_range(0..100u8) < config.loss_percent {
            stats.units_lost += 1;
            debug!(seq = packet.sequence_number, "Dropping unit in transit");
            continue;
        }
        if tx.blocking_send(packet).is_err() {
            bail!("receiver stopped early");
        }
    }
    Ok(stats)
}

/// Run one loopback session: encode a tone, drop units at random, decode
/// what arrives, and report.
pub async fn run(config: &SessionConfig) -> Result<LoopbackReport> {
    config.check()?;
    let inst = config.codec_inst();
    let mut owner = CodecOwner::new();
    owner.set_encoders(&inst, config.red_payload_type)?;

    let mut decoder: Box<dyn AudioDecoder> = if inst.is_named("isac") {
        Box::new(owner.take_isac_decoder()?)
    } else {
        create_audio_decoder(pcm_decoder_kind(config.sample_rate_hz)?, None)?
    };
    let store = owner.bandwidth_info().clone();

    info!(
        codec = %inst.payload_name,
        sample_rate_hz = config.sample_rate_hz,
        adaptive = inst.rate.is_none(),
        loss_percent = config.loss_percent,
        "Starting loopback session"
    );

    let (tx, mut rx) = mpsc::channel::<Packet>(64);
    let sender_config = config.clone();
    let sender = tokio::task::spawn_blocking(move || send_loop(owner, tx, sender_config));

    let sample_rate_hz = config.sample_rate_hz;
    let receiver = tokio::spawn(async move {
        let mut decoded = Vec::new();
        let mut units_decoded = 0usize;
        let mut samples_concealed = 0usize;
        let mut units_recovered = 0usize;
        let mut expected_seq: Option<u16> = None;

        while let Some(packet) = rx.recv().await {
            let (primary, secondary) = packet.payload.split_at(packet.primary_bytes);
            if let Some(expected) = expected_seq {
                let missing = packet.sequence_number.wrapping_sub(expected) as usize;
                // The unit just before this one travels again as its secondary.
                let recoverable = usize::from(missing > 0 && !secondary.is_empty());
                if missing > recoverable {
                    samples_concealed += decoder.decode_plc(missing - recoverable, &mut decoded);
                }
                if recoverable > 0 {
                    decoder.decode_redundant(secondary, sample_rate_hz, &mut decoded)?;
                    units_recovered += 1;
                }
            }
            expected_seq = Some(packet.sequence_number.wrapping_add(1));

            decoder.incoming_packet(
                primary,
                packet.sequence_number,
                packet.timestamp,
                packet.timestamp,
            )?;
            decoder.decode(primary, sample_rate_hz, &mut decoded)?;
            units_decoded += 1;
        }
        Ok::<_, anyhow::Error>(ReceiveStats {
            units_decoded,
            samples_decoded: decoded.len() - samples_concealed,
            samples_concealed,
            units_recovered,
        })
    });

    let stats = sender.await??;
    let received = receiver.await??;

    Ok(LoopbackReport {
        units_sent: stats.units_sent,
        units_lost: stats.units_lost,
        bytes_sent: stats.bytes_sent,
        units_decoded: received.units_decoded,
        samples_decoded: received.samples_decoded,
        samples_concealed: received.samples_concealed,
        units_recovered: received.units_recovered,
        estimate: store.get(),
    })
}
