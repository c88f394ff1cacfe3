//! Bandwidth estimate flow from a call's decoder to its encoder

use adaptive_codec_core::{
    AudioDecoder, AudioDecoderIsac, AudioEncoder, AudioEncoderIsac, BandwidthInfo, CodecInst,
    CodecOwner, IsacConfig, LockedBandwidthInfo, MAX_ENCODED_BYTES,
};
use bytes::BytesMut;
use std::sync::mpsc;
use std::thread;

/// Encode `blocks` 10 ms blocks, returning (timestamp, payload) per unit.
fn encode_stream(encoder: &mut dyn AudioEncoder, blocks: u32) -> Vec<(u32, Vec<u8>)> {
    let samples = (encoder.sample_rate_hz() / 100) as usize;
    let audio = vec![1200i16; samples];
    let mut payload = BytesMut::new();
    let mut units = Vec::new();
    for block in 0..blocks {
        let info = encoder
            .encode(block * samples as u32, &audio, MAX_ENCODED_BYTES, &mut payload)
            .unwrap();
        if !info.is_empty() {
            units.push((info.encoded_timestamp, payload.split().to_vec()));
        }
    }
    units
}

#[test]
fn test_decoder_thread_feeds_encoder_thread() {
    let store = LockedBandwidthInfo::shared();

    // Far end sends 30 ms packets of 45 bytes: 12 kbps.
    let (tx, rx) = mpsc::channel::<(u16, u32, Vec<u8>)>();
    let decoder_store = store.clone();
    let decoder_thread = thread::spawn(move || {
        let mut decoder = AudioDecoderIsac::new(Some(decoder_store)).unwrap();
        for (seq, ts, payload) in rx {
            decoder.incoming_packet(&payload, seq, ts, ts).unwrap();
        }
    });
    for seq in 0..20u16 {
        let ts = u32::from(seq) * 480;
        tx.send((seq, ts, vec![3u8; 45])).unwrap();
    }
    drop(tx);
    decoder_thread.join().unwrap();

    let estimate = store.get();
    assert!(estimate.in_use);
    assert_eq!(estimate.send_bw_avg_bps, 12000);

    let encoder_store = store.clone();
    let encoder_thread = thread::spawn(move || {
        let mut encoder = AudioEncoderIsac::new(IsacConfig {
            adaptive_mode: true,
            bandwidth_info: Some(encoder_store),
            ..Default::default()
        })
        .unwrap();
        encode_stream(&mut encoder, 12)
    });
    let units = encoder_thread.join().unwrap();

    // A 12 kbps estimate moves a wideband encoder to 60 ms packets.
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].0, 0);
    assert_eq!(units[1].0, 960);
    assert_eq!(units[0].1.len(), 90);
}

#[test]
fn test_codec_owner_round_trip() {
    let mut owner = CodecOwner::new();
    owner.set_encoders(&CodecInst::isac_wideband(), None).unwrap();

    // Learn a low-rate channel from the far end.
    {
        let decoder = owner.isac_decoder().unwrap();
        for seq in 0..10u16 {
            let ts = u32::from(seq) * 960;
            decoder.incoming_packet(&[6u8; 90], seq, ts, ts).unwrap();
        }
    }
    let estimate = owner.bandwidth_info().get();
    assert_eq!(estimate.send_bw_avg_bps, 12000);

    let encoder = owner.encoder_mut().unwrap();
    let units = encode_stream(encoder, 6);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].1.len(), 90);

    let mut decoder = owner.take_isac_decoder().unwrap();
    let mut decoded = Vec::new();
    let (samples, _) = decoder.decode(&units[0].1, 16000, &mut decoded).unwrap();
    assert_eq!(samples, 960);
}

#[test]
fn test_unused_estimate_keeps_configured_frame_size() {
    let store = LockedBandwidthInfo::shared();
    store.set(BandwidthInfo::default());
    let mut encoder = AudioEncoderIsac::new(IsacConfig {
        adaptive_mode: true,
        bandwidth_info: Some(store),
        ..Default::default()
    })
    .unwrap();
    let units = encode_stream(&mut encoder, 6);
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].1.len(), 120);
}
