//! Bandwidth estimate shared between a decoder and an encoder
//!
//! The decoder half of a call learns about the channel from arriving packets;
//! the encoder half of the same call wants to steer its bit rate and frame
//! size by that knowledge. The two usually run on different threads, so the
//! estimate lives in a [`LockedBandwidthInfo`] that only ever hands out and
//! takes in copies.

use adaptive_codec_engines::BandwidthInfo;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to a bandwidth store
pub type SharedBandwidthInfo = Arc<LockedBandwidthInfo>;

/// Mutex-guarded canonical copy of the latest [`BandwidthInfo`].
#[derive(Debug, Default)]
pub struct LockedBandwidthInfo {
    info: Mutex<BandwidthInfo>,
}

impl LockedBandwidthInfo {
    /// Create a store holding the default (unused) estimate
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store and wrap it for sharing
    pub fn shared() -> SharedBandwidthInfo {
        Arc::new(Self::new())
    }

    /// Copy of the current estimate
    pub fn get(&self) -> BandwidthInfo {
        *self.info.lock()
    }

    /// Replace the current estimate
    pub fn set(&self, info: BandwidthInfo) {
        *self.info.lock() = info;
        tracing::trace!(
            in_use = info.in_use,
            send_bw_avg_bps = info.send_bw_avg_bps,
            loss_percent = info.loss_percent,
            "Bandwidth estimate updated"
        );
    }
}
