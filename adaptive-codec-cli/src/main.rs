//! Adaptive codec demo harness

use adaptive_codec_core::platform;
use adaptive_codec_core::{DecoderKind, PoolConfig};
use adaptive_codec_engines::{IsacEngine, IsacFix, IsacFloat};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod loopback;
mod session;
mod video;

use session::SessionConfig;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a tone, pass it through a lossy channel and decode it
    Loopback {
        /// JSON session file; flags override its values
        #[arg(long, env = "ACODEC_CONFIG")]
        config: Option<PathBuf>,

        /// Payload name (isac or l16)
        #[arg(long)]
        codec: Option<String>,

        /// Session length in milliseconds
        #[arg(long)]
        duration_ms: Option<u32>,

        /// Percentage of units dropped in transit
        #[arg(long)]
        loss_percent: Option<u8>,

        /// Let the encoder follow the bandwidth estimate
        #[arg(long)]
        adaptive: bool,

        /// Input sample rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Fixed bit rate in bits per second
        #[arg(long)]
        bit_rate: Option<u32>,

        /// Packet duration in milliseconds
        #[arg(long)]
        frame_ms: Option<u32>,

        /// Seed for the loss pattern
        #[arg(long)]
        seed: Option<u64>,

        /// Enable copy redundancy with this payload type
        #[arg(long)]
        red: Option<u8>,
    },

    /// Decode synthetic video through the buffer pool
    Video {
        /// JSON session file; its pool settings are used
        #[arg(long, env = "ACODEC_CONFIG")]
        config: Option<PathBuf>,

        /// Frames to encode and decode
        #[arg(long, default_value = "120")]
        frames: u64,

        #[arg(long, default_value = "320")]
        width: u32,

        #[arg(long, default_value = "240")]
        height: u32,

        /// Decoded frames kept alive, like a render queue
        #[arg(long, default_value = "3")]
        hold: usize,
    },

    /// Show engines and decoders
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("acodec=info,adaptive_codec_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    platform::ensure_initialized();

    match cli.command {
        Commands::Loopback {
            config,
            codec,
            duration_ms,
            loss_percent,
            adaptive,
            sample_rate,
            bit_rate,
            frame_ms,
            seed,
            red,
        } => {
            let mut session = match config {
                Some(path) => SessionConfig::load(&path)?,
                None => SessionConfig::default(),
            };
            if let Some(codec) = codec {
                session.codec = codec;
            }
            if let Some(duration_ms) = duration_ms {
                session.duration_ms = duration_ms;
            }
            if let Some(loss_percent) = loss_percent {
                session.loss_percent = loss_percent;
            }
            if let Some(sample_rate) = sample_rate {
                session.sample_rate_hz = sample_rate;
            }
            if let Some(frame_ms) = frame_ms {
                session.frame_ms = frame_ms;
            }
            if bit_rate.is_some() {
                session.bit_rate = bit_rate;
            }
            if adaptive {
                session.bit_rate = None;
            }
            if seed.is_some() {
                session.seed = seed;
            }
            if red.is_some() {
                session.red_payload_type = red;
            }
            handle_loopback(&session).await?;
        }
        Commands::Video {
            config,
            frames,
            width,
            height,
            hold,
        } => {
            let session = match config {
                Some(path) => SessionConfig::load(&path)?,
                None => SessionConfig::default(),
            };
            handle_video(frames, width, height, hold, session.pool)?;
        }
        Commands::Status => {
            handle_status();
        }
    }

    platform::uninitialize()?;
    Ok(())
}

async fn handle_loopback(session: &SessionConfig) -> Result<()> {
    println!(
        "🔁 Loopback: {} @ {} Hz, {} ms packets, {}{}",
        session.codec,
        session.sample_rate_hz,
        session.frame_ms,
        match session.bit_rate {
            Some(bps) => format!("{bps} bps"),
            None => "adaptive".to_string(),
        },
        if session.red_payload_type.is_some() {
            ", RED"
        } else {
            ""
        }
    );

    let report = loopback::run(session).await?;

    println!("✅ Units sent:      {}", report.units_sent);
    println!("   Units lost:      {}", report.units_lost);
    println!("   Bytes sent:      {}", report.bytes_sent);
    println!("   Units decoded:   {}", report.units_decoded);
    println!("   Samples decoded: {}", report.samples_decoded);
    println!("   Concealed:       {}", report.samples_concealed);
    if session.red_payload_type.is_some() {
        println!("   Recovered units: {}", report.units_recovered);
    }
    if report.estimate.in_use {
        println!(
            "📶 Estimate: {} bps, {} ms delay, {}% loss",
            report.estimate.send_bw_avg_bps,
            report.estimate.send_max_delay_avg_ms,
            report.estimate.loss_percent
        );
    } else {
        println!("📶 Estimate: not in use");
    }
    Ok(())
}

fn handle_video(frames: u64, width: u32, height: u32, hold: usize, pool: PoolConfig) -> Result<()> {
    println!("🎞️  Video: {frames} frames at {width}x{height}, holding {hold}");
    let report = video::run(frames, width, height, hold, pool)?;

    println!("✅ Frames decoded:  {}", report.frames_decoded);
    println!("   Peak in use:     {}", report.max_in_use);
    println!("   In use at end:   {}", report.final_in_use);
    println!("   Pooled buffers:  {}", report.buffers_pooled);
    if report.buffers_pooled > pool.max_num_buffers {
        println!(
            "⚠️  Pool grew past its ceiling of {}; hold fewer frames",
            pool.max_num_buffers
        );
    }
    Ok(())
}

fn handle_status() {
    let context = platform::ensure_initialized();
    println!("📊 Adaptive Codec Status");
    println!("========================");
    println!("Platform: {}", context.application_name);
    println!();
    println!("Speech engines (simulated):");
    print_engine::<IsacFloat>();
    print_engine::<IsacFix>();
    println!();
    println!("Decoders:");
    for kind in DecoderKind::ALL {
        println!("  {:<16} {} Hz, {} ch", format!("{kind:?}"), kind.sample_rate_hz(), kind.channels());
    }
    println!();
    println!("Available commands:");
    println!("  acodec loopback [options]  - Speech loopback over a lossy channel");
    println!("  acodec video [options]     - Pooled video decode");
    println!("  acodec status              - Show this status");
}

fn print_engine<E: IsacEngine>() {
    println!(
        "  {:<8} {}",
        E::NAME,
        if E::HAS_SUPER_WIDEBAND {
            "16/32/48 kHz"
        } else {
            "16 kHz"
        }
    );
}
