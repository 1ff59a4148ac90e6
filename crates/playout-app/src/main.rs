//! Playout channel demo
//!
//! Feeds a moving test pattern through a frame consumer device into a
//! stats output and, with `--gpu`, a GPU upload output.
//!
//! Usage: `playout [FORMAT] [SECONDS] [--gpu]`

mod outputs;

use anyhow::{bail, Context, Result};
use outputs::{GpuUploadOutput, StatsOutput};
use playout_consumer::{frame_channel, DeviceConfig, FrameConsumer, FrameConsumerDevice, FrameSender};
use playout_core::{FrameBuffer, VideoFormatDesc};
use playout_gpu::{GpuContext, GpuRequirements, WgpuBackend};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

struct Options {
    format: VideoFormatDesc,
    duration: Duration,
    gpu: bool,
}

fn parse_args() -> Result<Options> {
    let mut format = VideoFormatDesc::default();
    let mut duration = Duration::from_secs(5);
    let mut gpu = false;
    let mut positional = 0;

    for arg in std::env::args().skip(1) {
        if arg == "--gpu" {
            gpu = true;
            continue;
        }
        match positional {
            0 => {
                format = match VideoFormatDesc::by_name(&arg) {
                    Some(format) => format,
                    None => {
                        let known: Vec<String> =
                            VideoFormatDesc::presets().into_iter().map(|f| f.name).collect();
                        bail!("unknown video format '{arg}', expected one of {}", known.join(", "));
                    }
                };
            }
            1 => {
                let seconds: f64 = arg
                    .parse()
                    .with_context(|| format!("invalid duration '{arg}'"))?;
                duration = Duration::try_from_secs_f64(seconds)
                    .with_context(|| format!("invalid duration '{arg}'"))?;
            }
            _ => bail!("unexpected argument '{arg}'"),
        }
        positional += 1;
    }

    Ok(Options {
        format,
        duration,
        gpu,
    })
}

/// Push test pattern frames until the device stops receiving.
/// Returns the number of frames delivered.
fn produce(mut tx: FrameSender, width: u32, height: u32) -> u64 {
    let mut produced = 0u64;
    loop {
        // scroll the bars by 4 pixels per frame
        let phase = (produced * 4 % width.max(1) as u64) as u32;
        if tx.push(FrameBuffer::test_pattern(width, height, phase)).is_err() {
            return produced;
        }
        produced += 1;
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = parse_args()?;
    info!(
        format = %options.format.name,
        fps = %options.format.frame_rate,
        seconds = options.duration.as_secs_f64(),
        gpu = options.gpu,
        "Playout demo starting..."
    );

    let mut consumers: Vec<Box<dyn FrameConsumer>> = vec![Box::new(StatsOutput::new())];
    if options.gpu {
        let requirements = GpuRequirements::for_format(&options.format);
        let context =
            GpuContext::open_blocking(&requirements).context("GPU requested but unavailable")?;
        info!(adapter = %context.adapter_info().name, "GPU ready");
        let backend = Arc::new(WgpuBackend::from_context(&context));
        consumers.push(Box::new(GpuUploadOutput::new(backend, &options.format)?));
    }

    let (tx, source) = frame_channel(2);
    let (width, height) = (options.format.width, options.format.height);
    let producer = std::thread::Builder::new()
        .name("test-pattern".into())
        .spawn(move || produce(tx, width, height))?;

    let device = FrameConsumerDevice::new(source, DeviceConfig::new(options.format.clone()), consumers)?;
    let stats = device.stats_handle();

    let deadline = Instant::now() + options.duration;
    while Instant::now() < deadline && device.is_running() {
        std::thread::sleep(Duration::from_millis(50));
    }
    device.shutdown()?;

    let produced = match producer.join() {
        Ok(produced) => produced,
        Err(_) => bail!("test pattern producer panicked"),
    };
    info!(
        produced,
        ticks = stats.ticks(),
        dispatched = stats.frames_dispatched(),
        removed = stats.consumers_removed(),
        "Playout demo finished"
    );
    Ok(())
}
