//! End-to-end distribution through a running frame consumer device.

use crate::support::{format, frames, Recorder};
use playout_consumer::{
    frame_channel, ConsumerId, DeviceConfig, DispatchMode, FrameConsumer, FrameConsumerDevice,
    FrameDistributor,
};
use playout_core::{Frame, FrameBuffer, FrameRate, PixelFormat};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn fast_config() -> DeviceConfig {
    DeviceConfig::new(format(FrameRate::new(1000, 1)))
}

#[test]
fn heterogeneous_depths_start_staggered() {
    let (shallow, shallow_rec) = Recorder::new("screen", 0);
    let (mid, mid_rec) = Recorder::new("file", 2);
    let (deep, deep_rec) = Recorder::new("card", 4);

    let (mut tx, source) = frame_channel(8);
    let device = FrameConsumerDevice::new(
        source,
        fast_config(),
        vec![shallow.boxed(), mid.boxed(), deep.boxed()],
    )
    .unwrap();
    assert_eq!(device.max_depth(), 4);

    tx.push_blank(5).unwrap();
    drop(tx);
    device.join().unwrap();

    assert_eq!(frames(&deep_rec), vec![0, 1, 2, 3, 4]);
    assert_eq!(frames(&mid_rec), vec![2, 3, 4]);
    assert_eq!(frames(&shallow_rec), vec![4]);
}

#[test]
fn faulting_consumer_is_isolated() {
    let (steady, steady_rec) = Recorder::new("steady", 1);
    let (flaky, flaky_rec) = Recorder::new("flaky", 1);
    let flaky = flaky.failing_on_sync(3);

    let (mut tx, source) = frame_channel(16);
    let device =
        FrameConsumerDevice::new(source, fast_config(), vec![steady.boxed(), flaky.boxed()])
            .unwrap();
    let stats = device.stats_handle();

    tx.push_blank(8).unwrap();
    drop(tx);
    device.join().unwrap();

    // frame 2 was sent before the failing synchronize; nothing after it
    assert_eq!(frames(&flaky_rec), vec![0, 1, 2]);
    assert_eq!(frames(&steady_rec), (0..8).collect::<Vec<_>>());
    assert_eq!(stats.consumers_removed(), 1);
    assert_eq!(stats.active_consumers(), 1);
    assert_eq!(stats.ticks(), 8);
}

#[test]
fn device_goes_idle_after_last_removal() {
    let (a, a_rec) = Recorder::new("a", 0);
    let (b, b_rec) = Recorder::new("b", 0);

    let (mut tx, source) = frame_channel(32);
    let device = FrameConsumerDevice::new(
        source,
        fast_config(),
        vec![a.failing_on_sync(2).boxed(), b.failing_on_sync(4).boxed()],
    )
    .unwrap();
    let stats = device.stats_handle();

    tx.push_blank(20).unwrap();
    device.join().unwrap();

    assert!(!stats.is_running());
    assert_eq!(stats.ticks(), 4);
    assert_eq!(stats.consumers_removed(), 2);
    assert_eq!(frames(&a_rec), vec![0, 1]);
    assert_eq!(frames(&b_rec), vec![0, 1, 2, 3]);
    assert_eq!(tx.queued(), 16);
}

#[test]
fn latency_aligned_device_delivers_older_frames_to_shallow_consumers() {
    let (shallow, shallow_rec) = Recorder::new("screen", 1);
    let (deep, deep_rec) = Recorder::new("card", 3);

    let (mut tx, source) = frame_channel(8);
    let config = fast_config().with_dispatch(DispatchMode::LatencyAligned);
    let device =
        FrameConsumerDevice::new(source, config, vec![shallow.boxed(), deep.boxed()]).unwrap();

    tx.push_blank(6).unwrap();
    drop(tx);
    device.join().unwrap();

    assert_eq!(frames(&deep_rec), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(frames(&shallow_rec), vec![0, 1, 2, 3]);
}

#[test]
fn shutdown_does_not_wait_for_a_stalled_producer() {
    let (screen, screen_rec) = Recorder::new("screen", 0);
    let (mut tx, source) = frame_channel(4);
    let device = FrameConsumerDevice::new(source, fast_config(), vec![screen.boxed()]).unwrap();

    tx.push_blank(2).unwrap();
    while device.stats().ticks() < 2 {
        std::thread::yield_now();
    }

    // tx stays alive and silent from here on
    let started = Instant::now();
    device.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(frames(&screen_rec), vec![0, 1]);
    assert!(tx.push_blank(1).is_err());
}

fn blank(n: u64) -> Frame {
    Frame::new(n, FrameBuffer::new(1, 1, PixelFormat::Gray8))
}

proptest! {
    #[test]
    fn history_stays_bounded_and_delivery_is_gapless(
        depths in prop::collection::vec(0usize..6, 1..5),
        ticks in 0u64..40,
        aligned in any::<bool>(),
        fault in prop::option::of((0usize..5, 1usize..20)),
    ) {
        let mode = if aligned { DispatchMode::LatencyAligned } else { DispatchMode::Latest };
        let max_depth = *depths.iter().max().unwrap();

        let mut recordings = Vec::new();
        let mut consumers: Vec<Box<dyn FrameConsumer>> = Vec::new();
        for (i, depth) in depths.iter().enumerate() {
            let (mut recorder, recording) = Recorder::new(&format!("c{i}"), *depth);
            if let Some((who, call)) = fault {
                if who == i {
                    recorder = recorder.failing_on_sync(call);
                }
            }
            consumers.push(recorder.boxed());
            recordings.push(recording);
        }

        let mut distributor = FrameDistributor::new(consumers, mode).unwrap();
        let mut removed_at = vec![None; depths.len()];
        for n in 0..ticks {
            let report = distributor.process(blank(n));
            prop_assert!(distributor.history().len() <= max_depth);
            for ConsumerId(id) in report.removed {
                removed_at[id] = Some(n);
            }
        }

        for (i, depth) in depths.iter().enumerate() {
            let offset = (max_depth - depth) as u64;
            let got = frames(&recordings[i]);
            let last_tick = removed_at[i].map_or(ticks, |t| t + 1);
            let expected: Vec<u64> = match mode {
                DispatchMode::Latest => (offset..last_tick).collect(),
                DispatchMode::LatencyAligned => (0..last_tick.saturating_sub(offset)).collect(),
            };
            prop_assert_eq!(got, expected);
        }
    }
}
