//! Software pacing and the clock tie-break, measured on a live device.

use crate::support::{format, Recorder, SharedRecording};
use playout_consumer::{frame_channel, DeviceConfig, FrameConsumerDevice, SyncMode};
use playout_core::FrameRate;
use std::time::{Duration, Instant};

fn intervals(recording: &SharedRecording) -> Vec<Duration> {
    let recording = recording.lock();
    recording
        .sent_at
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect()
}

#[test]
fn ready_consumers_are_paced_to_the_frame_rate() {
    let (screen, recording) = Recorder::new("screen", 0);
    let config = DeviceConfig::new(format(FrameRate::new(50, 1)));

    let (mut tx, source) = frame_channel(16);
    tx.push_blank(6).unwrap();
    drop(tx);
    let device = FrameConsumerDevice::new(source, config, vec![screen.boxed()]).unwrap();
    device.join().unwrap();

    // 20 ms period, 5 ms headroom: at least 15 ms between frames
    let gaps = intervals(&recording);
    assert_eq!(gaps.len(), 5);
    for gap in gaps {
        assert!(gap >= Duration::from_millis(12), "frame interval {gap:?}");
    }
}

#[test]
fn zero_headroom_sleeps_the_full_period() {
    let (screen, recording) = Recorder::new("screen", 0);
    let config = DeviceConfig::new(format(FrameRate::new(50, 1)))
        .with_pacing_headroom(Duration::ZERO);

    let (mut tx, source) = frame_channel(8);
    tx.push_blank(4).unwrap();
    drop(tx);
    let device = FrameConsumerDevice::new(source, config, vec![screen.boxed()]).unwrap();
    device.join().unwrap();

    for gap in intervals(&recording) {
        assert!(gap >= Duration::from_millis(19), "frame interval {gap:?}");
    }
}

#[test]
fn one_clocked_consumer_suppresses_software_pacing() {
    let (screen, screen_rec) = Recorder::new("screen", 0);
    let (card, _card_rec) = Recorder::new("card", 0);
    let card = card.with_mode(SyncMode::Clock);
    // 200 ms period: ten paced frames would take close to two seconds
    let config = DeviceConfig::new(format(FrameRate::new(5, 1)));

    let (mut tx, source) = frame_channel(16);
    tx.push_blank(10).unwrap();
    drop(tx);

    let started = Instant::now();
    let device =
        FrameConsumerDevice::new(source, config, vec![screen.boxed(), card.boxed()]).unwrap();
    device.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(screen_rec.lock().frames.len(), 10);
}

#[test]
fn clocked_consumer_paces_once_it_is_gone() {
    let (screen, screen_rec) = Recorder::new("screen", 0);
    let (card, _card_rec) = Recorder::new("card", 0);
    let card = card.with_mode(SyncMode::Clock).failing_on_sync(2);
    let config = DeviceConfig::new(format(FrameRate::new(50, 1)));

    let (mut tx, source) = frame_channel(8);
    tx.push_blank(5).unwrap();
    drop(tx);
    let device =
        FrameConsumerDevice::new(source, config, vec![screen.boxed(), card.boxed()]).unwrap();
    device.join().unwrap();

    // tick 0 ran on the card's clock, tick 1 removed the card and slept
    let gaps = intervals(&screen_rec);
    assert_eq!(gaps.len(), 4);
    for gap in &gaps[1..] {
        assert!(*gap >= Duration::from_millis(12), "frame interval {gap:?}");
    }
}
