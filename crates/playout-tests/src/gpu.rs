//! Device buffers on the software backend, alone and behind a consumer.

use parking_lot::Mutex;
use playout_consumer::{frame_channel, DeviceConfig, FrameConsumer, FrameConsumerDevice, SyncMode};
use playout_core::{Frame, FrameBuffer, FrameRate, PlayoutError, Result, VideoFormatDesc};
use playout_gpu::{
    BackendOp, DeviceBuffer, DeviceBufferPool, HostBuffer, SoftwareBackend, SoftwareHostBuffer,
};
use std::sync::Arc;

#[test]
fn fresh_buffers_read_back_zeroed_for_every_stride() {
    let backend = Arc::new(SoftwareBackend::new());
    for stride in 1..=4 {
        let buffer = DeviceBuffer::new(Arc::clone(&backend), 5, 3, stride).unwrap();
        let texels = backend.read_texels(buffer.texture()).unwrap();
        assert_eq!(texels.len(), 5 * 3 * stride);
        assert!(texels.iter().all(|&b| b == 0), "stride {stride}");
    }
}

#[test]
fn invalid_strides_are_rejected() {
    let backend = Arc::new(SoftwareBackend::new());
    for stride in [0, 5, 16] {
        let err = DeviceBuffer::new(Arc::clone(&backend), 4, 4, stride).err().unwrap();
        assert!(matches!(err, PlayoutError::InvalidParameter(_)));
    }
    assert_eq!(backend.texture_count(), 0);
}

#[test]
fn fence_tracks_upload_completion() {
    let backend = Arc::new(SoftwareBackend::new());
    let mut buffer = DeviceBuffer::new(Arc::clone(&backend), 2, 2, 4).unwrap();
    assert!(buffer.ready());

    let mut host = SoftwareHostBuffer::new(buffer.memory_size());
    host.write(&[7; 16]).unwrap();
    buffer.begin_read(&mut host).unwrap();
    assert!(!host.is_mapped());
    assert!(!host.is_bound());
    assert!(!buffer.ready());

    assert_eq!(backend.complete_pending(), 1);
    assert!(buffer.ready());
    assert!(buffer.ready());
    assert_eq!(backend.read_texels(buffer.texture()).unwrap(), vec![7; 16]);
}

#[test]
fn test_pattern_survives_the_upload() {
    let backend = Arc::new(SoftwareBackend::new());
    let image = FrameBuffer::test_pattern(16, 4, 3);
    let packed = image.to_packed();

    let mut buffer = DeviceBuffer::new(Arc::clone(&backend), 16, 4, 4).unwrap();
    let mut host = SoftwareHostBuffer::new(packed.len());
    host.write(&packed).unwrap();
    buffer.begin_read(&mut host).unwrap();
    backend.complete_pending();

    assert_eq!(backend.read_texels(buffer.texture()).unwrap(), packed);
}

#[test]
fn failed_upload_leaves_previous_contents() {
    let backend = Arc::new(SoftwareBackend::new());
    let mut buffer = DeviceBuffer::new(Arc::clone(&backend), 2, 1, 1).unwrap();
    let mut host = SoftwareHostBuffer::new(2);
    host.write(&[9, 9]).unwrap();

    backend.fail_next(BackendOp::Upload);
    assert!(buffer.begin_read(&mut host).is_err());
    assert!(buffer.ready());
    assert_eq!(backend.read_texels(buffer.texture()).unwrap(), vec![0, 0]);
}

#[test]
fn pooled_buffers_are_reused_only_once_ready() {
    let backend = Arc::new(SoftwareBackend::new());
    let mut pool = DeviceBufferPool::new(Arc::clone(&backend), 1 << 20);

    let mut busy = pool.acquire(4, 4, 4).unwrap();
    let mut host = SoftwareHostBuffer::new(busy.memory_size());
    busy.begin_read(&mut host).unwrap();
    let busy_texture = busy.texture();
    pool.release(busy);

    let other = pool.acquire(4, 4, 4).unwrap();
    assert_ne!(other.texture(), busy_texture);
    pool.release(other);

    backend.complete_pending();
    let reused = pool.acquire(4, 4, 4).unwrap();
    assert_eq!(reused.texture(), busy_texture);
}

/// Output that uploads every frame it can to a device buffer, skipping
/// frames while the previous upload is still in flight.
struct UploadConsumer {
    backend: Arc<SoftwareBackend>,
    buffer: DeviceBuffer<SoftwareBackend>,
    host: SoftwareHostBuffer,
    uploaded: Arc<Mutex<Vec<u64>>>,
    complete_on_sync: bool,
}

impl UploadConsumer {
    fn new(
        backend: Arc<SoftwareBackend>,
        width: u32,
        height: u32,
        complete_on_sync: bool,
    ) -> Result<(Self, Arc<Mutex<Vec<u64>>>)> {
        let buffer = DeviceBuffer::new(Arc::clone(&backend), width, height, 4)?;
        let host = SoftwareHostBuffer::new(buffer.memory_size());
        let uploaded = Arc::new(Mutex::new(Vec::new()));
        let consumer = Self {
            backend,
            buffer,
            host,
            uploaded: Arc::clone(&uploaded),
            complete_on_sync,
        };
        Ok((consumer, uploaded))
    }
}

impl FrameConsumer for UploadConsumer {
    fn buffer_depth(&self) -> usize {
        1
    }

    fn send(&mut self, frame: &Frame) {
        if !self.buffer.ready() {
            return;
        }
        self.host.map();
        let uploaded = self
            .host
            .write(&frame.image().to_packed())
            .and_then(|()| self.buffer.begin_read(&mut self.host));
        if uploaded.is_ok() {
            self.uploaded.lock().push(frame.number());
        }
    }

    fn synchronize(&mut self) -> Result<SyncMode> {
        if self.complete_on_sync {
            self.backend.complete_pending();
        }
        Ok(SyncMode::Clock)
    }

    fn name(&self) -> &str {
        "upload"
    }
}

fn pattern_frames(count: u32) -> Vec<FrameBuffer> {
    (0..count).map(|i| FrameBuffer::test_pattern(8, 2, i)).collect()
}

#[test]
fn device_drives_uploads_through_a_consumer() {
    let backend = Arc::new(SoftwareBackend::new());
    let (upload, uploaded) = UploadConsumer::new(Arc::clone(&backend), 8, 2, true).unwrap();
    let texture = upload.buffer.texture();

    let (mut tx, source) = frame_channel(8);
    for image in pattern_frames(6) {
        tx.push(image).unwrap();
    }
    drop(tx);

    let format = VideoFormatDesc::new("test", 8, 2, FrameRate::new(1000, 1));
    let device =
        FrameConsumerDevice::new(source, DeviceConfig::new(format), vec![Box::new(upload)]).unwrap();
    device.join().unwrap();

    assert_eq!(*uploaded.lock(), vec![0, 1, 2, 3, 4, 5]);
    // the consumer was dropped with the worker; its texture is gone
    assert!(backend.read_texels(texture).is_err());
    assert_eq!(backend.texture_count(), 0);
}

#[test]
fn slow_device_makes_the_consumer_skip_frames() {
    let backend = Arc::new(SoftwareBackend::new());
    let (upload, uploaded) = UploadConsumer::new(Arc::clone(&backend), 8, 2, false).unwrap();

    let (mut tx, source) = frame_channel(8);
    for image in pattern_frames(4) {
        tx.push(image).unwrap();
    }
    drop(tx);

    let format = VideoFormatDesc::new("test", 8, 2, FrameRate::new(1000, 1));
    let device =
        FrameConsumerDevice::new(source, DeviceConfig::new(format), vec![Box::new(upload)]).unwrap();
    device.join().unwrap();

    // nothing completes the first upload, so every later frame is skipped
    assert_eq!(*uploaded.lock(), vec![0]);
    assert_eq!(backend.pending_uploads(), 1);
}
