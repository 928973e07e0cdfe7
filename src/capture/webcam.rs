use super::CaptureSource;
use crate::frame::Frame;
use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::thread::{self, JoinHandle};

enum DeviceRequest {
    Frame(Sender<Result<Option<Frame>>>),
    Close,
}

struct DeviceThread {
    index: u32,
    requests: Sender<DeviceRequest>,
    worker: JoinHandle<()>,
}

/// Webcam source backed by `nokhwa`.
///
/// The camera handle lives on its own device thread and is driven by
/// request messages, so this wrapper can move between threads.
#[derive(Default)]
pub struct WebcamCapture {
    device: Option<DeviceThread>,
}

impl WebcamCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

fn open_camera(device_index: u32) -> Result<Camera> {
    tracing::info!("Initializing webcam {}", device_index);

    let index = CameraIndex::Index(device_index);
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

    let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

    camera
        .open_stream()
        .context("Failed to open camera stream")?;

    let format = camera.camera_format();
    tracing::info!(
        "Webcam initialized at {}x{} @ {} fps",
        format.width(),
        format.height(),
        format.frame_rate()
    );

    Ok(camera)
}

fn grab(camera: &mut Camera) -> Result<Option<Frame>> {
    let buffer = camera.frame().context("Failed to capture frame")?;
    if buffer.buffer().is_empty() {
        return Ok(None);
    }

    let decoded = buffer
        .decode_image::<RgbFormat>()
        .context("Failed to decode frame")?;
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    if width == 0 || height == 0 {
        return Ok(None);
    }

    let frame = Frame::from_rgb_bytes(width, height, decoded.as_raw())?;
    Ok(Some(frame))
}

fn device_loop(device_index: u32, ready: Sender<Result<()>>, requests: Receiver<DeviceRequest>) {
    let mut camera = match open_camera(device_index) {
        Ok(camera) => {
            let _ = ready.send(Ok(()));
            camera
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    for request in requests {
        match request {
            DeviceRequest::Frame(reply) => {
                let _ = reply.send(grab(&mut camera));
            }
            DeviceRequest::Close => break,
        }
    }

    if let Err(err) = camera.stop_stream() {
        tracing::warn!("Failed to stop webcam {} stream: {}", device_index, err);
    }
    tracing::info!("Webcam {} released", device_index);
}

impl CaptureSource for WebcamCapture {
    fn open(&mut self, device_index: u32) -> Result<()> {
        self.release();

        let (ready_tx, ready_rx) = bounded(1);
        let (requests, request_rx) = unbounded();
        let worker = thread::Builder::new()
            .name(format!("webcam-{device_index}"))
            .spawn(move || device_loop(device_index, ready_tx, request_rx))
            .context("Failed to spawn webcam thread")?;

        let opened = ready_rx
            .recv()
            .map_err(|_| anyhow!("webcam thread exited during startup"))
            .and_then(|result| result);
        if let Err(err) = opened {
            let _ = worker.join();
            return Err(err);
        }

        self.device = Some(DeviceThread {
            index: device_index,
            requests,
            worker,
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let Some(device) = &self.device else {
            bail!("webcam is not open");
        };

        let (reply_tx, reply_rx) = bounded(1);
        device
            .requests
            .send(DeviceRequest::Frame(reply_tx))
            .map_err(|_| anyhow!("webcam {} thread has stopped", device.index))?;
        reply_rx
            .recv()
            .map_err(|_| anyhow!("webcam {} thread dropped the request", device.index))?
    }

    fn release(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };
        let _ = device.requests.send(DeviceRequest::Close);
        if device.worker.join().is_err() {
            tracing::error!("Webcam {} thread panicked", device.index);
        }
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        self.release();
    }
}
