use anyhow::Result;
use image::{codecs::jpeg::JpegEncoder, RgbImage};

use super::DetectionError;

/// A live video source. Implementations keep capturing on their own and
/// expose the most recent frame, the way a `<video>` element does.
pub trait FrameSource: Send {
    /// The newest frame, or `None` while the device has nothing to show yet.
    fn latest(&mut self) -> Option<RgbImage>;

    /// Releases the device. Must be idempotent; dropping the source also stops it.
    fn stop(&mut self);
}

/// Grants access to a camera. Denial is reported as [`DetectionError::Camera`].
pub trait CameraProvider: Send + Sync + 'static {
    fn open(&self) -> Result<Box<dyn FrameSource>, DetectionError>;
}

/// Compresses a frame at its native size. A frame the encoder rejects
/// (for example a zero-sized one) is an error the caller drops.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    if frame.width() == 0 || frame.height() == 0 {
        anyhow::bail!("frame has no pixels");
    }
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode_image(frame)?;
    Ok(out)
}

/// Stands in when the build has no camera backend; every open is denied.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

impl CameraProvider for NoCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, DetectionError> {
        Err(DetectionError::Camera(
            "built without camera support".to_string(),
        ))
    }
}

#[cfg(feature = "camera")]
pub use native::NativeCamera;

#[cfg(feature = "camera")]
mod native {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc, Arc, Mutex,
        },
        thread::{self, JoinHandle},
        time::Duration,
    };

    use image::RgbImage;
    use log::{info, warn};
    use nokhwa::{
        pixel_format::RgbFormat,
        utils::{CameraIndex, RequestedFormat, RequestedFormatType},
        Camera,
    };

    use super::{CameraProvider, DetectionError, FrameSource};

    /// Webcam access through `nokhwa`. The camera handle is `!Send`, so it
    /// lives on a dedicated thread that publishes the latest decoded frame.
    pub struct NativeCamera {
        index: u32,
    }

    impl NativeCamera {
        pub fn new(index: u32) -> Self {
            Self { index }
        }
    }

    impl CameraProvider for NativeCamera {
        fn open(&self) -> Result<Box<dyn FrameSource>, DetectionError> {
            let index = self.index;
            let latest: Arc<Mutex<Option<RgbImage>>> = Arc::new(Mutex::new(None));
            let running = Arc::new(AtomicBool::new(true));
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

            let thread_latest = Arc::clone(&latest);
            let thread_running = Arc::clone(&running);
            let handle = thread::Builder::new()
                .name("camera-capture".to_string())
                .spawn(move || {
                    let requested = RequestedFormat::new::<RgbFormat>(
                        RequestedFormatType::AbsoluteHighestFrameRate,
                    );
                    let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
                        Ok(camera) => camera,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err.to_string()));
                            return;
                        }
                    };
                    if let Err(err) = camera.open_stream() {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return;
                    }

                    let resolution = camera.resolution();
                    info!(
                        "camera {index} streaming at {}x{}",
                        resolution.width(),
                        resolution.height()
                    );
                    let _ = ready_tx.send(Ok(()));

                    while thread_running.load(Ordering::SeqCst) {
                        let decoded = camera
                            .frame()
                            .and_then(|buffer| buffer.decode_image::<RgbFormat>());
                        match decoded {
                            Ok(image) => {
                                let (width, height) = (image.width(), image.height());
                                if let Some(frame) =
                                    RgbImage::from_raw(width, height, image.into_raw())
                                {
                                    if let Ok(mut slot) = thread_latest.lock() {
                                        *slot = Some(frame);
                                    }
                                }
                            }
                            Err(err) => {
                                warn!("camera frame read failed: {err}");
                                thread::sleep(Duration::from_millis(10));
                            }
                        }
                    }

                    if let Err(err) = camera.stop_stream() {
                        warn!("failed to stop camera stream: {err}");
                    }
                })
                .map_err(|err| DetectionError::Camera(err.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Box::new(NativeFrames {
                    latest,
                    running,
                    handle: Some(handle),
                })),
                Ok(Err(reason)) => {
                    let _ = handle.join();
                    Err(DetectionError::Camera(reason))
                }
                Err(_) => Err(DetectionError::Camera("capture thread exited".into())),
            }
        }
    }

    struct NativeFrames {
        latest: Arc<Mutex<Option<RgbImage>>>,
        running: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl FrameSource for NativeFrames {
        fn latest(&mut self) -> Option<RgbImage> {
            self.latest.lock().ok().and_then(|slot| slot.clone())
        }

        fn stop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    impl Drop for NativeFrames {
        fn drop(&mut self) {
            self.stop();
        }
    }
}
