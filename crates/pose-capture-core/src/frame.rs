use glob::Pattern;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::CameraConfig;
use crate::error::Error;

/// One camera frame in RGB channel order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Position in the stream, starting at 0.
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    /// All-black frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height), 0)
    }
}

/// Anything that yields frames. The device is released when the source is dropped.
pub trait FrameSource {
    fn describe(&self) -> String;

    /// Next frame. Any error ends the capture session.
    fn read_frame(&mut self) -> Result<Frame, Error>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read_frame(&mut self) -> Result<Frame, Error> {
        (**self).read_frame()
    }
}

/// Replay source when `replay_dir` is set, otherwise the capture device.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, Error> {
    if let Some(dir) = &config.replay_dir {
        return Ok(Box::new(ReplaySource::open(dir)?));
    }
    open_camera(config)
}

#[cfg(target_os = "linux")]
fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>, Error> {
    Ok(Box::new(v4l_camera::V4lCamera::open(
        config.device_index,
        config.width,
        config.height,
    )?))
}

#[cfg(not(target_os = "linux"))]
fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>, Error> {
    Err(Error::Camera(format!(
        "no capture backend for device {} on this platform; set camera.replay_dir",
        config.device_index
    )))
}

#[cfg(target_os = "linux")]
pub mod v4l_camera {
    use super::{Frame, FrameSource};
    use crate::error::Error;
    use tracing::{debug, info};
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;
    use v4l::prelude::*;
    use v4l::video::Capture;
    use v4l::FourCC;

    const MJPEG: &[u8; 4] = b"MJPG";
    const BUFFER_COUNT: u32 = 4;

    /// Memory-mapped V4L2 capture of MJPEG frames from `/dev/video<N>`.
    pub struct V4lCamera {
        device_index: usize,
        stream: MmapStream<'static>,
        _device: Device,
        sequence: u64,
    }

    impl V4lCamera {
        pub fn open(device_index: usize, width: u32, height: u32) -> Result<Self, Error> {
            let device = Device::new(device_index).map_err(|err| {
                Error::Camera(format!("cannot open /dev/video{}: {}", device_index, err))
            })?;

            let mut format = device.format()?;
            format.width = width;
            format.height = height;
            format.fourcc = FourCC::new(MJPEG);
            let format = device.set_format(&format)?;
            if format.fourcc != FourCC::new(MJPEG) {
                return Err(Error::Camera(format!(
                    "/dev/video{} does not deliver MJPEG (got {})",
                    device_index, format.fourcc
                )));
            }
            info!(
                "Opened /dev/video{} at {}x{} {}",
                device_index, format.width, format.height, format.fourcc
            );

            let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
                .map_err(|err| {
                    Error::Camera(format!(
                        "cannot start streaming on /dev/video{}: {}",
                        device_index, err
                    ))
                })?;

            Ok(Self {
                device_index,
                stream,
                _device: device,
                sequence: 0,
            })
        }
    }

    impl FrameSource for V4lCamera {
        fn describe(&self) -> String {
            format!("/dev/video{}", self.device_index)
        }

        fn read_frame(&mut self) -> Result<Frame, Error> {
            let (buf, meta) = self.stream.next().map_err(|err| {
                Error::Camera(format!(
                    "failed to read frame from /dev/video{}: {}",
                    self.device_index, err
                ))
            })?;
            let used = (meta.bytesused as usize).min(buf.len());
            let image = image::load_from_memory_with_format(&buf[..used], image::ImageFormat::Jpeg)?
                .to_rgb8();
            debug!("Frame {} ({} bytes)", meta.sequence, used);

            let frame = Frame::new(image, self.sequence);
            self.sequence += 1;
            Ok(frame)
        }
    }
}

/// Replays the images of a folder in name order, then reports end of stream as
/// a read failure.
pub struct ReplaySource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    position: usize,
}

impl ReplaySource {
    pub fn open(dir: &Path) -> Result<Self, Error> {
        if !dir.is_dir() {
            return Err(Error::Camera(format!(
                "replay folder {} does not exist",
                dir.display()
            )));
        }

        let base = Pattern::escape(&dir.to_string_lossy());
        let mut paths = Vec::new();
        for ext in ["jpg", "jpeg", "png"] {
            let pattern = format!("{}/*.{}", base, ext);
            let entries =
                glob::glob(&pattern).map_err(|err| Error::Other(err.to_string()))?;
            for entry in entries {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(err) => error!("Skipping unreadable replay entry: {}", err),
                }
            }
        }
        paths.sort();

        let source = Self {
            dir: dir.to_path_buf(),
            paths,
            position: 0,
        };
        if source.is_empty() {
            return Err(Error::Camera(format!(
                "replay folder {} holds no images",
                dir.display()
            )));
        }
        info!("Replaying {} images from {}", source.len(), dir.display());
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ReplaySource {
    fn describe(&self) -> String {
        format!("replay of {} ({} images)", self.dir.display(), self.len())
    }

    fn read_frame(&mut self) -> Result<Frame, Error> {
        let path = self.paths.get(self.position).ok_or_else(|| {
            Error::Camera(format!("replay of {} exhausted", self.dir.display()))
        })?;
        let image = image::open(path)?.to_rgb8();
        let frame = Frame::new(image, self.position as u64);
        self.position += 1;
        Ok(frame)
    }
}
