use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{error, info, warn};

use super::{SourceFactory, VideoSource};
use crate::common::frame::RawFrame;
use crate::error::OpenError;

/// Real camera backend. Opening a device starts its stream; the stream is
/// stopped when the source is dropped.
pub struct NokhwaFactory {
    pub probe_limit: u32,
}

impl Default for NokhwaFactory {
    fn default() -> Self {
        Self { probe_limit: 10 }
    }
}

impl SourceFactory for NokhwaFactory {
    fn open(&self, index: u32) -> Result<Box<dyn VideoSource>, OpenError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            OpenError {
                index,
                reason: e.to_string(),
            }
        })?;
        camera.open_stream().map_err(|e| OpenError {
            index,
            reason: e.to_string(),
        })?;
        info!(index, format = %camera.camera_format(), "opened camera");
        Ok(Box::new(NokhwaSource { index, camera }))
    }

    fn probe_limit(&self) -> u32 {
        self.probe_limit
    }
}

pub struct NokhwaSource {
    index: u32,
    camera: Camera,
}

impl std::fmt::Debug for NokhwaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NokhwaSource")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl VideoSource for NokhwaSource {
    fn index(&self) -> u32 {
        self.index
    }

    fn read(&mut self) -> Option<RawFrame> {
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(index = self.index, error = %e, "camera read failed, treating as end of stream");
                return None;
            }
        };
        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(index = self.index, error = %e, "frame decode failed, treating as end of stream");
                return None;
            }
        };
        // Rebuild from raw bytes rather than assuming nokhwa and our image
        // crate agree on the buffer type.
        let (width, height) = (decoded.width(), decoded.height());
        match RgbImage::from_raw(width, height, decoded.into_raw()) {
            Some(image) => Some(RawFrame::new(image, self.index)),
            None => {
                error!(index = self.index, width, height, "decoded buffer has the wrong length");
                None
            }
        }
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!(index = self.index, error = %e, "failed to stop camera stream");
        }
    }
}
