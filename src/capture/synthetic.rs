use std::time::Duration;

use image::{Rgb, RgbImage};
use tracing::info;

use super::{SourceFactory, VideoSource};
use crate::common::frame::RawFrame;
use crate::error::OpenError;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Procedural video for machines without a camera stack. Every index below
/// `sources` opens; the pixel pattern is a deterministic function of
/// (index, frame counter), so tests can tell sources and frames apart.
#[derive(Clone)]
pub struct SyntheticFactory {
    pub sources: u32,
    pub frame_interval: Duration,
    /// End of stream after this many frames; `None` streams forever.
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticFactory {
    fn default() -> Self {
        Self {
            sources: 2,
            frame_interval: Duration::from_millis(33),
            frame_limit: None,
        }
    }
}

impl SourceFactory for SyntheticFactory {
    fn open(&self, index: u32) -> Result<Box<dyn VideoSource>, OpenError> {
        if index >= self.sources {
            return Err(OpenError {
                index,
                reason: format!("no synthetic device beyond index {}", self.sources - 1),
            });
        }
        info!(index, "opened synthetic source");
        Ok(Box::new(SyntheticSource {
            index,
            counter: 0,
            frame_interval: self.frame_interval,
            remaining: self.frame_limit,
        }))
    }
}

#[derive(Debug)]
pub struct SyntheticSource {
    index: u32,
    counter: u64,
    frame_interval: Duration,
    remaining: Option<u64>,
}

impl VideoSource for SyntheticSource {
    fn index(&self) -> u32 {
        self.index
    }

    fn read(&mut self) -> Option<RawFrame> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        std::thread::sleep(self.frame_interval);

        let shift = (self.counter % u64::from(WIDTH)) as u32;
        let base = (40 * (self.index + 1) % 255) as u8;
        let image = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            // Scrolling vertical bar over a per-source tint.
            if (x + WIDTH - shift) % WIDTH < 16 {
                Rgb([255, 255, 255])
            } else {
                Rgb([base, (y % 256) as u8, (x % 256) as u8])
            }
        });
        self.counter += 1;
        Some(RawFrame::new(image, self.index))
    }
}
