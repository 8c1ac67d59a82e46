use chrono::{DateTime, Utc};
use image::RgbImage;
use std::sync::Arc;
use uuid::Uuid;

use crate::gesture::GestureLabel;

/// One frame as it leaves the video source. The pixel buffer is shared, so
/// cloning a frame through the pipeline never copies the image.
#[derive(Clone)]
pub struct RawFrame {
    pub image: Arc<RgbImage>,
    pub captured_at: DateTime<Utc>,
    pub id: Uuid,
    pub source_index: u32,
}

impl RawFrame {
    pub fn new(image: RgbImage, source_index: u32) -> Self {
        Self {
            image: Arc::new(image),
            captured_at: Utc::now(),
            id: Uuid::new_v4(),
            source_index,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// The composed, display-ready result of one loop iteration, published to the
/// UI through the single-slot handoff. `label` is present only when the label
/// overlay is enabled and a gesture was recognized this iteration; painting
/// the text is the display widget's concern.
#[derive(Clone)]
pub struct DisplayFrame {
    pub image: Arc<RgbImage>,
    pub label: Option<GestureLabel>,
    pub captured_at: DateTime<Utc>,
    pub id: Uuid,
}
