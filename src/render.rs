//! Frame composition. Pure: (raw frame, trace, label, toggles) in, display
//! frame out. What the widget paints is downstream; what gets drawn and when
//! is decided here.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use serde::Deserialize;
use std::sync::Arc;

use crate::common::frame::{DisplayFrame, RawFrame};
use crate::gesture::GestureLabel;
use crate::perception::HandTrace;

pub const PLACEHOLDER_WIDTH: u32 = 640;
pub const PLACEHOLDER_HEIGHT: u32 = 480;
pub const PLACEHOLDER_FILL: Rgb<u8> = Rgb([24, 24, 28]);

const BONE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const JOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const JOINT_RADIUS: i32 = 4;

/// The three overlay toggles, each independent of the others. Read once per
/// loop iteration as a single snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Show the live frame; off replaces it with a fixed placeholder so the
    /// consumer always receives a well-formed image.
    pub preview: bool,
    /// Composite the detected hand's joints and bones onto the frame.
    pub traces: bool,
    /// Attach the recognized gesture label to the frame.
    pub label: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            preview: true,
            traces: true,
            label: true,
        }
    }
}

pub fn compose(
    frame: &RawFrame,
    trace: Option<&HandTrace>,
    label: Option<GestureLabel>,
    overlay: OverlayConfig,
) -> DisplayFrame {
    let mut canvas = if overlay.preview {
        (*frame.image).clone()
    } else {
        RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, PLACEHOLDER_FILL)
    };

    if overlay.traces {
        if let Some(trace) = trace {
            draw_trace(&mut canvas, trace);
        }
    }

    DisplayFrame {
        image: Arc::new(canvas),
        label: if overlay.label { label } else { None },
        captured_at: frame.captured_at,
        id: frame.id,
    }
}

fn draw_trace(canvas: &mut RgbImage, trace: &HandTrace) {
    for &((x0, y0), (x1, y1)) in &trace.segments {
        // Offset passes thicken the 1px segments enough to read at a glance.
        for offset in -1..=1 {
            let o = offset as f32;
            draw_line_segment_mut(canvas, (x0 + o, y0), (x1 + o, y1), BONE_COLOR);
            draw_line_segment_mut(canvas, (x0, y0 + o), (x1, y1 + o), BONE_COLOR);
        }
    }
    for &(x, y) in &trace.points {
        draw_filled_circle_mut(canvas, (x as i32, y as i32), JOINT_RADIUS, JOINT_COLOR);
    }
}
