//! Collaborator boundary for hand detection and gesture classification.
//!
//! The production landmark and classification models are external; this
//! module fixes their contracts and ships two built-ins that keep the loop
//! exercisable without them: a perception stub that never detects (camera
//! preview only) and a geometry fallback classifier over the standard
//! 21-point hand landmark layout.

use image::RgbImage;

use crate::error::PerceptionError;
use crate::gesture::GestureLabel;

/// Landmark indices, MediaPipe hand model convention.
#[allow(dead_code)]
pub mod landmark_ids {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Bone segments between landmarks, used for the trace overlay.
pub const HAND_CONNECTIONS: [(usize, usize); 20] = [
    // Thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // Index
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // Middle
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    // Ring
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    // Pinky
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// One landmark, coordinates normalized to the frame (0.0..1.0); `y` grows
/// downward.
#[derive(Clone, Copy, Debug, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// At most one hand per frame; all 21 landmarks of that hand.
#[derive(Clone, Debug)]
pub struct HandDetection {
    pub landmarks: [Landmark; 21],
    pub confidence: f32,
}

/// Pixel-space drawing side product of a detection: joint dots plus bone
/// segments, ready for the renderer to composite.
#[derive(Clone, Debug, Default)]
pub struct HandTrace {
    pub points: Vec<(f32, f32)>,
    pub segments: Vec<((f32, f32), (f32, f32))>,
}

impl HandTrace {
    pub fn from_landmarks(landmarks: &[Landmark; 21], width: u32, height: u32) -> Self {
        let to_px =
            |lm: &Landmark| (lm.x * width as f32, lm.y * height as f32);
        let points = landmarks.iter().map(to_px).collect();
        let segments = HAND_CONNECTIONS
            .iter()
            .map(|&(a, b)| (to_px(&landmarks[a]), to_px(&landmarks[b])))
            .collect();
        Self { points, segments }
    }
}

pub trait HandPerception: Send {
    /// Detects at most one hand in the frame. `Ok(None)` means no hand; an
    /// error means this frame is unusable (the loop logs and moves on).
    fn detect(
        &mut self,
        frame: &RgbImage,
    ) -> Result<Option<(HandDetection, HandTrace)>, PerceptionError>;
}

pub trait GestureClassifier: Send {
    /// Maps a detection to a label, or `Ok(None)` when the pose matches no
    /// known gesture.
    fn classify(
        &mut self,
        detection: &HandDetection,
    ) -> Result<Option<GestureLabel>, PerceptionError>;
}

/// Camera-only mode: no landmark model wired in, nothing ever detected.
pub struct NoopPerception;

impl HandPerception for NoopPerception {
    fn detect(
        &mut self,
        _frame: &RgbImage,
    ) -> Result<Option<(HandDetection, HandTrace)>, PerceptionError> {
        Ok(None)
    }
}

const PINCH_RADIUS: f32 = 0.08;
const VULCAN_GAP: f32 = 0.15;

/// Geometry fallback classifier: reads which fingers are extended from
/// tip/knuckle distances and matches the pattern against the known gestures.
/// Deliberately approximate — it exists so the pipeline runs end to end when
/// no trained model is attached.
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn dist(a: Landmark, b: Landmark) -> f32 {
        let dx = a.x - b.x;
        let dy = a.y - b.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// A finger counts as extended when its tip sits farther from the wrist
    /// than its middle knuckle. Rotation-safe, unlike comparing y-coords.
    fn extended(landmarks: &[Landmark; 21], tip: usize, knuckle: usize) -> bool {
        use landmark_ids::WRIST;
        Self::dist(landmarks[tip], landmarks[WRIST])
            > Self::dist(landmarks[knuckle], landmarks[WRIST])
    }
}

impl GestureClassifier for HeuristicClassifier {
    fn classify(
        &mut self,
        detection: &HandDetection,
    ) -> Result<Option<GestureLabel>, PerceptionError> {
        use landmark_ids::*;
        let lm = &detection.landmarks;

        let thumb = Self::extended(lm, THUMB_TIP, THUMB_IP);
        let index = Self::extended(lm, INDEX_TIP, INDEX_PIP);
        let middle = Self::extended(lm, MIDDLE_TIP, MIDDLE_PIP);
        let ring = Self::extended(lm, RING_TIP, RING_PIP);
        let pinky = Self::extended(lm, PINKY_TIP, PINKY_PIP);

        // Pinch beats the finger pattern: thumb and index curl toward each
        // other, the remaining three stay up.
        if Self::dist(lm[THUMB_TIP], lm[INDEX_TIP]) < PINCH_RADIUS && middle && ring && pinky {
            return Ok(Some(GestureLabel::Okay));
        }

        let label = match (thumb, index, middle, ring, pinky) {
            (false, false, false, false, false) => GestureLabel::Fist,
            (true, false, false, false, false) => {
                if lm[THUMB_TIP].y < lm[WRIST].y {
                    GestureLabel::ThumbsUp
                } else {
                    GestureLabel::ThumbsDown
                }
            }
            (_, true, true, false, false) => GestureLabel::Peace,
            (true, false, false, false, true) => GestureLabel::CallMe,
            (false, true, false, false, true) | (true, true, false, false, true) => {
                GestureLabel::Rock
            }
            (false, true, false, false, false) => GestureLabel::Smile,
            (_, true, true, true, true) => {
                if Self::dist(lm[MIDDLE_TIP], lm[RING_TIP]) > VULCAN_GAP {
                    GestureLabel::LiveLong
                } else {
                    GestureLabel::Stop
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(label))
    }
}
