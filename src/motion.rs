//! Raw motion-capture clips as handed over by the clip loader.

use serde::{Deserialize, Serialize};

/// CMU clips are sampled at 120 Hz.
pub const DEFAULT_FRAME_TIME: f64 = 1.0 / 120.0;

fn default_frame_time() -> f64 {
    DEFAULT_FRAME_TIME
}

/// One sampled pose: `(joint, values)` pairs in clip order.
///
/// The first entry is the root with 3 translation values followed by 3
/// orientation values in degrees. Every other entry holds 1–3 angles in
/// degrees, in the joint's declared axis order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MocapFrame {
    pub entries: Vec<(String, Vec<f64>)>,
}

impl MocapFrame {
    pub fn new(entries: Vec<(String, Vec<f64>)>) -> Self {
        Self { entries }
    }

    pub fn root(&self) -> Option<&(String, Vec<f64>)> {
        self.entries.first()
    }

    pub fn joints(&self) -> &[(String, Vec<f64>)] {
        self.entries.get(1..).unwrap_or(&[])
    }
}

/// An ordered sequence of mocap frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionClip {
    /// Seconds between consecutive frames.
    #[serde(default = "default_frame_time")]
    pub frame_time: f64,

    pub frames: Vec<MocapFrame>,
}

impl MotionClip {
    pub fn new(frames: Vec<MocapFrame>, frame_time: f64) -> Self {
        Self { frame_time, frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
