//! Simulated pose frames for the movement-session demo
//!
//! A fixed standing skeleton is swayed with `sin`/`cos` of the elapsed
//! time. No camera input is analysed; the output is purely a function of
//! `t`.

use serde::Serialize;

/// Rest positions, normalized to the unit square (x right, y down)
const SKELETON: [(&str, f64, f64); 17] = [
    ("nose", 0.50, 0.12),
    ("left_eye", 0.48, 0.10),
    ("right_eye", 0.52, 0.10),
    ("left_ear", 0.46, 0.11),
    ("right_ear", 0.54, 0.11),
    ("left_shoulder", 0.42, 0.25),
    ("right_shoulder", 0.58, 0.25),
    ("left_elbow", 0.36, 0.38),
    ("right_elbow", 0.64, 0.38),
    ("left_wrist", 0.33, 0.50),
    ("right_wrist", 0.67, 0.50),
    ("left_hip", 0.45, 0.55),
    ("right_hip", 0.55, 0.55),
    ("left_knee", 0.44, 0.72),
    ("right_knee", 0.56, 0.72),
    ("left_ankle", 0.44, 0.90),
    ("right_ankle", 0.56, 0.90),
];

/// Sway amplitude for the torso and head
const BODY_SWAY: f64 = 0.01;
/// Arms move more than the rest of the body
const ARM_SWAY: f64 = 0.04;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keypoint {
    pub name: &'static str,
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseFrame {
    pub t: f64,
    pub keypoints: Vec<Keypoint>,
}

/// Names of the keypoints in frame order
pub fn keypoint_names() -> impl Iterator<Item = &'static str> {
    SKELETON.iter().map(|(name, _, _)| *name)
}

/// Frame at time `t` seconds
pub fn frame_at(t: f64) -> PoseFrame {
    let t = if t.is_finite() { t } else { 0.0 };

    let keypoints = SKELETON
        .iter()
        .enumerate()
        .map(|(i, (name, x, y))| {
            let amplitude = if name.contains("elbow") || name.contains("wrist") {
                ARM_SWAY
            } else {
                BODY_SWAY
            };
            let phase = i as f64 * 0.3;
            let dx = (t + phase).sin() * amplitude;
            let dy = (t * 1.3 + phase).cos() * amplitude;
            Keypoint {
                name,
                x: (x + dx).clamp(0.0, 1.0),
                y: (y + dy).clamp(0.0, 1.0),
                score: (0.9 + (t * 0.5 + phase).sin() * 0.05).clamp(0.0, 1.0),
            }
        })
        .collect();

    PoseFrame { t, keypoints }
}
