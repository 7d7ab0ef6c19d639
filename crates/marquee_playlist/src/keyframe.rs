// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframed property curves (item opacity).

use crate::frame::Frame;
use serde::{Deserialize, Serialize};

/// Interpolation mode between keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpolationMode {
    /// Hold the value until the next keyframe
    Constant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Ease in and out (smoothstep)
    Smooth,
}

/// A keyframe on an item-local frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Frame relative to the item start
    pub frame: Frame,
    /// Value at this keyframe
    pub value: f32,
    /// Interpolation mode towards the next keyframe
    pub interpolation: InterpolationMode,
}

impl Keyframe {
    /// Create a new linear keyframe
    pub fn new(frame: Frame, value: f32) -> Self {
        Self {
            frame,
            value,
            interpolation: InterpolationMode::Linear,
        }
    }

    /// Set interpolation mode
    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Hermite smoothstep of `t` in 0..=1
    pub fn smoothstep(t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

/// A curve of keyframes sampled per frame.
///
/// An empty curve evaluates to its `default_value`. Keyframes are kept sorted
/// by frame; setting a keyframe on an occupied frame replaces its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyAnimation {
    default_value: f32,
    keyframes: Vec<Keyframe>,
}

impl PropertyAnimation {
    /// Create an empty curve with a constant default
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            keyframes: Vec::new(),
        }
    }

    /// The standard opacity curve (fully opaque)
    pub fn opacity() -> Self {
        Self::new(1.0)
    }

    /// Value used when no keyframes exist
    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// All keyframes, sorted by frame
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Number of keyframes
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Insert a keyframe or update the one already on that frame
    pub fn set_keyframe(&mut self, keyframe: Keyframe) {
        match self.keyframes.binary_search_by_key(&keyframe.frame, |k| k.frame) {
            Ok(idx) => self.keyframes[idx] = keyframe,
            Err(idx) => self.keyframes.insert(idx, keyframe),
        }
    }

    /// Remove the keyframe on `frame`, returning it
    pub fn remove_keyframe(&mut self, frame: Frame) -> Option<Keyframe> {
        let idx = self.keyframes.binary_search_by_key(&frame, |k| k.frame).ok()?;
        Some(self.keyframes.remove(idx))
    }

    /// Remove every keyframe
    pub fn clear(&mut self) {
        self.keyframes.clear();
    }

    /// Evaluate the curve at an item-local frame
    pub fn value_at(&self, frame: Frame) -> f32 {
        let next_idx = self.keyframes.iter().position(|k| k.frame >= frame);
        match next_idx {
            None => self
                .keyframes
                .last()
                .map_or(self.default_value, |k| k.value),
            Some(0) => self.keyframes[0].value,
            Some(idx) => {
                let a = &self.keyframes[idx - 1];
                let b = &self.keyframes[idx];
                let span = (b.frame - a.frame) as f32;
                let t = (frame - a.frame) as f32 / span;
                match a.interpolation {
                    InterpolationMode::Constant => a.value,
                    InterpolationMode::Linear => Interpolation::lerp(a.value, b.value, t),
                    InterpolationMode::Smooth => {
                        Interpolation::lerp(a.value, b.value, Interpolation::smoothstep(t))
                    }
                }
            }
        }
    }

    /// Shift every keyframe by `delta` frames
    pub fn offset(&mut self, delta: Frame) {
        for kf in &mut self.keyframes {
            kf.frame += delta;
        }
    }
}

impl Default for PropertyAnimation {
    fn default() -> Self {
        Self::opacity()
    }
}
