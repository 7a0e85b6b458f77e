//! Screen <-> document coordinate conversion and zoom stepping.

use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.0;
pub const SCALE_STEP: f32 = 0.1;
pub const DEFAULT_SCALE: f32 = 1.2;

/// Position in unscaled page units, top-left origin, y down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocPoint {
    pub x: f32,
    pub y: f32,
}

impl DocPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Pixel position in the rendered viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Map a pointer position to document coordinates, given the screen origin
/// of the rendered page container.
pub fn to_document(pointer: ScreenPoint, container_origin: ScreenPoint, scale: f32) -> DocPoint {
    DocPoint {
        x: (pointer.x - container_origin.x) / scale,
        y: (pointer.y - container_origin.y) / scale,
    }
}

/// Map a document position to its on-screen offset inside the page container.
pub fn to_screen(point: DocPoint, scale: f32) -> ScreenPoint {
    ScreenPoint { x: point.x * scale, y: point.y * scale }
}

pub fn zoom_in(scale: f32) -> f32 {
    step_scale(scale, SCALE_STEP)
}

pub fn zoom_out(scale: f32) -> f32 {
    step_scale(scale, -SCALE_STEP)
}

// Rounds to one decimal so repeated steps do not accumulate float drift.
fn step_scale(scale: f32, delta: f32) -> f32 {
    let stepped = ((scale + delta) * 10.0).round() / 10.0;
    stepped.clamp(MIN_SCALE, MAX_SCALE)
}
