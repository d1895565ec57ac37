// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mapping between curve space (time, value) and screen space.

use crate::curve::CurveSet;
use crate::keyframe::{Keyframe, TangentSide};
use egui::{Pos2, Rect, Vec2};

const MIN_TIME_SPAN: f32 = 1e-3;
const MIN_VALUE_SPAN: f32 = 1e-3;

/// View transform of the curve editor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Screen rectangle of the curve area
    pub rect: Rect,
    /// Time at the left edge
    pub time_start: f32,
    /// Time at the right edge
    pub time_end: f32,
    /// Value at the bottom edge
    pub value_min: f32,
    /// Value at the top edge
    pub value_max: f32,
}

impl ViewTransform {
    /// Create a view transform
    pub fn new(rect: Rect, time_range: (f32, f32), value_range: (f32, f32)) -> Self {
        let mut view = Self {
            rect,
            time_start: 0.0,
            time_end: 1.0,
            value_min: 0.0,
            value_max: 1.0,
        };
        view.set_ranges(time_range, value_range);
        view
    }

    /// Set the visible ranges, enforcing a minimal span
    pub fn set_ranges(&mut self, time_range: (f32, f32), value_range: (f32, f32)) {
        self.time_start = time_range.0;
        self.time_end = time_range.1.max(time_range.0 + MIN_TIME_SPAN);
        self.value_min = value_range.0;
        self.value_max = value_range.1.max(value_range.0 + MIN_VALUE_SPAN);
    }

    /// Horizontal scale
    pub fn pixels_per_second(&self) -> f32 {
        self.rect.width() / (self.time_end - self.time_start)
    }

    /// Vertical scale
    pub fn pixels_per_unit(&self) -> f32 {
        self.rect.height() / (self.value_max - self.value_min)
    }

    /// Convert time to x position
    pub fn time_to_x(&self, time: f32) -> f32 {
        self.rect.min.x + (time - self.time_start) * self.pixels_per_second()
    }

    /// Convert x position to time
    pub fn x_to_time(&self, x: f32) -> f32 {
        self.time_start + (x - self.rect.min.x) / self.pixels_per_second()
    }

    /// Convert value to y position (values grow upwards)
    pub fn value_to_y(&self, value: f32) -> f32 {
        self.rect.max.y - (value - self.value_min) * self.pixels_per_unit()
    }

    /// Convert y position to value
    pub fn y_to_value(&self, y: f32) -> f32 {
        self.value_min + (self.rect.max.y - y) / self.pixels_per_unit()
    }

    /// Convert a curve point to screen space
    pub fn to_screen(&self, time: f32, value: f32) -> Pos2 {
        Pos2::new(self.time_to_x(time), self.value_to_y(value))
    }

    /// Convert a screen point to (time, value)
    pub fn from_screen(&self, pos: Pos2) -> (f32, f32) {
        (self.x_to_time(pos.x), self.y_to_value(pos.y))
    }

    /// Convert a screen delta to (time delta, value delta)
    pub fn delta_from_screen(&self, delta: Vec2) -> (f32, f32) {
        (delta.x / self.pixels_per_second(), -delta.y / self.pixels_per_unit())
    }

    /// Screen position of a scalar keyframe
    pub fn key_position(&self, key: &Keyframe) -> Option<Pos2> {
        Some(self.to_screen(key.time, key.as_float()?))
    }

    /// Screen position of a tangent handle, `None` for stepped or object keys
    pub fn tangent_handle(&self, key: &Keyframe, side: TangentSide, length: f32) -> Option<Pos2> {
        let origin = self.key_position(key)?;
        let slope = key.tangent(side);
        if !slope.is_finite() {
            return None;
        }
        let direction = Vec2::new(self.pixels_per_second(), -slope * self.pixels_per_unit()).normalized();
        Some(match side {
            TangentSide::In => origin - direction * length,
            TangentSide::Out => origin + direction * length,
        })
    }

    /// Slope described by dragging a tangent handle of `key` to `handle`.
    ///
    /// A handle dragged past the key is clamped to its own side.
    pub fn slope_from_handle(&self, key: &Keyframe, side: TangentSide, handle: Pos2) -> Option<f32> {
        let value = key.as_float()?;
        let (time, handle_value) = self.from_screen(handle);
        let dt = time - key.time;
        let dt = match side {
            TangentSide::In => dt.min(-1e-5),
            TangentSide::Out => dt.max(1e-5),
        };
        Some((handle_value - value) / dt)
    }

    /// Pan by a screen delta
    pub fn pan(&mut self, delta: Vec2) {
        let (dt, dv) = self.delta_from_screen(delta);
        self.time_start -= dt;
        self.time_end -= dt;
        self.value_min -= dv;
        self.value_max -= dv;
    }

    /// Zoom around a screen anchor. Factors above 1 zoom in.
    pub fn zoom(&mut self, factor: Vec2, anchor: Pos2) {
        if factor.x <= 0.0 || factor.y <= 0.0 {
            return;
        }
        let (t, v) = self.from_screen(anchor);
        let time_range = (
            t - (t - self.time_start) / factor.x,
            t + (self.time_end - t) / factor.x,
        );
        let value_range = (
            v - (v - self.value_min) / factor.y,
            v + (self.value_max - v) / factor.y,
        );
        self.set_ranges(time_range, value_range);
    }

    /// Fit the visible ranges to every visible scalar curve, with a margin
    pub fn frame_all(&mut self, curves: &CurveSet) {
        let mut time: Option<(f32, f32)> = None;
        let mut value: Option<(f32, f32)> = None;
        for wrapper in curves.values().filter(|c| !c.hidden) {
            if let Some((a, b)) = wrapper.curve.time_range() {
                time = Some(time.map_or((a, b), |(lo, hi)| (lo.min(a), hi.max(b))));
            }
            if let Some((a, b)) = wrapper.curve.value_range() {
                value = Some(value.map_or((a, b), |(lo, hi)| (lo.min(a), hi.max(b))));
            }
        }

        let (t0, t1) = time.unwrap_or((0.0, 1.0));
        let (v0, v1) = value.unwrap_or((-1.0, 1.0));
        let (t0, t1) = if t1 - t0 < MIN_TIME_SPAN { (t0 - 0.5, t1 + 0.5) } else { (t0, t1) };
        let (v0, v1) = if v1 - v0 < MIN_VALUE_SPAN { (v0 - 1.0, v1 + 1.0) } else { (v0, v1) };
        let time_margin = (t1 - t0) * 0.05;
        let value_margin = (v1 - v0) * 0.1;
        self.set_ranges(
            (t0 - time_margin, t1 + time_margin),
            (v0 - value_margin, v1 + value_margin),
        );
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 400.0)),
            (0.0, 1.0),
            (-1.0, 1.0),
        )
    }
}

/// Convert time to the nearest frame number
pub fn time_to_frame(time: f32, frame_rate: f32) -> i32 {
    (time * frame_rate).round() as i32
}

/// Convert frame number to time
pub fn frame_to_time(frame: i32, frame_rate: f32) -> f32 {
    frame as f32 / frame_rate
}

/// Snap a time to the nearest frame
pub fn snap_time(time: f32, frame_rate: f32) -> f32 {
    if frame_rate > 0.0 {
        frame_to_time(time_to_frame(time, frame_rate), frame_rate)
    } else {
        time
    }
}
