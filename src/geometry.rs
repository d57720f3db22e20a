//! Rectangles and the display ↔ image coordinate mapping.
//!
//! Everything stored in the session is in native image pixels. Pointer input
//! arrives in display (screen) pixels; [`DisplayTransform`] is the only place
//! the two spaces meet.

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Axis-aligned box with its top-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalize an anchor plus a signed drag delta into a top-left rectangle
    /// with non-negative size.
    pub fn from_anchor_delta(anchor: Pos2, delta: Vec2) -> Self {
        let end = anchor + delta;
        Self {
            x: anchor.x.min(end.x),
            y: anchor.y.min(end.y),
            width: delta.x.abs(),
            height: delta.y.abs(),
        }
    }

    /// Rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: Pos2, b: Pos2) -> Self {
        Self::from_anchor_delta(a, b - a)
    }

    /// A box with no area, e.g. a click without a drag.
    pub fn is_degenerate(&self) -> bool {
        // NaN sizes count as degenerate
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn min(&self) -> Pos2 {
        egui::pos2(self.x, self.y)
    }

    pub fn max(&self) -> Pos2 {
        egui::pos2(self.x + self.width, self.y + self.height)
    }

    /// Clip to `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        let x0 = self.x.clamp(0.0, width);
        let y0 = self.y.clamp(0.0, height);
        let x1 = (self.x + self.width).clamp(0.0, width);
        let y1 = (self.y + self.height).clamp(0.0, height);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    pub fn to_egui(&self) -> egui::Rect {
        egui::Rect::from_min_max(self.min(), self.max())
    }
}

/// Uniform scale plus offset from image pixels to display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    /// Display position of image pixel (0, 0).
    pub origin: Pos2,
    /// Display pixels per image pixel. Always positive.
    pub scale: f32,
}

impl DisplayTransform {
    pub fn new(origin: Pos2, scale: f32) -> Self {
        Self { origin, scale }
    }

    pub fn identity() -> Self {
        Self::new(Pos2::ZERO, 1.0)
    }

    /// Convert image-space coords to display-space.
    pub fn image_to_display(&self, p: Pos2) -> Pos2 {
        self.origin + p.to_vec2() * self.scale
    }

    /// Convert display-space coords to image-space.
    pub fn display_to_image(&self, p: Pos2) -> Pos2 {
        ((p - self.origin) / self.scale).to_pos2()
    }

    pub fn rect_to_image(&self, rect: &Rectangle) -> Rectangle {
        Rectangle::from_corners(
            self.display_to_image(rect.min()),
            self.display_to_image(rect.max()),
        )
    }

    pub fn rect_to_display(&self, rect: &Rectangle) -> egui::Rect {
        egui::Rect::from_min_max(
            self.image_to_display(rect.min()),
            self.image_to_display(rect.max()),
        )
    }
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Pan and zoom of the canvas. The image is centered in the canvas, shifted
/// by `pan` and scaled by `zoom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl Viewport {
    /// Largest zoom (capped at 1:1) that shows the whole image inside the
    /// canvas, kept within `[min_zoom, max_zoom]`.
    pub fn fit(canvas_size: Vec2, image_size: Vec2, min_zoom: f32, max_zoom: f32) -> Self {
        let zoom = if image_size.x > 0.0 && image_size.y > 0.0 {
            (canvas_size.x / image_size.x)
                .min(canvas_size.y / image_size.y)
                .min(1.0)
        } else {
            1.0
        };
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        Self {
            zoom: clamp_zoom(zoom, min_zoom, max_zoom),
            pan: Vec2::ZERO,
        }
    }

    pub fn transform(&self, canvas_rect: egui::Rect, image_size: Vec2) -> DisplayTransform {
        let origin = canvas_rect.center() + self.pan - image_size * 0.5 * self.zoom;
        DisplayTransform::new(origin, self.zoom)
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Zoom by `factor`, keeping the point under `cursor` fixed.
    pub fn zoom_at(
        &mut self,
        factor: f32,
        cursor: Pos2,
        canvas_rect: egui::Rect,
        min_zoom: f32,
        max_zoom: f32,
    ) {
        let new_zoom = clamp_zoom(self.zoom * factor, min_zoom, max_zoom);
        if !(new_zoom > 0.0 && new_zoom.is_finite()) {
            return;
        }
        let cursor_rel = cursor - canvas_rect.center() - self.pan;
        self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
        self.zoom = new_zoom;
    }
}

// Unlike `f32::clamp`, never panics when the limits are inverted.
fn clamp_zoom(zoom: f32, min_zoom: f32, max_zoom: f32) -> f32 {
    zoom.max(min_zoom).min(max_zoom)
}
