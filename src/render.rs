//! Painting a [`SceneItem`] list with egui.

use eframe::egui;

use crate::config::ViewConfig;
use crate::session::SceneItem;

/// Stroke color of the box being drawn.
pub const PREVIEW_COLOR: egui::Color32 = egui::Color32::from_rgb(0, 200, 0);

pub const CANVAS_BACKGROUND: egui::Color32 = egui::Color32::from_gray(40);

pub fn paint_scene(
    painter: &egui::Painter,
    items: &[SceneItem],
    texture: Option<&egui::TextureHandle>,
    view: &ViewConfig,
) {
    for item in items {
        match item {
            SceneItem::Image { rect } => {
                if let Some(tex) = texture {
                    painter.image(
                        tex.id(),
                        *rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            }
            SceneItem::Annotation { rect, color, label } => {
                let c = color.to_egui();
                painter.rect_stroke(
                    *rect,
                    0.0,
                    egui::Stroke::new(view.stroke_width, c),
                    egui::StrokeKind::Middle,
                );
                // label sits inside the box, flush with its top-right corner
                if !label.is_empty() {
                    painter.text(
                        rect.right_top(),
                        egui::Align2::RIGHT_TOP,
                        label,
                        egui::FontId::proportional(view.label_font_size),
                        c,
                    );
                }
            }
            SceneItem::Preview { rect } => {
                painter.rect_stroke(
                    *rect,
                    0.0,
                    egui::Stroke::new(view.stroke_width, PREVIEW_COLOR),
                    egui::StrokeKind::Middle,
                );
            }
        }
    }
}
