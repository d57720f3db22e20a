//! The annotation session: one context object owning the class list, the
//! color registry, the store, the drawing surface, the assignment flow and
//! the current image.

use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::classes::{normalize_class_name, ClassList};
use crate::color::{ColorRegistry, Rgb};
use crate::error::{AnnotateError, Result};
use crate::flow::ClassAssignmentFlow;
use crate::geometry::{DisplayTransform, Rectangle};
use crate::store::{Annotation, AnnotationStore};
use crate::surface::DrawingSurface;

/// Stroke color for annotations whose class no longer resolves.
pub const UNKNOWN_CLASS_COLOR: Rgb = Rgb::new(255, 0, 0);

/// The image currently being annotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSession {
    /// Server-assigned filename.
    pub filename: String,
    /// Native pixel size, known once the image has been decoded.
    pub dimensions: Option<(u32, u32)>,
}

impl ImageSession {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            dimensions: None,
        }
    }
}

/// Body of `POST /annotations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub filename: String,
    pub boxes: Vec<Annotation>,
    pub image_width: u32,
    pub image_height: u32,
}

/// What happened to a finished draw gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOutcome {
    /// Pointer-up without a gesture in progress.
    NoGesture,
    /// Zero-area box, thrown away before class assignment.
    Discarded,
    /// Box in image pixels, now waiting for a class.
    Pending(Rectangle),
}

/// Ordered display list for one frame, in display coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneItem {
    /// Background image. Never a pointer target.
    Image { rect: egui::Rect },
    /// Committed annotation with its class color and name.
    Annotation {
        rect: egui::Rect,
        color: Rgb,
        label: String,
    },
    /// Box being drawn or waiting for its class.
    Preview { rect: egui::Rect },
}

pub struct AnnotationSession {
    classes: ClassList,
    colors: ColorRegistry,
    store: AnnotationStore,
    surface: DrawingSurface,
    flow: ClassAssignmentFlow,
    image: Option<ImageSession>,
    saved_revision: Option<u64>,
}

impl Default for AnnotationSession {
    fn default() -> Self {
        Self::with_colors(ColorRegistry::new())
    }
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session with a seeded color registry. Drawing starts disabled.
    pub fn with_colors(colors: ColorRegistry) -> Self {
        let mut session = Self {
            classes: ClassList::new(),
            colors,
            store: AnnotationStore::new(),
            surface: DrawingSurface::new(),
            flow: ClassAssignmentFlow::new(),
            image: None,
            saved_revision: None,
        };
        session.sync_drawing_enabled();
        session
    }

    pub fn classes(&self) -> &ClassList {
        &self.classes
    }

    pub fn colors(&self) -> &ColorRegistry {
        &self.colors
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.store.all()
    }

    pub fn image(&self) -> Option<&ImageSession> {
        self.image.as_ref()
    }

    pub fn image_dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().and_then(|img| img.dimensions)
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn pending_box(&self) -> Option<Rectangle> {
        self.flow.pending()
    }

    pub fn selected_class(&self) -> Option<&str> {
        self.flow.selected()
    }

    // ── Classes ─────────────────────────────────────────────────────────

    /// Replace the class list with the backend's, assigning colors to new names.
    pub fn set_classes(&mut self, names: Vec<String>) -> Result<()> {
        self.classes = ClassList::from_names(names);
        self.colors.assign_all(self.classes.iter())?;
        self.flow.refresh_default(&self.classes);
        log::info!("Class list now has {} classes", self.classes.len());
        Ok(())
    }

    /// Add a class locally. Returns `false` if it already existed.
    pub fn add_class(&mut self, raw_name: &str) -> Result<bool> {
        let name = normalize_class_name(raw_name)?;
        if !self.classes.insert(name.clone()) {
            log::debug!("Class '{}' already present", name);
            return Ok(false);
        }
        self.colors.color_for(&name)?;
        self.flow.refresh_default(&self.classes);
        Ok(true)
    }

    /// Color used to draw annotations of `class_name`.
    pub fn class_color(&self, class_name: &str) -> Rgb {
        self.colors.get(class_name).unwrap_or(UNKNOWN_CLASS_COLOR)
    }

    // ── Image lifecycle ─────────────────────────────────────────────────

    /// Switch to a newly uploaded image. Clears annotations, any gesture and
    /// any pending box. Drawing stays disabled until the dimensions arrive.
    pub fn begin_image(&mut self, filename: impl Into<String>) {
        let image = ImageSession::new(filename);
        log::info!("Loading image '{}'", image.filename);
        self.image = Some(image);
        self.store.reset();
        self.surface.abort();
        self.flow.cancel();
        self.saved_revision = None;
        self.sync_drawing_enabled();
    }

    /// Record the decoded size of the current image.
    pub fn set_image_dimensions(&mut self, filename: &str, width: u32, height: u32) -> Result<()> {
        let image = self.image.as_mut().ok_or(AnnotateError::NoImage)?;
        if image.filename != filename {
            return Err(AnnotateError::StaleImage {
                expected: image.filename.clone(),
                got: filename.to_string(),
            });
        }
        image.dimensions = Some((width, height));
        log::info!("Image '{}' is {}x{}", filename, width, height);
        self.sync_drawing_enabled();
        Ok(())
    }

    /// Drawing needs known image dimensions and no box waiting for a class.
    pub fn drawing_enabled(&self) -> bool {
        self.image_dimensions().is_some() && !self.flow.is_pending()
    }

    fn sync_drawing_enabled(&mut self) {
        let enabled = self.drawing_enabled();
        self.surface.set_enabled(enabled);
    }

    // ── Pointer input (display coordinates) ─────────────────────────────

    pub fn pointer_down(&mut self, pos: Pos2) -> bool {
        self.surface.pointer_down(pos)
    }

    pub fn pointer_move(&mut self, pos: Pos2) {
        self.surface.pointer_move(pos);
    }

    /// Finish the gesture. The rectangle is converted to image pixels with
    /// `transform` and clipped to the image; zero-area results are dropped.
    pub fn pointer_up(&mut self, transform: &DisplayTransform) -> Result<DrawOutcome> {
        let Some(raw) = self.surface.pointer_up() else {
            return Ok(DrawOutcome::NoGesture);
        };
        let (width, height) = self.require_dimensions()?;
        let rect = transform
            .rect_to_image(&raw)
            .clamp_to(width as f32, height as f32);

        if rect.is_degenerate() {
            log::debug!("Discarding zero-area box {:?}", rect);
            return Ok(DrawOutcome::Discarded);
        }

        self.flow.begin(rect, &self.classes)?;
        self.sync_drawing_enabled();
        Ok(DrawOutcome::Pending(rect))
    }

    pub fn abort_gesture(&mut self) {
        self.surface.abort();
    }

    // ── Class assignment ────────────────────────────────────────────────

    pub fn select_class(&mut self, class_name: impl Into<String>) {
        self.flow.select(class_name);
    }

    /// Commit the pending box with the selected class.
    pub fn confirm(&mut self) -> Result<Annotation> {
        let result = self.flow.confirm(&self.classes, &mut self.store);
        self.sync_drawing_enabled();
        if let Ok(annotation) = &result {
            log::info!(
                "Annotation {:?} -> class {}",
                annotation.rect,
                annotation.class_id.0
            );
        }
        result
    }

    pub fn cancel(&mut self) -> Option<Rectangle> {
        let dropped = self.flow.cancel();
        self.sync_drawing_enabled();
        dropped
    }

    // ── Persistence ─────────────────────────────────────────────────────

    fn require_dimensions(&self) -> Result<(u32, u32)> {
        let image = self.image.as_ref().ok_or(AnnotateError::NoImage)?;
        image.dimensions.ok_or_else(|| AnnotateError::DimensionsUnknown {
            filename: image.filename.clone(),
        })
    }

    /// Snapshot of the store and image size for `POST /annotations`.
    pub fn save_request(&self) -> Result<SaveRequest> {
        let (image_width, image_height) = self.require_dimensions()?;
        let filename = self
            .image
            .as_ref()
            .map(|img| img.filename.clone())
            .ok_or(AnnotateError::NoImage)?;
        Ok(SaveRequest {
            filename,
            boxes: self.store.all().to_vec(),
            image_width,
            image_height,
        })
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    /// Record a successful save of the snapshot taken at `revision`.
    pub fn mark_saved(&mut self, filename: &str, revision: u64) {
        if self.image.as_ref().is_some_and(|img| img.filename == filename) {
            self.saved_revision = Some(revision);
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.store.is_empty() && self.saved_revision != Some(self.store.revision())
    }

    // ── Rendering ───────────────────────────────────────────────────────

    /// Display list: image, then committed boxes in order, then the preview.
    pub fn scene(&self, transform: &DisplayTransform) -> Vec<SceneItem> {
        let Some((width, height)) = self.image_dimensions() else {
            return Vec::new();
        };

        let mut items = Vec::with_capacity(self.store.len() + 2);
        items.push(SceneItem::Image {
            rect: transform.rect_to_display(&Rectangle::new(0.0, 0.0, width as f32, height as f32)),
        });

        for ann in self.store.all() {
            let label = self.classes.name_of(ann.class_id).unwrap_or_default();
            items.push(SceneItem::Annotation {
                rect: transform.rect_to_display(&ann.rect),
                color: self.class_color(label),
                label: label.to_string(),
            });
        }

        if let Some(preview) = self.surface.preview() {
            items.push(SceneItem::Preview {
                rect: preview.to_egui(),
            });
        } else if let Some(pending) = self.flow.pending() {
            items.push(SceneItem::Preview {
                rect: transform.rect_to_display(&pending),
            });
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassId;
    use egui::pos2;

    fn loaded_session(classes: &[&str]) -> AnnotationSession {
        let mut session = AnnotationSession::with_colors(ColorRegistry::with_seed(11));
        session
            .set_classes(classes.iter().map(|s| s.to_string()).collect())
            .unwrap();
        session.begin_image("photo.jpg");
        session.set_image_dimensions("photo.jpg", 400, 300).unwrap();
        session
    }

    fn draw(session: &mut AnnotationSession, from: Pos2, to: Pos2) -> DrawOutcome {
        session.pointer_down(from);
        session.pointer_move(to);
        session.pointer_up(&DisplayTransform::identity()).unwrap()
    }

    #[test]
    fn test_draw_and_confirm_scenario() {
        let mut session = loaded_session(&[]);
        session.add_class("dog").unwrap();

        let outcome = draw(&mut session, pos2(50.0, 50.0), pos2(150.0, 120.0));
        assert_eq!(
            outcome,
            DrawOutcome::Pending(Rectangle::new(50.0, 50.0, 100.0, 70.0))
        );
        assert_eq!(session.selected_class(), Some("dog"));
        session.confirm().unwrap();

        assert_eq!(
            session.annotations(),
            &[Annotation::new(Rectangle::new(50.0, 50.0, 100.0, 70.0), ClassId(0))]
        );
    }

    #[test]
    fn test_confirm_uses_index_at_confirm_time() {
        let mut session = loaded_session(&["cat", "dog"]);
        draw(&mut session, pos2(10.0, 10.0), pos2(20.0, 20.0));
        session.select_class("dog");
        let ann = session.confirm().unwrap();
        assert_eq!(ann.class_id, ClassId(1));
    }

    #[test]
    fn test_click_without_drag_is_rejected() {
        let mut session = loaded_session(&["cat"]);
        let outcome = draw(&mut session, pos2(10.0, 10.0), pos2(10.0, 10.0));
        assert_eq!(outcome, DrawOutcome::Discarded);
        assert_eq!(session.pending_box(), None);
        assert!(session.annotations().is_empty());
        assert!(matches!(session.confirm(), Err(AnnotateError::NoPendingBox)));
        assert!(session.annotations().is_empty());
    }

    #[test]
    fn test_cancel_does_not_touch_store() {
        let mut session = loaded_session(&["cat"]);
        draw(&mut session, pos2(0.0, 0.0), pos2(30.0, 30.0));
        session.confirm().unwrap();
        let before = session.annotations().to_vec();

        draw(&mut session, pos2(100.0, 100.0), pos2(130.0, 150.0));
        assert!(session.cancel().is_some());

        assert_eq!(session.annotations(), before.as_slice());
        assert!(session.drawing_enabled());
    }

    #[test]
    fn test_drawing_blocked_while_pending() {
        let mut session = loaded_session(&["cat"]);
        draw(&mut session, pos2(0.0, 0.0), pos2(30.0, 30.0));
        assert!(!session.drawing_enabled());
        assert!(!session.pointer_down(pos2(50.0, 50.0)));
        assert_eq!(
            session.pointer_up(&DisplayTransform::identity()).unwrap(),
            DrawOutcome::NoGesture
        );
        assert_eq!(session.pending_box(), Some(Rectangle::new(0.0, 0.0, 30.0, 30.0)));

        session.confirm().unwrap();
        assert!(session.drawing_enabled());
    }

    #[test]
    fn test_fresh_session_does_not_draw() {
        let mut session = AnnotationSession::with_colors(ColorRegistry::with_seed(2));
        assert!(!session.drawing_enabled());
        assert!(!session.surface().is_enabled());
        assert!(!session.pointer_down(pos2(1.0, 1.0)));
        assert!(!session.surface().is_drawing());
        assert_eq!(
            session.pointer_up(&DisplayTransform::identity()).unwrap(),
            DrawOutcome::NoGesture
        );
    }

    #[test]
    fn test_drawing_disabled_until_dimensions_known() {
        let mut session = AnnotationSession::new();
        assert!(!session.pointer_down(pos2(1.0, 1.0)));

        session.begin_image("a.png");
        assert!(!session.drawing_enabled());
        assert!(!session.pointer_down(pos2(1.0, 1.0)));

        session.set_image_dimensions("a.png", 10, 10).unwrap();
        assert!(session.pointer_down(pos2(1.0, 1.0)));
    }

    #[test]
    fn test_scaled_display_stores_image_pixels() {
        let mut session = loaded_session(&["cat"]);
        let half = DisplayTransform::new(pos2(20.0, 10.0), 0.5);
        session.pointer_down(pos2(45.0, 35.0));
        session.pointer_move(pos2(95.0, 70.0));
        let outcome = session.pointer_up(&half).unwrap();
        assert_eq!(
            outcome,
            DrawOutcome::Pending(Rectangle::new(50.0, 50.0, 100.0, 70.0))
        );
    }

    #[test]
    fn test_box_is_clipped_to_image() {
        let mut session = loaded_session(&["cat"]);
        let outcome = draw(&mut session, pos2(380.0, 280.0), pos2(450.0, 350.0));
        assert_eq!(
            outcome,
            DrawOutcome::Pending(Rectangle::new(380.0, 280.0, 20.0, 20.0))
        );
    }

    #[test]
    fn test_new_image_resets_annotations() {
        let mut session = loaded_session(&["cat"]);
        draw(&mut session, pos2(0.0, 0.0), pos2(30.0, 30.0));
        session.confirm().unwrap();
        draw(&mut session, pos2(40.0, 40.0), pos2(60.0, 60.0));

        session.begin_image("second.jpg");
        assert!(session.annotations().is_empty());
        assert_eq!(session.pending_box(), None);
        assert_eq!(session.image_dimensions(), None);
    }

    #[test]
    fn test_stale_dimensions_are_rejected() {
        let mut session = AnnotationSession::new();
        session.begin_image("new.png");
        let err = session.set_image_dimensions("old.png", 5, 5).unwrap_err();
        assert!(matches!(err, AnnotateError::StaleImage { .. }));
        assert_eq!(session.image_dimensions(), None);
    }

    #[test]
    fn test_add_same_class_twice() {
        let mut session = AnnotationSession::with_colors(ColorRegistry::with_seed(5));
        assert!(session.add_class("cat").unwrap());
        let color = session.class_color("cat");
        assert!(!session.add_class("cat").unwrap());
        assert!(!session.add_class(" cat ").unwrap());
        assert_eq!(session.classes().len(), 1);
        assert_eq!(session.colors().len(), 1);
        assert_eq!(session.class_color("cat"), color);
    }

    #[test]
    fn test_add_empty_class_fails() {
        let mut session = AnnotationSession::new();
        assert!(matches!(
            session.add_class("  "),
            Err(AnnotateError::EmptyClassName)
        ));
    }

    #[test]
    fn test_colors_survive_class_list_refresh() {
        let mut session = AnnotationSession::with_colors(ColorRegistry::with_seed(9));
        session.set_classes(vec!["cat".into()]).unwrap();
        let cat = session.class_color("cat");
        session
            .set_classes(vec!["cat".into(), "dog".into()])
            .unwrap();
        assert_eq!(session.class_color("cat"), cat);
        assert_ne!(session.class_color("dog"), cat);
    }

    #[test]
    fn test_save_fails_fast_without_dimensions() {
        let mut session = AnnotationSession::new();
        assert!(matches!(session.save_request(), Err(AnnotateError::NoImage)));

        session.begin_image("a.png");
        assert!(matches!(
            session.save_request(),
            Err(AnnotateError::DimensionsUnknown { filename }) if filename == "a.png"
        ));
    }

    #[test]
    fn test_save_request_snapshot() {
        let mut session = loaded_session(&["cat", "dog"]);
        draw(&mut session, pos2(50.0, 50.0), pos2(150.0, 120.0));
        session.select_class("dog");
        session.confirm().unwrap();

        let request = session.save_request().unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "photo.jpg",
                "boxes": [{"x": 50.0, "y": 50.0, "width": 100.0, "height": 70.0, "classId": 1}],
                "imageWidth": 400,
                "imageHeight": 300
            })
        );
    }

    #[test]
    fn test_unsaved_changes_tracking() {
        let mut session = loaded_session(&["cat"]);
        assert!(!session.has_unsaved_changes());
        draw(&mut session, pos2(0.0, 0.0), pos2(10.0, 10.0));
        session.confirm().unwrap();
        assert!(session.has_unsaved_changes());

        let revision = session.revision();
        session.mark_saved("other.png", revision);
        assert!(session.has_unsaved_changes());
        session.mark_saved("photo.jpg", revision);
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_scene_order() {
        let mut session = loaded_session(&["cat"]);
        draw(&mut session, pos2(0.0, 0.0), pos2(10.0, 10.0));
        session.confirm().unwrap();
        session.pointer_down(pos2(20.0, 20.0));
        session.pointer_move(pos2(5.0, 40.0));

        let items = session.scene(&DisplayTransform::identity());
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], SceneItem::Image { .. }));
        match &items[1] {
            SceneItem::Annotation { label, color, .. } => {
                assert_eq!(label, "cat");
                assert_eq!(*color, session.class_color("cat"));
            }
            other => panic!("expected annotation, got {:?}", other),
        }
        assert_eq!(
            items[2],
            SceneItem::Preview {
                rect: egui::Rect::from_min_max(pos2(5.0, 20.0), pos2(20.0, 40.0))
            }
        );
    }

    #[test]
    fn test_scene_unknown_class_is_red() {
        let mut session = loaded_session(&["cat"]);
        draw(&mut session, pos2(0.0, 0.0), pos2(10.0, 10.0));
        session.confirm().unwrap();
        session.set_classes(Vec::new()).unwrap();

        let items = session.scene(&DisplayTransform::identity());
        assert_eq!(
            items[1],
            SceneItem::Annotation {
                rect: egui::Rect::from_min_max(pos2(0.0, 0.0), pos2(10.0, 10.0)),
                color: UNKNOWN_CLASS_COLOR,
                label: String::new(),
            }
        );
    }

    #[test]
    fn test_scene_empty_before_decode() {
        let mut session = AnnotationSession::new();
        session.begin_image("a.png");
        assert!(session.scene(&DisplayTransform::identity()).is_empty());
    }
}
