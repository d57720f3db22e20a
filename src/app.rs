use std::path::PathBuf;

use eframe::egui;
use image::RgbaImage;

use crate::backend::HttpBackend;
use crate::classes::normalize_class_name;
use crate::config::AppConfig;
use crate::error::{AnnotateError, ErrorKind};
use crate::geometry::Viewport;
use crate::render::{paint_scene, CANVAS_BACKGROUND};
use crate::session::{AnnotationSession, DrawOutcome};
use crate::worker::{BackendWorker, Request, Response};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

// ── Status line ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
struct Status {
    level: StatusLevel,
    text: String,
}

/// Keyboard action on the class dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogKey {
    Confirm,
    Cancel,
}

/// Enter/Escape only drive the dialog when no text field owns them this
/// frame, including a field that gave up focus on that very key press.
fn dialog_key(enter: bool, escape: bool, text_field_has_keys: bool) -> Option<DialogKey> {
    if text_field_has_keys {
        None
    } else if enter {
        Some(DialogKey::Confirm)
    } else if escape {
        Some(DialogKey::Cancel)
    } else {
        None
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct AnnotateApp {
    config: AppConfig,
    session: AnnotationSession,
    worker: Option<BackendWorker>,
    texture: Option<egui::TextureHandle>,

    // pan & zoom
    viewport: Viewport,
    fit_requested: bool,
    panning: bool,

    new_class_buf: String,
    status: Option<Status>,
}

impl AnnotateApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        initial_image: Option<PathBuf>,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let worker = HttpBackend::new(config.backend_url.clone(), config.request_timeout())
            .and_then(|backend| {
                BackendWorker::spawn(Box::new(backend), move || ctx.request_repaint())
            });

        let mut app = Self {
            config,
            session: AnnotationSession::new(),
            worker: None,
            texture: None,
            viewport: Viewport::default(),
            fit_requested: false,
            panning: false,
            new_class_buf: String::new(),
            status: None,
        };

        match worker {
            Ok(worker) => app.worker = Some(worker),
            Err(e) => app.report_error("Backend client unavailable", &e),
        }

        app.request(Request::FetchClasses);
        if let Some(path) = initial_image {
            app.request(Request::Upload(path));
        }
        app
    }

    fn report_info(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.status = Some(Status {
            level: StatusLevel::Info,
            text,
        });
    }

    fn report_error(&mut self, context: &str, err: &AnnotateError) {
        let level = match err.kind() {
            ErrorKind::Validation => {
                log::warn!("{}: {}", context, err);
                StatusLevel::Warning
            }
            ErrorKind::Transport | ErrorKind::Invariant => {
                log::error!("{}: {}", context, err);
                StatusLevel::Error
            }
        };
        self.status = Some(Status {
            level,
            text: format!("{}: {}", context, err),
        });
    }

    fn request(&mut self, request: Request) {
        let result = match self.worker.as_mut() {
            Some(worker) => worker.send(request),
            None => Err(AnnotateError::WorkerStopped),
        };
        if let Err(e) = result {
            self.report_error("Request not sent", &e);
        }
    }

    fn is_busy(&self) -> bool {
        self.worker.as_ref().is_some_and(BackendWorker::is_busy)
    }

    // ── Worker responses ────────────────────────────────────────────────

    fn poll_worker(&mut self, ctx: &egui::Context) {
        while let Some(response) = self.worker.as_mut().and_then(|w| w.try_recv()) {
            self.handle_response(ctx, response);
        }
    }

    fn handle_response(&mut self, ctx: &egui::Context, response: Response) {
        match response {
            Response::Classes(Ok(names)) => {
                if let Err(e) = self.session.set_classes(names) {
                    self.report_error("Could not color classes", &e);
                }
            }
            Response::Classes(Err(e)) => self.report_error("Could not load classes", &e),
            Response::ClassAdded {
                name,
                result: Ok(names),
            } => {
                let result = self
                    .session
                    .set_classes(names)
                    .and_then(|_| self.session.add_class(&name));
                match result {
                    Ok(_) => self.report_info(format!("Class '{}' available", name)),
                    Err(e) => self.report_error("Could not add class", &e),
                }
            }
            Response::ClassAdded {
                name,
                result: Err(e),
            } => self.report_error(&format!("Could not add class '{}'", name), &e),
            Response::Uploaded {
                path,
                result: Ok(filename),
            } => {
                if self.session.has_unsaved_changes() {
                    log::warn!("Discarding unsaved annotations of the previous image");
                }
                self.session.begin_image(filename.clone());
                self.texture = None;
                ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
                    "box-annotate — {}",
                    filename
                )));
                self.report_info(format!("Uploaded {} as '{}'", path.display(), filename));
            }
            Response::Uploaded {
                path,
                result: Err(e),
            } => self.report_error(&format!("Upload of {} failed", path.display()), &e),
            Response::Decoded {
                filename,
                result: Ok(image),
            } => self.install_image(ctx, &filename, &image),
            Response::Decoded {
                filename,
                result: Err(e),
            } => self.report_error(&format!("Could not decode '{}'", filename), &e),
            Response::Saved {
                filename,
                revision,
                result: Ok(()),
            } => {
                self.session.mark_saved(&filename, revision);
                self.report_info(format!("Annotations for '{}' saved", filename));
            }
            Response::Saved {
                filename,
                result: Err(e),
                ..
            } => self.report_error(&format!("Saving '{}' failed", filename), &e),
        }
    }

    fn install_image(&mut self, ctx: &egui::Context, filename: &str, image: &RgbaImage) {
        match self
            .session
            .set_image_dimensions(filename, image.width(), image.height())
        {
            Ok(()) => {
                let size = [image.width() as usize, image.height() as usize];
                let pixels = image.as_flat_samples();
                let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                self.texture =
                    Some(ctx.load_texture(filename, color_image, egui::TextureOptions::LINEAR));
                self.fit_requested = true;
            }
            Err(AnnotateError::StaleImage { expected, got }) => {
                log::debug!("Ignoring decode of '{}', current image is '{}'", got, expected);
            }
            Err(e) => self.report_error("Could not use decoded image", &e),
        }
    }

    // ── User actions ────────────────────────────────────────────────────

    fn open_image(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file()
        {
            self.request(Request::Upload(path));
        }
    }

    fn save(&mut self) {
        match self.session.save_request() {
            Ok(request) => {
                let revision = self.session.revision();
                self.request(Request::Save { request, revision });
            }
            Err(e) => self.report_error("Cannot save", &e),
        }
    }

    fn submit_new_class(&mut self) {
        match normalize_class_name(&self.new_class_buf) {
            Ok(name) if self.session.classes().contains(&name) => {
                self.report_info(format!("Class '{}' already exists", name));
                self.new_class_buf.clear();
            }
            Ok(name) => {
                self.request(Request::AddClass(name));
                self.new_class_buf.clear();
            }
            Err(e) => self.report_error("Cannot add class", &e),
        }
    }

    fn confirm_pending(&mut self) {
        if let Err(e) = self.session.confirm() {
            self.report_error("Box discarded", &e);
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────

    /// Returns `true` when the class field released keyboard focus this frame.
    fn toolbar(&mut self, ctx: &egui::Context) -> bool {
        let mut field_released = false;
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open image…").clicked() {
                    self.open_image();
                }
                if ui.button("Save").clicked() {
                    self.save();
                }
                ui.separator();
                let field = ui.add(
                    egui::TextEdit::singleline(&mut self.new_class_buf)
                        .hint_text("New class")
                        .desired_width(140.0),
                );
                field_released = field.lost_focus();
                let entered = field_released && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if ui.button("Add class").clicked() || entered {
                    self.submit_new_class();
                }
                ui.separator();
                if ui.button("Fit").clicked() {
                    self.fit_requested = true;
                }
                ui.label(format!("Zoom: {:.0}%", self.viewport.zoom * 100.0));
                if let Some((w, h)) = self.session.image_dimensions() {
                    ui.separator();
                    ui.label(format!("Dimensions: {} x {}", w, h));
                }
            });
        });
        field_released
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.is_busy() {
                    ui.spinner();
                }
                if let Some(status) = &self.status {
                    let color = match status.level {
                        StatusLevel::Info => ui.visuals().text_color(),
                        StatusLevel::Warning => ui.visuals().warn_fg_color,
                        StatusLevel::Error => ui.visuals().error_fg_color,
                    };
                    ui.colored_label(color, &status.text);
                }
                if self.session.has_unsaved_changes() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label("Unsaved changes");
                    });
                }
            });
        });
    }

    fn class_legend(&self, ctx: &egui::Context) {
        egui::SidePanel::right("classes")
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Classes");
                if self.session.classes().is_empty() {
                    ui.label("No classes yet");
                }
                for name in self.session.classes().iter() {
                    ui.horizontal(|ui| {
                        let (swatch, _) =
                            ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
                        ui.painter()
                            .rect_filled(swatch, 2.0, self.session.class_color(name).to_egui());
                        ui.label(name);
                    });
                }
                ui.separator();
                ui.label(format!("{} boxes", self.session.annotations().len()));
            });
    }

    fn class_dialog(&mut self, ctx: &egui::Context, class_field_released: bool) {
        if self.session.pending_box().is_none() {
            return;
        }

        let mut selected = self.session.selected_class().unwrap_or_default().to_string();
        let mut confirm = false;
        let mut cancel = false;

        egui::Window::new("Select the class for the box")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                if self.session.classes().is_empty() {
                    ui.label("No classes yet. Add one in the toolbar.");
                }
                egui::ComboBox::from_label("Class")
                    .selected_text(selected.clone())
                    .show_ui(ui, |ui| {
                        for name in self.session.classes().iter() {
                            ui.selectable_value(&mut selected, name.to_string(), name);
                        }
                    });
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                    if ui.button("Assign").clicked() {
                        confirm = true;
                    }
                });
            });

        let (enter, escape) =
            ctx.input(|i| (i.key_pressed(egui::Key::Enter), i.key_pressed(egui::Key::Escape)));
        let text_field_has_keys = class_field_released || ctx.wants_keyboard_input();
        match dialog_key(enter, escape, text_field_has_keys) {
            Some(DialogKey::Confirm) => confirm = true,
            Some(DialogKey::Cancel) => cancel = true,
            None => {}
        }

        if self.session.selected_class() != Some(selected.as_str()) && !selected.is_empty() {
            self.session.select_class(selected);
        }
        if confirm {
            self.confirm_pending();
        } else if cancel {
            self.session.cancel();
        }
    }

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas_rect = response.rect;

            // Draw background
            painter.rect_filled(canvas_rect, 0.0, CANVAS_BACKGROUND);

            let Some((width, height)) = self.session.image_dimensions() else {
                let hint = if self.session.image().is_some() {
                    "Loading image…"
                } else {
                    "Open an image to start annotating"
                };
                painter.text(
                    canvas_rect.center(),
                    egui::Align2::CENTER_CENTER,
                    hint,
                    egui::FontId::proportional(18.0),
                    egui::Color32::from_gray(180),
                );
                return;
            };
            let image_size = egui::vec2(width as f32, height as f32);

            if self.fit_requested {
                self.viewport = Viewport::fit(
                    canvas_rect.size(),
                    image_size,
                    self.config.view.min_zoom,
                    self.config.view.max_zoom,
                );
                self.fit_requested = false;
            }

            // Handle pan (middle mouse button)
            if ctx.input(|i| i.pointer.middle_down()) {
                let delta = ctx.input(|i| i.pointer.delta());
                self.viewport.pan_by(delta);
                self.panning = true;
            } else {
                self.panning = false;
            }

            // Handle zoom (scroll wheel)
            let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll_delta != 0.0 && response.hovered() {
                if let Some(cursor) = response.hover_pos() {
                    self.viewport.zoom_at(
                        1.0 + scroll_delta * 0.002,
                        cursor,
                        canvas_rect,
                        self.config.view.min_zoom,
                        self.config.view.max_zoom,
                    );
                }
            }

            let transform = self.viewport.transform(canvas_rect, image_size);

            // Primary button draws, not while panning
            if !self.panning {
                let mut finished = false;
                if response.clicked_by(egui::PointerButton::Primary) {
                    if let Some(pos) = response.interact_pointer_pos() {
                        self.session.pointer_down(pos);
                        finished = true;
                    }
                }
                if response.drag_started_by(egui::PointerButton::Primary) {
                    let anchor = ctx
                        .input(|i| i.pointer.press_origin())
                        .or(response.interact_pointer_pos());
                    if let Some(pos) = anchor {
                        self.session.pointer_down(pos);
                    }
                }
                if response.dragged_by(egui::PointerButton::Primary) {
                    if let Some(pos) = response.interact_pointer_pos() {
                        self.session.pointer_move(pos);
                    }
                }
                if response.drag_stopped_by(egui::PointerButton::Primary) {
                    if let Some(pos) = ctx.input(|i| i.pointer.latest_pos()) {
                        self.session.pointer_move(pos);
                    }
                    finished = true;
                }
                if finished {
                    match self.session.pointer_up(&transform) {
                        Ok(DrawOutcome::Discarded) => {
                            self.report_info("Click and drag to draw a box");
                        }
                        Ok(_) => {}
                        Err(e) => self.report_error("Box discarded", &e),
                    }
                }
            }

            // Painted after input so the preview follows the pointer this frame.
            let items = self.session.scene(&transform);
            paint_scene(&painter, &items, self.texture.as_ref(), &self.config.view);
        });
    }

    fn shortcuts(&mut self, ctx: &egui::Context) {
        let (save, escape) = ctx.input(|i| {
            (
                i.modifiers.ctrl && i.key_pressed(egui::Key::S),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if save {
            self.save();
        }
        if escape && self.session.surface().is_drawing() {
            self.session.abort_gesture();
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker(ctx);
        self.shortcuts(ctx);

        let class_field_released = self.toolbar(ctx);
        self.status_bar(ctx);
        self.class_legend(ctx);
        self.class_dialog(ctx, class_field_released);
        self.canvas(ctx);
    }
}
