use std::sync::Arc;

use eframe::egui::{self, Sense, TextureHandle, TextureOptions};

use crate::codec::decode_for_display;
use crate::error::LabResult;
use crate::viewport::ViewportController;

const TOOLBAR_BUTTON_SIZE: egui::Vec2 = egui::vec2(28.0, 22.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomableAction {
    Fullscreen,
    Download,
}

/// A displayed image with its own zoom/pan state.
///
/// A new instance is built whenever the displayed image changes, which also
/// starts it from a fresh [`ViewportController`].
pub struct ZoomableImage {
    alt: String,
    bytes: Arc<[u8]>,
    texture: TextureHandle,
    viewport: ViewportController,
}

impl ZoomableImage {
    pub fn new(
        ctx: &egui::Context,
        texture_name: String,
        alt: &str,
        bytes: Arc<[u8]>,
    ) -> LabResult<Self> {
        let color_image = decode_for_display(&bytes)?;
        let texture = ctx.load_texture(texture_name, color_image, TextureOptions::LINEAR);
        Ok(Self {
            alt: alt.to_string(),
            bytes,
            texture,
            viewport: ViewportController::new(),
        })
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn texture(&self) -> &TextureHandle {
        &self.texture
    }

    pub fn show(&mut self, ui: &mut egui::Ui, max_height: f32) -> Option<ZoomableAction> {
        let mut action = None;
        let image_size = self.texture.size_vec2();
        let width = ui.available_width().max(1.0);
        let height = if image_size.x > 0.0 {
            (width * image_size.y / image_size.x).min(max_height)
        } else {
            max_height
        }
        .max(64.0);

        let (canvas_rect, response) =
            ui.allocate_exact_size(egui::vec2(width, height), Sense::click_and_drag());
        self.handle_pointer(ui, &response);

        let painter = ui.painter_at(canvas_rect);
        painter.rect_filled(canvas_rect, 6.0, ui.visuals().extreme_bg_color);
        let image_rect = self.viewport.image_rect(canvas_rect.shrink(4.0), image_size);
        painter.image(
            self.texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::Pos2::ZERO, egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        ui.horizontal(|ui| {
            if ui
                .add_sized(TOOLBAR_BUTTON_SIZE, egui::Button::new("+"))
                .on_hover_text("Zoom In")
                .clicked()
            {
                self.viewport.zoom_in();
            }
            if ui
                .add_sized(TOOLBAR_BUTTON_SIZE, egui::Button::new("-"))
                .on_hover_text("Zoom Out")
                .clicked()
            {
                self.viewport.zoom_out();
            }
            let moved = self.viewport.is_zoomed() || self.viewport.offset() != egui::Vec2::ZERO;
            if ui
                .add_enabled(moved, egui::Button::new("1:1").min_size(TOOLBAR_BUTTON_SIZE))
                .on_hover_text("Reset Zoom")
                .clicked()
            {
                self.viewport.reset();
            }
            ui.label(format!("{:.0}%", self.viewport.zoom() * 100.0));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Download").clicked() {
                    action = Some(ZoomableAction::Download);
                }
                if ui.button("Fullscreen").clicked() {
                    action = Some(ZoomableAction::Fullscreen);
                }
            });
        });

        action
    }

    fn handle_pointer(&mut self, ui: &egui::Ui, response: &egui::Response) {
        if response.drag_started() {
            if let Some(pointer) = response.interact_pointer_pos() {
                self.viewport.begin_drag(pointer);
            }
        }
        if response.dragged() {
            if let Some(pointer) = response.interact_pointer_pos() {
                self.viewport.drag_to(pointer);
            }
        }
        if response.drag_stopped() {
            self.viewport.end_drag();
        }
        if response.double_clicked() {
            self.viewport.reset();
        }

        if response.hovered() {
            if let Some(delta_y) = ui.input_mut(take_wheel_delta) {
                self.viewport.wheel(delta_y);
            }

            if self.viewport.is_dragging() {
                ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
            } else if self.viewport.is_zoomed() {
                ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
            }
        }
    }
}

/// Takes the vertical wheel delta so an enclosing scroll area does not also
/// scroll. egui reports scroll-up as positive y; the returned delta follows
/// the browser convention where scroll-up is negative.
fn take_wheel_delta(input: &mut egui::InputState) -> Option<f32> {
    let scroll_y = input.raw_scroll_delta.y;
    input.raw_scroll_delta.y = 0.0;
    input.smooth_scroll_delta.y = 0.0;
    (scroll_y.abs() > f32::EPSILON).then_some(-scroll_y)
}
