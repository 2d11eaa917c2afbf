use egui::{Pos2, Rect, Vec2};

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 5.0;
pub const ZOOM_STEP: f32 = 1.2;

// Absorbs f32 drift so that N zoom-ins followed by N zoom-outs lands on 1.0.
const ZOOM_SNAP_TOLERANCE: f32 = 1e-3;

/// Zoom, pan and drag state for a single displayed image.
///
/// The offset only moves while a drag is active on a magnified image, and
/// zooming back out to the baseline always re-centers.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    zoom: f32,
    offset: Vec2,
    dragging: bool,
    drag_origin: Pos2,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportController {
    pub fn new() -> Self {
        Self {
            zoom: MIN_ZOOM,
            offset: Vec2::ZERO,
            dragging: false,
            drag_origin: Pos2::ZERO,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoom > MIN_ZOOM
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        let next = self.zoom / ZOOM_STEP;
        if next <= MIN_ZOOM + ZOOM_SNAP_TOLERANCE {
            self.reset();
        } else {
            self.zoom = next;
        }
    }

    pub fn reset(&mut self) {
        self.zoom = MIN_ZOOM;
        self.offset = Vec2::ZERO;
    }

    pub fn begin_drag(&mut self, pointer: Pos2) {
        if !self.is_zoomed() {
            return;
        }
        self.drag_origin = pointer - self.offset;
        self.dragging = true;
    }

    /// Panning is unbounded: the image may be dragged past its
    /// rendered extent.
    pub fn drag_to(&mut self, pointer: Pos2) {
        if !self.dragging || !self.is_zoomed() {
            return;
        }
        self.offset = pointer - self.drag_origin;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// Scroll up zooms in, anything else zooms out.
    pub fn wheel(&mut self, delta_y: f32) {
        if delta_y < 0.0 {
            self.zoom_in();
        } else {
            self.zoom_out();
        }
    }

    /// Screen rectangle for an image fitted into `canvas`, then scaled and
    /// translated by the current zoom and offset.
    pub fn image_rect(&self, canvas: Rect, image_size: Vec2) -> Rect {
        let fit_scale = if image_size.x > 0.0 && image_size.y > 0.0 {
            (canvas.width() / image_size.x)
                .min(canvas.height() / image_size.y)
                .max(0.01)
        } else {
            1.0
        };
        let draw_size = image_size * fit_scale * self.zoom;
        Rect::from_center_size(canvas.center() + self.offset, draw_size)
    }
}
