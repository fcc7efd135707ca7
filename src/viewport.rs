//! Pan/zoom state for the diagram surface. Purely cosmetic: the host
//! applies it as a CSS-level transform over the last rendered content,
//! and nothing here ever triggers a re-render or touches the render
//! cache.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PanOffset {
    pub x: f32,
    pub y: f32,
}

pub const MIN_SCALE: f32 = 0.3;
pub const MAX_SCALE: f32 = 3.0;

/// Minimum pinch-center movement before two-finger drag pans.
const PINCH_PAN_THRESHOLD: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub pan: PanOffset,
    /// Scroll-down zooms in when set (the editor default).
    pub wheel_zoom_in_on_scroll_down: bool,
    drag_origin: Option<PanOffset>,
    pinch: Option<PinchState>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PinchState {
    initial_distance: f32,
    initial_scale: f32,
    last_center: Option<(f32, f32)>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            pan: PanOffset::default(),
            wheel_zoom_in_on_scroll_down: true,
            drag_origin: None,
            pinch: None,
        }
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    }

    pub fn wheel(&mut self, delta_y: f32) {
        let zoom_in = (delta_y > 0.0) == self.wheel_zoom_in_on_scroll_down;
        let factor = if zoom_in { 1.1 } else { 0.9 };
        self.set_scale(self.scale * factor);
    }

    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.drag_origin = Some(PanOffset {
            x: x - self.pan.x,
            y: y - self.pan.y,
        });
    }

    pub fn drag_to(&mut self, x: f32, y: f32) {
        if let Some(origin) = self.drag_origin {
            self.pan = PanOffset {
                x: x - origin.x,
                y: y - origin.y,
            };
        }
    }

    pub fn end_drag(&mut self) {
        self.drag_origin = None;
    }

    pub fn is_panning(&self) -> bool {
        self.drag_origin.is_some()
    }

    pub fn begin_pinch(&mut self, distance: f32) {
        self.pinch = Some(PinchState {
            initial_distance: distance,
            initial_scale: self.scale,
            last_center: None,
        });
    }

    /// Two-finger gesture update: fingers moving together zoom in,
    /// apart zoom out; center movement beyond a small threshold pans.
    pub fn pinch(&mut self, distance: f32, center: (f32, f32)) {
        let Some(mut pinch) = self.pinch else {
            return;
        };
        if pinch.initial_distance > 0.0 && distance > 0.0 {
            let ratio = pinch.initial_distance / distance;
            self.set_scale(pinch.initial_scale * ratio);
        }
        if let Some((last_x, last_y)) = pinch.last_center {
            let delta_x = center.0 - last_x;
            let delta_y = center.1 - last_y;
            if delta_x.abs() > PINCH_PAN_THRESHOLD || delta_y.abs() > PINCH_PAN_THRESHOLD {
                self.pan.x += delta_x / self.scale;
                self.pan.y += delta_y / self.scale;
            }
        }
        pinch.last_center = Some(center);
        self.pinch = Some(pinch);
    }

    pub fn end_pinch(&mut self) {
        self.pinch = None;
    }

    /// Scales the content to fit the container without upscaling, and
    /// recenters.
    pub fn zoom_to_fit(
        &mut self,
        container_width: f32,
        container_height: f32,
        content_width: f32,
        content_height: f32,
    ) {
        if content_width <= 0.0 || content_height <= 0.0 {
            return;
        }
        let fit = (container_width / content_width)
            .min(container_height / content_height)
            .min(1.0);
        self.set_scale(fit);
        self.pan = PanOffset::default();
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.pan = PanOffset::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_zoom_respects_direction_setting() {
        let mut viewport = Viewport::new();
        viewport.wheel(10.0);
        assert!(viewport.scale > 1.0);

        let mut reversed = Viewport::new();
        reversed.wheel_zoom_in_on_scroll_down = false;
        reversed.wheel(10.0);
        assert!(reversed.scale < 1.0);
    }

    #[test]
    fn scale_is_clamped() {
        let mut viewport = Viewport::new();
        for _ in 0..100 {
            viewport.wheel(10.0);
        }
        assert_eq!(viewport.scale, MAX_SCALE);
        for _ in 0..100 {
            viewport.wheel(-10.0);
        }
        assert_eq!(viewport.scale, MIN_SCALE);
    }

    #[test]
    fn drag_pans_relative_to_origin() {
        let mut viewport = Viewport::new();
        viewport.begin_drag(100.0, 100.0);
        viewport.drag_to(130.0, 80.0);
        assert_eq!(viewport.pan, PanOffset { x: 30.0, y: -20.0 });
        viewport.end_drag();
        assert!(!viewport.is_panning());

        // A second drag continues from the current offset.
        viewport.begin_drag(0.0, 0.0);
        viewport.drag_to(10.0, 10.0);
        assert_eq!(viewport.pan, PanOffset { x: 40.0, y: -10.0 });
    }

    #[test]
    fn pinch_zooms_reversed_and_pans() {
        let mut viewport = Viewport::new();
        viewport.begin_pinch(100.0);
        // Fingers moving together: distance halves, scale doubles.
        viewport.pinch(50.0, (0.0, 0.0));
        assert_eq!(viewport.scale, 2.0);
        viewport.pinch(50.0, (20.0, 0.0));
        assert_eq!(viewport.pan.x, 10.0);
        viewport.end_pinch();
    }

    #[test]
    fn zoom_to_fit_never_upscales() {
        let mut viewport = Viewport::new();
        viewport.pan = PanOffset { x: 50.0, y: 50.0 };
        viewport.zoom_to_fit(800.0, 600.0, 400.0, 300.0);
        assert_eq!(viewport.scale, 1.0);
        assert_eq!(viewport.pan, PanOffset::default());

        viewport.zoom_to_fit(400.0, 300.0, 800.0, 900.0);
        assert!((viewport.scale - (300.0 / 900.0)).abs() < 1e-6);
    }

    #[test]
    fn reset_restores_identity() {
        let mut viewport = Viewport::new();
        viewport.wheel(10.0);
        viewport.begin_drag(0.0, 0.0);
        viewport.drag_to(25.0, 25.0);
        viewport.reset();
        assert_eq!(viewport.scale, 1.0);
        assert_eq!(viewport.pan, PanOffset::default());
    }
}
