use nestmap_shared::geo::{self, LatLon};
use nestmap_shared::map_config::{MAX_ZOOM, MIN_ZOOM, clamp_zoom};

/// Pan/zoom transform from world coordinates to screen pixels.
///
/// World coordinates are Web-Mercator pixels at zoom 0 (a 256x256 square),
/// so `scale` is `2^zoom`.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

pub const LOCATE_ZOOM: f64 = 16.0;
const ZOOM_SENSITIVITY: f64 = 0.001;

fn min_scale() -> f64 {
    MIN_ZOOM.exp2()
}

fn max_scale() -> f64 {
    MAX_ZOOM.exp2()
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: min_scale(),
        }
    }
}

impl Viewport {
    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (
            wx * self.scale + self.offset_x,
            wy * self.scale + self.offset_y,
        )
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    pub fn point_to_screen(&self, point: LatLon) -> (f64, f64) {
        let (wx, wy) = geo::project(point, 0.0);
        self.world_to_screen(wx, wy)
    }

    pub fn screen_to_point(&self, sx: f64, sy: f64) -> LatLon {
        let (wx, wy) = self.screen_to_world(sx, sy);
        geo::unproject(wx, wy, 0.0)
    }

    pub fn zoom(&self) -> f64 {
        self.scale.log2()
    }

    /// Integer zoom whose tiles best match the current scale.
    pub fn tile_zoom(&self) -> u8 {
        clamp_zoom(self.zoom().round()) as u8
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) {
        let factor = (-delta * ZOOM_SENSITIVITY).exp();
        self.scale_at(self.scale * factor, screen_x, screen_y);
    }

    /// Step whole zoom levels, keeping the canvas center fixed.
    pub fn zoom_step(&mut self, steps: f64, canvas_w: f64, canvas_h: f64) {
        let target = (self.zoom().round() + steps).exp2();
        self.scale_at(target, canvas_w / 2.0, canvas_h / 2.0);
    }

    fn scale_at(&mut self, scale: f64, screen_x: f64, screen_y: f64) {
        let new_scale = scale.clamp(min_scale(), max_scale());
        let ratio = new_scale / self.scale;

        // Keep the point under the cursor fixed.
        self.offset_x = screen_x - (screen_x - self.offset_x) * ratio;
        self.offset_y = screen_y - (screen_y - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Place `center` in the middle of the canvas at `zoom`.
    pub fn center_on(&mut self, center: LatLon, zoom: f64, canvas_w: f64, canvas_h: f64) {
        self.scale = clamp_zoom(zoom).exp2();
        let (wx, wy) = geo::project(center, 0.0);
        self.offset_x = canvas_w / 2.0 - wx * self.scale;
        self.offset_y = canvas_h / 2.0 - wy * self.scale;
    }

    pub fn center(&self, canvas_w: f64, canvas_h: f64) -> LatLon {
        self.screen_to_point(canvas_w / 2.0, canvas_h / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn center_on_puts_point_mid_canvas() {
        let mut vp = Viewport::default();
        let paris = LatLon::new(48.8566, 2.3522);
        vp.center_on(paris, 13.0, 800.0, 600.0);

        let (sx, sy) = vp.point_to_screen(paris);
        assert_close(sx, 400.0);
        assert_close(sy, 300.0);
        assert_close(vp.zoom(), 13.0);

        let back = vp.center(800.0, 600.0);
        assert_close(back.lat, paris.lat);
        assert_close(back.lon, paris.lon);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(0.0, 0.0), 25.0, 100.0, 100.0);
        assert_close(vp.zoom(), MAX_ZOOM);

        vp.zoom_at(1e6, 50.0, 50.0);
        assert_close(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn zoom_at_keeps_focus_point_fixed() {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(10.0, 10.0), 10.0, 800.0, 600.0);
        let before = vp.screen_to_world(120.0, 80.0);
        vp.zoom_at(-300.0, 120.0, 80.0);
        let after = vp.screen_to_world(120.0, 80.0);
        assert_close(before.0, after.0);
        assert_close(before.1, after.1);
    }

    #[test]
    fn zoom_step_snaps_to_whole_levels() {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(0.0, 0.0), 12.4, 800.0, 600.0);
        vp.zoom_step(1.0, 800.0, 600.0);
        assert_close(vp.zoom(), 13.0);
        assert_eq!(vp.tile_zoom(), 13);
    }
}
