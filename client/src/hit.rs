//! Screen-space hit testing for clickable overlay items.

use nestmap_shared::geo::{self, LatLon};
use nestmap_shared::popup::PopupTarget;
use nestmap_shared::style::SPAWN_RADIUS_METERS;
use nestmap_shared::{NestRecord, OverlaySet, SpawnRecord};

use crate::viewport::Viewport;

/// Half-size of a nest icon on screen.
pub const NEST_ICON_RADIUS_PX: f64 = 16.0;
/// Spawn circles stay clickable when their ground radius shrinks below this.
pub const MIN_SPAWN_HIT_RADIUS_PX: f64 = 6.0;

/// Screen radius of a spawn circle at the current zoom.
pub fn spawn_radius_px(vp: &Viewport, lat: f64) -> f64 {
    SPAWN_RADIUS_METERS / geo::meters_per_pixel(lat, vp.zoom())
}

fn distance_sq(vp: &Viewport, lat: f64, lon: f64, sx: f64, sy: f64) -> f64 {
    let (px, py) = vp.point_to_screen(LatLon::new(lat, lon));
    (px - sx).powi(2) + (py - sy).powi(2)
}

fn nearest_nest<'a>(
    nests: &'a [NestRecord],
    vp: &Viewport,
    sx: f64,
    sy: f64,
) -> Option<&'a NestRecord> {
    let limit = NEST_ICON_RADIUS_PX * NEST_ICON_RADIUS_PX;
    nests
        .iter()
        .map(|nest| (nest, distance_sq(vp, nest.lat, nest.lon, sx, sy)))
        .filter(|(_, d)| *d <= limit)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(nest, _)| nest)
}

fn nearest_spawn(spawns: &[SpawnRecord], vp: &Viewport, sx: f64, sy: f64) -> Option<usize> {
    spawns
        .iter()
        .enumerate()
        .filter_map(|(idx, spawn)| {
            let radius = spawn_radius_px(vp, spawn.lat).max(MIN_SPAWN_HIT_RADIUS_PX);
            let d = distance_sq(vp, spawn.lat, spawn.lon, sx, sy);
            (d <= radius * radius).then_some((idx, d))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(idx, _)| idx)
}

/// Topmost popup-bearing item under the cursor. Nest markers draw above spawns.
pub fn hit_test(overlays: &OverlaySet, vp: &Viewport, sx: f64, sy: f64) -> Option<PopupTarget> {
    if let Some(nest) = nearest_nest(overlays.nests.visible_items(), vp, sx, sy) {
        return Some(PopupTarget::Nest(nest.key()));
    }
    nearest_spawn(overlays.spawns.visible_items(), vp, sx, sy).map(PopupTarget::Spawn)
}

/// Screen anchor of a popup target, if it still resolves.
pub fn target_anchor(overlays: &OverlaySet, target: &PopupTarget) -> Option<LatLon> {
    match target {
        PopupTarget::Nest(key) => overlays
            .nest_by_key(key)
            .map(|nest| LatLon::new(nest.lat, nest.lon)),
        PopupTarget::Spawn(idx) => overlays
            .spawns
            .items()
            .get(*idx)
            .map(|spawn| LatLon::new(spawn.lat, spawn.lon)),
    }
}

/// Pan needed to bring a popup box anchored above `(ax, ay)` inside the canvas.
pub fn autopan_delta(
    ax: f64,
    ay: f64,
    popup_w: f64,
    popup_h: f64,
    canvas_w: f64,
    canvas_h: f64,
    padding: f64,
) -> (f64, f64) {
    let left = ax - popup_w / 2.0;
    let right = ax + popup_w / 2.0;
    let top = ay - popup_h;

    let dx = if left < padding {
        padding - left
    } else if right > canvas_w - padding {
        (canvas_w - padding) - right
    } else {
        0.0
    };
    let dy = if top < padding {
        padding - top
    } else if ay > canvas_h - padding {
        (canvas_h - padding) - ay
    } else {
        0.0
    };
    (dx, dy)
}
