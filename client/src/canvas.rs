use std::cell::{Cell, RefCell};
use std::f64::consts::TAU;
use std::rc::Rc;

use leptos::prelude::*;
use nestmap_shared::geo::LatLon;
use nestmap_shared::style::{
    DEFAULT_STROKE, ShapeStyle, cell_style, park_style, scan_area_style, spawn_style,
};
use nestmap_shared::{LoadStatus, MapConfig, NestRecord, OverlaySet, PolygonRecord};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use crate::app::{Located, OpenPopup, PopupClock};
use crate::hit::{hit_test, spawn_radius_px};
use crate::icons::{ICON_SIZE_PX, IconCache, IconState, ensure_icons};
use crate::popup::{close_popup, open_popup};
use crate::render_loop::RenderScheduler;
use crate::tiles::{BASE_LAYER_OPACITY, TileLoader, TileMap, tile_screen_rect, visible_tiles};
use crate::viewport::Viewport;

/// Leaflet's container gray, seen behind the translucent base layer.
const MAP_BACKGROUND: &str = "#dddddd";
/// Pointer travel below which a press counts as a click.
const CLICK_SLOP_PX: f64 = 5.0;
const NEST_DOT_RADIUS_PX: f64 = 6.0;

struct Frame<'a> {
    ctx: &'a CanvasRenderingContext2d,
    vp: &'a Viewport,
    w: f64,
    h: f64,
}

impl Frame<'_> {
    fn on_screen(&self, sx: f64, sy: f64, margin: f64) -> bool {
        sx >= -margin && sy >= -margin && sx <= self.w + margin && sy <= self.h + margin
    }

    /// Screen bounding box test for a coordinate ring.
    fn ring_visible(&self, coords: &[[f64; 2]]) -> bool {
        let (mut min_x, mut min_y, mut max_x, mut max_y) =
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for pair in coords {
            let (sx, sy) = self.vp.point_to_screen(LatLon::from_pair(*pair));
            min_x = min_x.min(sx);
            min_y = min_y.min(sy);
            max_x = max_x.max(sx);
            max_y = max_y.max(sy);
        }
        !coords.is_empty() && max_x >= 0.0 && max_y >= 0.0 && min_x <= self.w && min_y <= self.h
    }

    fn trace_ring(&self, coords: &[[f64; 2]], close: bool) {
        self.ctx.begin_path();
        for (i, pair) in coords.iter().enumerate() {
            let (sx, sy) = self.vp.point_to_screen(LatLon::from_pair(*pair));
            if i == 0 {
                self.ctx.move_to(sx, sy);
            } else {
                self.ctx.line_to(sx, sy);
            }
        }
        if close {
            self.ctx.close_path();
        }
    }

    fn paint(&self, style: ShapeStyle) {
        if let Some(fill_opacity) = style.fill_opacity {
            self.ctx.set_global_alpha(fill_opacity);
            self.ctx.set_fill_style_str(style.stroke);
            self.ctx.fill();
            self.ctx.set_global_alpha(1.0);
        }
        self.ctx.set_stroke_style_str(style.stroke);
        self.ctx.set_line_width(style.weight);
        self.ctx.stroke();
    }

    fn draw_polygons(&self, polygons: &[PolygonRecord], style: ShapeStyle) {
        for polygon in polygons {
            if polygon.coords.len() < 2 || !self.ring_visible(&polygon.coords) {
                continue;
            }
            self.trace_ring(&polygon.coords, true);
            self.paint(style);
        }
    }

    fn draw_tiles(&self, tiles: &TileMap) {
        self.ctx.set_global_alpha(BASE_LAYER_OPACITY);
        for coord in visible_tiles(self.vp, self.w, self.h) {
            let Some(tile) = tiles.get(&coord) else {
                continue;
            };
            let (sx, sy, sw, sh) = tile_screen_rect(self.vp, coord);
            self.ctx
                .draw_image_with_html_image_element_and_dw_and_dh(&tile.image, sx, sy, sw, sh)
                .ok();
        }
        self.ctx.set_global_alpha(1.0);
    }

    fn draw_overlays(&self, set: &OverlaySet, icons: &IconCache) {
        self.ctx.set_line_join("round");
        self.ctx.set_line_cap("round");

        for area in set.scan_area.visible_items() {
            let Some(style) = scan_area_style(area.kind) else {
                continue;
            };
            if area.coords.len() < 2 || !self.ring_visible(&area.coords) {
                continue;
            }
            self.trace_ring(&area.coords, false);
            self.paint(style);
        }

        self.draw_polygons(set.cells.visible_items(), cell_style());
        self.draw_polygons(set.parks.visible_items(), park_style());

        for spawn in set.spawns.visible_items() {
            let (sx, sy) = self.vp.point_to_screen(LatLon::new(spawn.lat, spawn.lon));
            let radius = spawn_radius_px(self.vp, spawn.lat);
            if !self.on_screen(sx, sy, radius) {
                continue;
            }
            self.ctx.begin_path();
            self.ctx.arc(sx, sy, radius, 0.0, TAU).ok();
            self.paint(spawn_style(spawn));
        }

        for nest in set.nests.visible_items() {
            self.draw_nest(nest, icons);
        }
    }

    fn draw_nest(&self, nest: &NestRecord, icons: &IconCache) {
        let (sx, sy) = self.vp.point_to_screen(LatLon::new(nest.lat, nest.lon));
        if !self.on_screen(sx, sy, ICON_SIZE_PX) {
            return;
        }
        let icon = nest.pokemon_id.and_then(|id| match icons.get(&id) {
            Some(IconState::Ready(image)) => Some(image),
            _ => None,
        });
        match icon {
            Some(image) => {
                let half = ICON_SIZE_PX / 2.0;
                self.ctx
                    .draw_image_with_html_image_element_and_dw_and_dh(
                        image,
                        sx - half,
                        sy - half,
                        ICON_SIZE_PX,
                        ICON_SIZE_PX,
                    )
                    .ok();
            }
            None => {
                self.ctx.begin_path();
                self.ctx.arc(sx, sy, NEST_DOT_RADIUS_PX, 0.0, TAU).ok();
                self.ctx.set_fill_style_str(DEFAULT_STROKE);
                self.ctx.fill();
                self.ctx.set_stroke_style_str("#ffffff");
                self.ctx.set_line_width(2.0);
                self.ctx.stroke();
            }
        }
    }

    fn draw_location(&self, here: LatLon) {
        let (sx, sy) = self.vp.point_to_screen(here);
        if !self.on_screen(sx, sy, 20.0) {
            return;
        }
        self.ctx.begin_path();
        self.ctx.arc(sx, sy, 14.0, 0.0, TAU).ok();
        self.ctx.set_global_alpha(0.2);
        self.ctx.set_fill_style_str(DEFAULT_STROKE);
        self.ctx.fill();
        self.ctx.set_global_alpha(1.0);
        self.ctx.begin_path();
        self.ctx.arc(sx, sy, 6.0, 0.0, TAU).ok();
        self.ctx.set_fill_style_str(DEFAULT_STROKE);
        self.ctx.fill();
        self.ctx.set_stroke_style_str("#ffffff");
        self.ctx.set_line_width(2.0);
        self.ctx.stroke();
    }
}

fn local_point(
    canvas_ref: NodeRef<leptos::html::Canvas>,
    client_x: f64,
    client_y: f64,
) -> (f64, f64) {
    canvas_ref
        .get_untracked()
        .map(|el| {
            let rect = el.get_bounding_client_rect();
            (client_x - rect.left(), client_y - rect.top())
        })
        .unwrap_or((client_x, client_y))
}

#[component]
pub fn MapCanvas() -> impl IntoView {
    let viewport: RwSignal<Viewport> = expect_context();
    let overlays: RwSignal<OverlaySet> = expect_context();
    let map_config: RwSignal<MapConfig> = expect_context();
    let tiles: RwSignal<TileMap> = expect_context();
    let icons: RwSignal<IconCache> = expect_context();
    let popup: OpenPopup = expect_context();
    let clock: PopupClock = expect_context();
    let Located(located) = expect_context();

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let tile_loader = TileLoader::new(tiles);

    // Track drag state
    let is_dragging = Rc::new(Cell::new(false));
    let drag_start_x = Rc::new(Cell::new(0.0f64));
    let drag_start_y = Rc::new(Cell::new(0.0f64));
    let last_x = Rc::new(Cell::new(0.0f64));
    let last_y = Rc::new(Cell::new(0.0f64));

    // Track pinch state
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    // Cached 2D context (invalidated on canvas resize)
    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));

    let loader_render = tile_loader.clone();
    let scheduler = RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return;
        };
        let canvas: &HtmlCanvasElement = &canvas;
        let Some(parent) = canvas.parent_element() else {
            return;
        };
        let w = parent.client_width() as f64;
        let h = parent.client_height() as f64;
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let dpr = web_sys::window()
            .map(|win| win.device_pixel_ratio())
            .unwrap_or(1.0)
            .max(1.0);
        let cw = (w * dpr).round() as u32;
        let ch = (h * dpr).round() as u32;
        if canvas.width() != cw || canvas.height() != ch {
            canvas.set_width(cw);
            canvas.set_height(ch);
            // Resizing resets 2D context state.
            *cached_ctx.borrow_mut() = None;
        }

        let ctx = {
            let mut ctx_cache = cached_ctx.borrow_mut();
            if ctx_cache.is_none() {
                let Some(ctx) = canvas
                    .get_context("2d")
                    .ok()
                    .flatten()
                    .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
                else {
                    return;
                };
                *ctx_cache = Some(ctx);
            }
            let Some(ctx) = ctx_cache.clone() else {
                return;
            };
            ctx
        };
        // All drawing stays in CSS pixel coords.
        ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();

        let vp = viewport.get_untracked();
        loader_render.request_visible(&vp, w, h);

        ctx.set_fill_style_str(MAP_BACKGROUND);
        ctx.fill_rect(0.0, 0.0, w, h);

        let frame = Frame {
            ctx: &ctx,
            vp: &vp,
            w,
            h,
        };
        tiles.with_untracked(|tiles| frame.draw_tiles(tiles));
        overlays.with_untracked(|set| icons.with_untracked(|icons| frame.draw_overlays(set, icons)));
        if let Some(here) = located.get_untracked() {
            frame.draw_location(here);
        }
    });
    let scheduler = Rc::new(scheduler);

    Effect::new({
        let loader = tile_loader.clone();
        let sched = scheduler.clone();
        move || {
            map_config.with(|config| loader.set_template(&config.provider_url));
            sched.mark_dirty();
        }
    });

    // Nest icons load once the nest records arrive.
    Effect::new(move || {
        let ids: Vec<u16> = overlays.with(|set| {
            if !matches!(set.nests.state.status(), LoadStatus::Ready(_)) {
                return Vec::new();
            }
            set.nests.items().iter().filter_map(|n| n.pokemon_id).collect()
        });
        if !ids.is_empty() {
            ensure_icons(icons, ids);
        }
    });

    Effect::new({
        let sched = scheduler.clone();
        move || {
            viewport.track();
            overlays.track();
            tiles.track();
            icons.track();
            located.track();
            sched.mark_dirty();
        }
    });

    // Repaint on window resize.
    let resize_listener = window_event_listener(leptos::ev::resize, {
        let sched = scheduler.clone();
        move |_| sched.mark_dirty()
    });
    on_cleanup(move || resize_listener.remove());

    // --- Input handlers ---

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let delta = e.delta_y();
        let (x, y) = local_point(canvas_ref, e.client_x() as f64, e.client_y() as f64);
        viewport.update(|vp| vp.zoom_at(delta, x, y));
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            drag_start_x.set(e.client_x() as f64);
            drag_start_y.set(e.client_y() as f64);
            last_x.set(e.client_x() as f64);
            last_y.set(e.client_y() as f64);

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let dx = e.client_x() as f64 - last_x.get();
                let dy = e.client_y() as f64 - last_y.get();
                last_x.set(e.client_x() as f64);
                last_y.set(e.client_y() as f64);
                viewport.update(|vp| vp.pan(dx, dy));
                return;
            }

            let (x, y) = local_point(canvas_ref, e.client_x() as f64, e.client_y() as f64);
            let over_item = viewport.with_untracked(|vp| {
                overlays.with_untracked(|set| hit_test(set, vp, x, y).is_some())
            });
            if let Some(canvas) = canvas_ref.get_untracked() {
                let el: &web_sys::HtmlElement = &canvas;
                let cursor = if over_item { "pointer" } else { "grab" };
                el.style().set_property("cursor", cursor).ok();
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        move |e: MouseEvent| {
            let dx = (e.client_x() as f64 - drag_start_x.get()).abs();
            let dy = (e.client_y() as f64 - drag_start_y.get()).abs();
            if dx >= CLICK_SLOP_PX || dy >= CLICK_SLOP_PX {
                return;
            }
            let (x, y) = local_point(canvas_ref, e.client_x() as f64, e.client_y() as f64);
            let hit = viewport
                .with_untracked(|vp| overlays.with_untracked(|set| hit_test(set, vp, x, y)));
            match hit {
                Some(target) => open_popup(target, popup, clock, overlays, viewport),
                None => close_popup(popup),
            }
        }
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = (t1.client_x() - t0.client_x()) as f64;
                let dy = (t1.client_y() - t0.client_y()) as f64;
                pinch_dist.set((dx * dx + dy * dy).sqrt());
            }
        }
    };

    let on_touch_move = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = (t1.client_x() - t0.client_x()) as f64;
                let dy = (t1.client_y() - t0.client_y()) as f64;
                let new_dist = (dx * dx + dy * dy).sqrt();
                let old_dist = pinch_dist.get();

                if old_dist > 0.0 {
                    let (mid_x, mid_y) = local_point(
                        canvas_ref,
                        (t0.client_x() + t1.client_x()) as f64 / 2.0,
                        (t0.client_y() + t1.client_y()) as f64 / 2.0,
                    );
                    let delta = -(new_dist - old_dist) * 2.0;
                    viewport.update(|vp| vp.zoom_at(delta, mid_x, mid_y));
                }

                pinch_dist.set(new_dist);
            }
        }
    };

    view! {
        <div
            style="position: absolute; inset: 0; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:click=on_click
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
        </div>
    }
}
