#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use js_sys::Reflect;
use leptos::prelude::*;
use nestmap_shared::geo::{TILE_SIZE, TileCoord, tiles_covering};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

use crate::viewport::Viewport;

const MAX_CONCURRENCY: usize = 6;
/// Decoded tiles kept around for panning back; older ones are evicted first.
const MAX_CACHED_TILES: usize = 384;
pub const BASE_LAYER_OPACITY: f64 = 0.75;
const ONLOAD_HANDLE_KEY: &str = "__nestmapTileOnload";
const ONERROR_HANDLE_KEY: &str = "__nestmapTileOnerror";

#[derive(Clone)]
pub struct LoadedTile {
    pub coord: TileCoord,
    pub image: HtmlImageElement,
    /// Load order, used for eviction.
    pub seq: u64,
}

pub type TileMap = HashMap<TileCoord, LoadedTile>;

/// Raster tile fetcher for the base layer.
///
/// A coordinate is queued again once its tile has been evicted. A failed tile
/// stays blank until it leaves the view.
#[derive(Clone)]
pub struct TileLoader {
    tiles_signal: RwSignal<TileMap>,
    template: Rc<RefCell<String>>,
    queue: Rc<RefCell<VecDeque<TileCoord>>>,
    book: Rc<RefCell<TileBook>>,
    in_flight: Rc<Cell<usize>>,
    next_seq: Rc<Cell<u64>>,
}

impl TileLoader {
    pub fn new(tiles_signal: RwSignal<TileMap>) -> Self {
        Self {
            tiles_signal,
            template: Rc::new(RefCell::new(String::new())),
            queue: Rc::new(RefCell::new(VecDeque::new())),
            book: Rc::new(RefCell::new(TileBook::default())),
            in_flight: Rc::new(Cell::new(0)),
            next_seq: Rc::new(Cell::new(0)),
        }
    }

    /// Switch the provider template. Tiles of a previous provider are dropped.
    pub fn set_template(&self, template: &str) {
        if *self.template.borrow() == template {
            return;
        }
        *self.template.borrow_mut() = template.to_owned();
        self.queue.borrow_mut().clear();
        *self.book.borrow_mut() = TileBook::default();
        self.tiles_signal.set(HashMap::new());
    }

    /// Queue the tiles covering the view, nearest to the center first.
    pub fn request_visible(&self, vp: &Viewport, canvas_w: f64, canvas_h: f64) {
        if self.template.borrow().is_empty() {
            return;
        }
        let wanted = visible_tiles(vp, canvas_w, canvas_h);
        {
            let mut book = self.book.borrow_mut();
            let mut queue = self.queue.borrow_mut();
            // Tiles queued for a previous view are no longer urgent.
            book.drop_queued(queue.drain(..));
            let fresh = self
                .tiles_signal
                .with_untracked(|loaded| book.plan(&wanted, |coord| loaded.contains_key(coord)));
            queue.extend(fresh);
        }
        self.pump();
    }

    fn pump(&self) {
        while self.in_flight.get() < MAX_CONCURRENCY {
            let Some(coord) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            self.in_flight.set(self.in_flight.get() + 1);

            let loader = self.clone();
            let on_done: Rc<dyn Fn()> = Rc::new(move || {
                loader
                    .in_flight
                    .set(loader.in_flight.get().saturating_sub(1));
                loader.pump();
            });
            let src = coord.url(&self.template.borrow());
            self.load_tile(coord, src, on_done);
        }
    }

    fn load_tile(&self, coord: TileCoord, src: String, on_done: Rc<dyn Fn()>) {
        let img = match HtmlImageElement::new() {
            Ok(img) => img,
            Err(_) => {
                on_done();
                return;
            }
        };

        let img_for_load = img.clone();
        let on_done_load = on_done.clone();
        let tiles_signal = self.tiles_signal;
        let next_seq = self.next_seq.clone();
        let book = self.book.clone();
        let template = self.template.clone();
        let expected_template = template.borrow().clone();
        let onload = Closure::<dyn FnMut()>::new(move || {
            clear_image_handlers(&img_for_load);

            let img_for_decode = img_for_load.clone();
            let on_done_load = on_done_load.clone();
            let next_seq = next_seq.clone();
            let book = book.clone();
            let template = template.clone();
            let expected_template = expected_template.clone();

            wasm_bindgen_futures::spawn_local(async move {
                let _ = JsFuture::from(img_for_decode.decode()).await;
                // Provider switched while loading.
                if *template.borrow() == expected_template {
                    let seq = next_seq.get();
                    next_seq.set(seq + 1);
                    insert_tile(
                        tiles_signal,
                        LoadedTile {
                            coord,
                            image: img_for_decode,
                            seq,
                        },
                    );
                    book.borrow_mut().finish(coord, true);
                }
                on_done_load();
            });
        });

        let img_for_error = img.clone();
        let on_done_error = on_done.clone();
        let book_error = self.book.clone();
        let template_error = self.template.clone();
        let expected_error = self.template.borrow().clone();
        let onerror = Closure::<dyn FnMut()>::new(move || {
            clear_image_handlers(&img_for_error);
            if *template_error.borrow() == expected_error {
                book_error.borrow_mut().finish(coord, false);
            }
            on_done_error();
        });

        let onload_js = onload.into_js_value();
        let onerror_js = onerror.into_js_value();
        img.set_onload(Some(onload_js.unchecked_ref()));
        img.set_onerror(Some(onerror_js.unchecked_ref()));
        let _ = Reflect::set(
            img.as_ref(),
            &JsValue::from_str(ONLOAD_HANDLE_KEY),
            &onload_js,
        );
        let _ = Reflect::set(
            img.as_ref(),
            &JsValue::from_str(ONERROR_HANDLE_KEY),
            &onerror_js,
        );
        img.set_src(&src);
    }
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

/// Which coordinates are already queued, loading or known to fail.
#[derive(Debug, Default)]
struct TileBook {
    pending: HashSet<TileCoord>,
    failed: HashSet<TileCoord>,
}

impl TileBook {
    fn drop_queued(&mut self, stale: impl Iterator<Item = TileCoord>) {
        for coord in stale {
            self.pending.remove(&coord);
        }
    }

    /// Wanted coordinates that need a request, in `wanted` order.
    fn plan(
        &mut self,
        wanted: &[TileCoord],
        is_loaded: impl Fn(&TileCoord) -> bool,
    ) -> Vec<TileCoord> {
        // A failed tile gets another chance once it has scrolled out of view.
        self.failed.retain(|coord| wanted.contains(coord));
        wanted
            .iter()
            .copied()
            .filter(|coord| !is_loaded(coord) && !self.failed.contains(coord))
            .filter(|coord| self.pending.insert(*coord))
            .collect()
    }

    fn finish(&mut self, coord: TileCoord, loaded: bool) {
        self.pending.remove(&coord);
        if !loaded {
            self.failed.insert(coord);
        }
    }
}

fn insert_tile(tiles_signal: RwSignal<TileMap>, incoming: LoadedTile) {
    tiles_signal.update(|loaded| {
        loaded.insert(incoming.coord, incoming);
        for coord in eviction_order(loaded.values().map(|t| (t.coord, t.seq)), MAX_CACHED_TILES) {
            loaded.remove(&coord);
        }
    });
}

/// Oldest entries beyond `capacity`.
fn eviction_order(
    entries: impl Iterator<Item = (TileCoord, u64)>,
    capacity: usize,
) -> Vec<TileCoord> {
    let mut entries: Vec<_> = entries.collect();
    if entries.len() <= capacity {
        return Vec::new();
    }
    entries.sort_by_key(|(_, seq)| *seq);
    let excess = entries.len() - capacity;
    entries.into_iter().take(excess).map(|(coord, _)| coord).collect()
}

/// Tiles at the view's tile zoom covering the canvas, sorted by distance to its center.
pub fn visible_tiles(vp: &Viewport, canvas_w: f64, canvas_h: f64) -> Vec<TileCoord> {
    let z = vp.tile_zoom();
    let to_tile_px = (z as f64).exp2();
    let (min_x, min_y) = vp.screen_to_world(0.0, 0.0);
    let (max_x, max_y) = vp.screen_to_world(canvas_w, canvas_h);
    let mut tiles = tiles_covering(
        min_x * to_tile_px,
        min_y * to_tile_px,
        max_x * to_tile_px,
        max_y * to_tile_px,
        z,
    );

    let (cx, cy) = vp.screen_to_world(canvas_w / 2.0, canvas_h / 2.0);
    let (cx, cy) = (cx * to_tile_px, cy * to_tile_px);
    let dist = |t: &TileCoord| {
        let (ox, oy) = t.origin();
        let dx = ox + TILE_SIZE / 2.0 - cx;
        let dy = oy + TILE_SIZE / 2.0 - cy;
        dx * dx + dy * dy
    };
    tiles.sort_by(|a, b| dist(a).total_cmp(&dist(b)));
    tiles
}

/// Screen rectangle `(x, y, w, h)` of a tile, snapped outward to whole pixels.
pub fn tile_screen_rect(vp: &Viewport, coord: TileCoord) -> (f64, f64, f64, f64) {
    let world_size = TILE_SIZE / (coord.z as f64).exp2();
    let (ox, oy) = coord.origin();
    let wx = ox / (coord.z as f64).exp2();
    let wy = oy / (coord.z as f64).exp2();
    let (sx, sy) = vp.world_to_screen(wx, wy);
    let (ex, ey) = vp.world_to_screen(wx + world_size, wy + world_size);
    let sx = sx.floor();
    let sy = sy.floor();
    (sx, sy, ex.ceil() - sx, ey.ceil() - sy)
}

#[cfg(test)]
mod tests {
    use nestmap_shared::geo::LatLon;

    use super::*;

    #[test]
    fn visible_tiles_start_at_view_center() {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(0.0, 0.0), 3.0, 512.0, 512.0);
        let tiles = visible_tiles(&vp, 512.0, 512.0);
        // 512px view centered on the corner shared by four tiles at z3.
        assert_eq!(tiles.len(), 9);
        assert!(tiles.iter().all(|t| t.z == 3));
        let first_four: HashSet<_> = tiles[..4].iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(
            first_four,
            HashSet::from([(3, 3), (4, 3), (3, 4), (4, 4)])
        );
    }

    #[test]
    fn tile_rect_matches_tile_size_at_integer_zoom() {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(0.0, 0.0), 3.0, 512.0, 512.0);
        let (x, y, w, h) = tile_screen_rect(&vp, TileCoord { x: 4, y: 4, z: 3 });
        assert_eq!((x, y, w, h), (256.0, 256.0, 256.0, 256.0));
    }

    fn z3_view() -> Vec<TileCoord> {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(0.0, 0.0), 3.0, 512.0, 512.0);
        visible_tiles(&vp, 512.0, 512.0)
    }

    #[test]
    fn evicted_tiles_are_requested_again() {
        let wanted = z3_view();
        let mut book = TileBook::default();
        let first = book.plan(&wanted, |_| false);
        assert_eq!(first.len(), 9);

        // Still loading: nothing new to ask for.
        assert!(book.plan(&wanted, |_| false).is_empty());

        for coord in &first {
            book.finish(*coord, true);
        }
        assert!(book.plan(&wanted, |_| true).is_empty());

        // Every tile evicted from the cache.
        assert_eq!(book.plan(&wanted, |_| false), first);
    }

    #[test]
    fn dropped_queue_entries_can_be_planned_again() {
        let wanted = z3_view();
        let mut book = TileBook::default();
        let first = book.plan(&wanted, |_| false);
        book.drop_queued(first.iter().copied());
        assert_eq!(book.plan(&wanted, |_| false), first);
    }

    #[test]
    fn failed_tile_waits_until_it_leaves_the_view() {
        let wanted = z3_view();
        let broken = wanted[0];
        let mut book = TileBook::default();
        for coord in book.plan(&wanted, |_| false) {
            book.finish(coord, coord != broken);
        }
        assert!(book.plan(&wanted, |c| *c != broken).is_empty());

        let elsewhere = vec![TileCoord { x: 0, y: 0, z: 3 }];
        book.plan(&elsewhere, |_| true);
        assert_eq!(book.plan(&wanted, |c| *c != broken), vec![broken]);
    }

    #[test]
    fn eviction_drops_oldest_first() {
        let entries = (0..5u32).map(|i| (TileCoord { x: i, y: 0, z: 5 }, u64::from(10 - i)));
        let evicted = eviction_order(entries, 3);
        assert_eq!(
            evicted,
            vec![TileCoord { x: 4, y: 0, z: 5 }, TileCoord { x: 3, y: 0, z: 5 }]
        );
    }
}
