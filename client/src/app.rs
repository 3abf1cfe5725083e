use leptos::prelude::*;
use wasm_bindgen::JsCast;

use std::cell::RefCell;

use gloo_storage::Storage;
use nestmap_shared::geo::LatLon;
use nestmap_shared::map_config::{MAX_ZOOM, MIN_ZOOM};
use nestmap_shared::popup::PopupTarget;
use nestmap_shared::{MapConfig, OverlaySet};

use crate::canvas::MapCanvas;
use crate::fetch;
use crate::icons::IconCache;
use crate::layers::LayerControl;
use crate::locate::LocateButton;
use crate::popup::{MapPopup, close_popup};
use crate::tiles::TileMap;
use crate::viewport::Viewport;

const VIEW_STORAGE_KEY: &str = "nestmap_view";

pub(crate) fn canvas_dimensions() -> (f64, f64) {
    let Some(window) = web_sys::window() else {
        return (1200.0, 800.0);
    };
    let w = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(1200.0);
    let h = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(800.0);
    (w, h)
}

/// Newtype wrappers keep same-typed signals apart in Leptos context.
#[derive(Clone, Copy)]
pub(crate) struct OpenPopup(pub RwSignal<Option<PopupTarget>>);
/// Epoch seconds, advanced once per second while a popup is open.
#[derive(Clone, Copy)]
pub(crate) struct PopupClock(pub RwSignal<i64>);
#[derive(Clone, Copy)]
pub(crate) struct Located(pub RwSignal<Option<LatLon>>);

struct KeydownBinding {
    window: web_sys::Window,
    _handler: wasm_bindgen::closure::Closure<dyn Fn(web_sys::KeyboardEvent)>,
}

thread_local! {
    static KEYDOWN_BINDING: RefCell<Option<KeydownBinding>> = const { RefCell::new(None) };
}

/// Last map position, restored on reload.
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct SavedView {
    center: [f64; 2],
    zoom: f64,
}

impl SavedView {
    fn from_viewport(vp: &Viewport, canvas_w: f64, canvas_h: f64) -> Self {
        let center = vp.center(canvas_w, canvas_h);
        Self {
            center: [center.lat, center.lon],
            zoom: vp.zoom(),
        }
    }

    fn is_usable(&self) -> bool {
        let [lat, lon] = self.center;
        lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon)
            && (MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom)
    }
}

fn load_saved_view() -> Option<SavedView> {
    gloo_storage::LocalStorage::get::<SavedView>(VIEW_STORAGE_KEY)
        .ok()
        .filter(SavedView::is_usable)
}

/// Root application component. Provides global reactive signals via context.
#[component]
pub fn App() -> impl IntoView {
    // Global signals
    let viewport: RwSignal<Viewport> = RwSignal::new(Viewport::default());
    let overlays: RwSignal<OverlaySet> = RwSignal::new(OverlaySet::new());
    let map_config: RwSignal<MapConfig> = RwSignal::new(MapConfig::default());
    let tiles: RwSignal<TileMap> = RwSignal::new(Default::default());
    let icons: RwSignal<IconCache> = RwSignal::new(Default::default());
    let open_popup: RwSignal<Option<PopupTarget>> = RwSignal::new(None);
    let popup_clock: RwSignal<i64> = RwSignal::new(chrono::Utc::now().timestamp());
    let located: RwSignal<Option<LatLon>> = RwSignal::new(None);

    provide_context(viewport);
    provide_context(overlays);
    provide_context(map_config);
    provide_context(tiles);
    provide_context(icons);
    provide_context(OpenPopup(open_popup));
    provide_context(PopupClock(popup_clock));
    provide_context(Located(located));

    let saved_view = load_saved_view();
    let has_saved_view = saved_view.is_some();
    {
        let (w, h) = canvas_dimensions();
        let initial = MapConfig::default();
        let (center, zoom) = match saved_view {
            Some(view) => (LatLon::from_pair(view.center), view.zoom),
            None => (LatLon::from_pair(initial.center), initial.zoom),
        };
        viewport.update(|vp| vp.center_on(center, zoom, w, h));
    }

    // Overlays shown at start load immediately.
    let mut boot_fetches = Vec::new();
    overlays.update(|set| boot_fetches = set.boot());
    for kind in boot_fetches {
        fetch::load_overlay(kind, overlays);
    }

    wasm_bindgen_futures::spawn_local(async move {
        match fetch::fetch_map_config().await {
            Ok(config) => {
                web_sys::console::info_1(
                    &format!(
                        "map config: {} @ {:?} z{}",
                        config.area_name, config.center, config.zoom
                    )
                    .into(),
                );
                if !has_saved_view {
                    let (w, h) = canvas_dimensions();
                    let center = LatLon::from_pair(config.center);
                    let zoom = config.zoom;
                    viewport.update(|vp| vp.center_on(center, zoom, w, h));
                }
                map_config.set(config);
            }
            Err(e) => {
                web_sys::console::warn_1(&format!("Map config fetch failed: {e}").into());
            }
        }
    });

    // Persist the view whenever it changes.
    Effect::new(move || {
        let (w, h) = canvas_dimensions();
        let view = viewport.with(|vp| SavedView::from_viewport(vp, w, h));
        let _ = gloo_storage::LocalStorage::set(VIEW_STORAGE_KEY, &view);
    });

    // Global keyboard shortcuts
    Effect::new(move || {
        use wasm_bindgen::prelude::*;

        let Some(window) = web_sys::window() else {
            return;
        };

        KEYDOWN_BINDING.with(|slot| {
            if let Some(old) = slot.borrow_mut().take() {
                let _ = old.window.remove_event_listener_with_callback(
                    "keydown",
                    old._handler.as_ref().unchecked_ref(),
                );
            }
        });

        let handler =
            Closure::<dyn Fn(web_sys::KeyboardEvent)>::new(move |e: web_sys::KeyboardEvent| {
                match e.key().as_str() {
                    "Escape" => close_popup(OpenPopup(open_popup)),
                    "+" | "=" => {
                        e.prevent_default();
                        let (cw, ch) = canvas_dimensions();
                        viewport.update(|vp| vp.zoom_step(1.0, cw, ch));
                    }
                    "-" => {
                        e.prevent_default();
                        let (cw, ch) = canvas_dimensions();
                        viewport.update(|vp| vp.zoom_step(-1.0, cw, ch));
                    }
                    _ => {}
                }
            });

        if window
            .add_event_listener_with_callback("keydown", handler.as_ref().unchecked_ref())
            .is_ok()
        {
            KEYDOWN_BINDING.with(|slot| {
                *slot.borrow_mut() = Some(KeydownBinding {
                    window: window.clone(),
                    _handler: handler,
                });
            });
        }
    });

    let zoom_by = move |steps: f64| {
        let (cw, ch) = canvas_dimensions();
        viewport.update(|vp| vp.zoom_step(steps, cw, ch));
    };

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden; background: #0c0e17;">
            <MapCanvas />
            <div style="position: absolute; top: 12px; left: 12px; z-index: 10; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; padding: 6px 12px; box-shadow: 0 4px 16px rgba(0,0,0,0.4); font-family: 'Inter', system-ui, sans-serif; font-size: 0.95rem; font-weight: 700; color: #f5c542; letter-spacing: 0.02em;">
                {move || map_config.with(|config| config.area_name.clone())}
            </div>
            <LayerControl />
            <div style="position: absolute; top: 60px; left: 12px; z-index: 10; display: flex; flex-direction: column; gap: 6px;">
                <ZoomButton label="+" title="Zoom in" on_press=Callback::new(move |_| zoom_by(1.0)) />
                <ZoomButton label="\u{2212}" title="Zoom out" on_press=Callback::new(move |_| zoom_by(-1.0)) />
                <LocateButton />
            </div>
            <div
                style="position: absolute; right: 0; bottom: 0; z-index: 10; background: rgba(19,22,31,0.8); padding: 2px 8px; font-size: 0.68rem; color: #9a9590; font-family: 'Inter', system-ui, sans-serif; border-top-left-radius: 4px;"
                inner_html=move || map_config.with(|config| config.attribution.clone())
            />
            <MapPopup />
        </div>
    }
}

#[component]
fn ZoomButton(label: &'static str, title: &'static str, on_press: Callback<()>) -> impl IntoView {
    view! {
        <button
            title=title
            style="width: 32px; height: 32px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; cursor: pointer; color: #e2e0d8; font-size: 1.1rem; line-height: 1; font-family: 'JetBrains Mono', monospace; transition: border-color 0.15s, color 0.15s;"
            on:click=move |_| on_press.run(())
            on:mouseenter=|e| {
                if let Some(el) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok()) {
                    el.style().set_property("border-color", "rgba(245,197,66,0.4)").ok();
                    el.style().set_property("color", "#f5c542").ok();
                }
            }
            on:mouseleave=|e| {
                if let Some(el) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok()) {
                    el.style().set_property("border-color", "#282c3e").ok();
                    el.style().set_property("color", "#e2e0d8").ok();
                }
            }
        >
            {label}
        </button>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_view_captures_center_and_zoom() {
        let mut vp = Viewport::default();
        vp.center_on(LatLon::new(48.85, 2.35), 13.0, 800.0, 600.0);
        let view = SavedView::from_viewport(&vp, 800.0, 600.0);
        assert!((view.center[0] - 48.85).abs() < 1e-6);
        assert!((view.center[1] - 2.35).abs() < 1e-6);
        assert!((view.zoom - 13.0).abs() < 1e-9);
        assert!(view.is_usable());
    }

    #[test]
    fn corrupt_saved_view_is_ignored() {
        let view: SavedView = serde_json::from_str(r#"{"center":[95.0,0.0],"zoom":13.0}"#)
            .expect("valid json");
        assert!(!view.is_usable());

        let view = SavedView {
            center: [0.0, 0.0],
            zoom: 40.0,
        };
        assert!(!view.is_usable());
    }
}
