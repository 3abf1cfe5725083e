use js_sys::{Function, Reflect};
use leptos::prelude::*;
use nestmap_shared::geo::LatLon;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;

use crate::app::{Located, canvas_dimensions};
use crate::viewport::{LOCATE_ZOOM, Viewport};

fn number_at(value: &JsValue, path: &[&str]) -> Option<f64> {
    let mut current = value.clone();
    for key in path {
        current = Reflect::get(&current, &JsValue::from_str(key)).ok()?;
    }
    current.as_f64()
}

fn warn(message: &str) {
    web_sys::console::warn_1(&message.into());
}

/// Ask the browser for the current position and recentre the map there.
pub fn locate(viewport: RwSignal<Viewport>, located: RwSignal<Option<LatLon>>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let geolocation = Reflect::get(window.as_ref(), &JsValue::from_str("navigator"))
        .and_then(|navigator| Reflect::get(&navigator, &JsValue::from_str("geolocation")));
    let Ok(geolocation) = geolocation else {
        warn("Geolocation is not available.");
        return;
    };
    if geolocation.is_undefined() {
        warn("Geolocation is not available.");
        return;
    }
    let Ok(get_current_position) =
        Reflect::get(&geolocation, &JsValue::from_str("getCurrentPosition"))
            .and_then(|f| f.dyn_into::<Function>())
    else {
        warn("Geolocation is not available.");
        return;
    };

    let on_success = Closure::once_into_js(move |position: JsValue| {
        let (Some(lat), Some(lon)) = (
            number_at(&position, &["coords", "latitude"]),
            number_at(&position, &["coords", "longitude"]),
        ) else {
            warn("Geolocation returned no coordinates.");
            return;
        };
        let here = LatLon::new(lat, lon);
        let (w, h) = canvas_dimensions();
        viewport.update(|vp| {
            let zoom = vp.zoom().max(LOCATE_ZOOM);
            vp.center_on(here, zoom, w, h);
        });
        located.set(Some(here));
    });
    let on_error = Closure::once_into_js(move |error: JsValue| {
        let message = Reflect::get(&error, &JsValue::from_str("message"))
            .ok()
            .and_then(|m| m.as_string())
            .unwrap_or_default();
        warn(&format!("Location lookup failed: {message}"));
    });

    if let Err(e) = get_current_position.call2(&geolocation, &on_success, &on_error) {
        warn(&format!("Location lookup failed: {e:?}"));
    }
}

#[component]
pub fn LocateButton() -> impl IntoView {
    let viewport: RwSignal<Viewport> = expect_context();
    let Located(located) = expect_context();

    view! {
        <button
            title="Show my location"
            style="width: 32px; height: 32px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; cursor: pointer; display: flex; align-items: center; justify-content: center; color: #9a9590; font-size: 1rem; line-height: 1; transition: border-color 0.15s, color 0.15s;"
            on:click=move |_| locate(viewport, located)
            on:mouseenter=|e| {
                if let Some(el) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok()) {
                    el.style().set_property("border-color", "rgba(245,197,66,0.4)").ok();
                    el.style().set_property("color", "#f5c542").ok();
                }
            }
            on:mouseleave=|e| {
                if let Some(el) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok()) {
                    el.style().set_property("border-color", "#282c3e").ok();
                    el.style().set_property("color", "#9a9590").ok();
                }
            }
        >
            "\u{25CE}"
        </button>
    }
}
