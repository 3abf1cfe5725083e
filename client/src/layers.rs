use leptos::prelude::*;
use nestmap_shared::popup::PopupTarget;
use nestmap_shared::{LoadStatus, OverlayKind, OverlaySet, VisibilityEvent};
use wasm_bindgen::JsCast;

use crate::app::OpenPopup;
use crate::fetch;
use crate::popup::close_popup;

/// Short status shown next to a layer name.
pub fn status_label(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Idle => String::new(),
        LoadStatus::Pending => "loading\u{2026}".to_string(),
        LoadStatus::Ready(count) => count.to_string(),
        LoadStatus::Failed(_) => "failed".to_string(),
    }
}

fn popup_layer(target: &PopupTarget) -> OverlayKind {
    match target {
        PopupTarget::Nest(_) => OverlayKind::Nests,
        PopupTarget::Spawn(_) => OverlayKind::Spawns,
    }
}

/// A click shows a hidden layer and hides a shown one.
fn toggle_event(set: &OverlaySet, kind: OverlayKind) -> VisibilityEvent {
    if set.is_hidden(kind) {
        VisibilityEvent::Add
    } else {
        VisibilityEvent::Remove
    }
}

/// Apply one click on `kind`'s toggle. Returns the overlay to fetch, if any.
fn apply_toggle(
    set: &mut OverlaySet,
    kind: OverlayKind,
) -> (VisibilityEvent, Option<OverlayKind>) {
    let event = toggle_event(set, kind);
    (event, set.handle(kind, event))
}

/// Whether hiding or showing `kind` takes the open popup down with it.
fn closes_popup(event: VisibilityEvent, kind: OverlayKind, open: Option<&PopupTarget>) -> bool {
    event == VisibilityEvent::Remove && open.is_some_and(|target| popup_layer(target) == kind)
}

/// Show or hide an overlay, issuing its fetch on the first show.
pub fn toggle_overlay(kind: OverlayKind, overlays: RwSignal<OverlaySet>, popup: OpenPopup) {
    let mut outcome = (VisibilityEvent::Remove, None);
    overlays.update(|set| outcome = apply_toggle(set, kind));
    let (event, to_fetch) = outcome;
    if let Some(kind) = to_fetch {
        fetch::load_overlay(kind, overlays);
    }

    let OpenPopup(open) = popup;
    if open.with_untracked(|target| closes_popup(event, kind, target.as_ref())) {
        close_popup(popup);
    }
}

#[component]
pub fn LayerControl() -> impl IntoView {
    view! {
        <div style="position: absolute; top: 12px; right: 12px; z-index: 10; min-width: 180px; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; padding: 6px; box-shadow: 0 4px 16px rgba(0,0,0,0.4);">
            <div style="font-size: 0.62rem; letter-spacing: 0.08em; text-transform: uppercase; color: #5a5860; font-family: 'JetBrains Mono', monospace; padding: 4px 10px 6px;">
                "Layers"
            </div>
            {OverlayKind::ALL
                .into_iter()
                .map(|kind| view! { <LayerToggleRow kind=kind /> })
                .collect_view()}
        </div>
    }
}

#[component]
fn LayerToggleRow(kind: OverlayKind) -> impl IntoView {
    let overlays: RwSignal<OverlaySet> = expect_context();
    let popup: OpenPopup = expect_context();

    let active = move || overlays.with(|set| !set.is_hidden(kind));
    let status = move || overlays.with(|set| set.state(kind).status().clone());
    let failed_reason = move || match status() {
        LoadStatus::Failed(reason) => reason,
        _ => String::new(),
    };

    view! {
        <div
            title=failed_reason
            style="display: flex; align-items: center; justify-content: space-between; gap: 12px; padding: 7px 10px; border-radius: 4px; cursor: pointer; transition: background 0.15s;"
            on:click=move |_| toggle_overlay(kind, overlays, popup)
            on:mouseenter=|e| {
                if let Some(el) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok()) {
                    el.style().set_property("background", "#232738").ok();
                }
            }
            on:mouseleave=|e| {
                if let Some(el) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok()) {
                    el.style().set_property("background", "transparent").ok();
                }
            }
        >
            <div style="display: flex; align-items: center; gap: 8px;">
                <span style=move || {
                    if active() {
                        "display: inline-block; width: 8px; height: 8px; border-radius: 50%; background: #50c878; box-shadow: 0 0 5px rgba(80,200,120,0.4); flex-shrink: 0;"
                    } else {
                        "display: inline-block; width: 8px; height: 8px; border-radius: 50%; background: #3a3f5c; flex-shrink: 0;"
                    }
                } />
                <span style="font-size: 0.85rem; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif;">{kind.label()}</span>
            </div>
            <span style=move || {
                if matches!(status(), LoadStatus::Failed(_)) {
                    "font-family: 'JetBrains Mono', monospace; font-size: 0.62rem; color: #e05a5a;"
                } else {
                    "font-family: 'JetBrains Mono', monospace; font-size: 0.62rem; color: #5a5860;"
                }
            }>
                {move || status_label(&status())}
            </span>
        </div>
    }
}
