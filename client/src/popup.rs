use std::cell::RefCell;

use gloo_timers::callback::Interval;
use leptos::prelude::*;
use nestmap_shared::OverlaySet;
use nestmap_shared::popup::{
    POPUP_REFRESH_MS, PopupContent, PopupTarget, RefreshSlot, nest_popup, spawn_popup,
};

use crate::app::{OpenPopup, PopupClock, canvas_dimensions};
use crate::hit::{autopan_delta, target_anchor};
use crate::icons::ICON_SIZE_PX;
use crate::viewport::Viewport;

const POPUP_WIDTH: f64 = 240.0;
/// Upper bound used for auto-pan; the box grows with the alternatives list.
const POPUP_HEIGHT_ESTIMATE: f64 = 170.0;
const AUTOPAN_PADDING: f64 = 12.0;

thread_local! {
    static POPUP_REFRESH: RefCell<RefreshSlot<Interval>> = RefCell::new(RefreshSlot::default());
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Vertical gap between a target's anchor point and the popup's tail.
fn anchor_lift(target: &PopupTarget) -> f64 {
    match target {
        PopupTarget::Nest(_) => ICON_SIZE_PX / 2.0,
        PopupTarget::Spawn(_) => 6.0,
    }
}

/// Open the popup for `target`, replacing any open one.
///
/// Starts the 1 s content refresh and pans the map once so the box is visible.
pub fn open_popup(
    target: PopupTarget,
    OpenPopup(open): OpenPopup,
    PopupClock(clock): PopupClock,
    overlays: RwSignal<OverlaySet>,
    viewport: RwSignal<Viewport>,
) {
    clock.set(now_secs());
    let interval = Interval::new(POPUP_REFRESH_MS, move || clock.set(now_secs()));
    POPUP_REFRESH.with(|slot| slot.borrow_mut().open(target.clone(), interval));

    let anchor = overlays.with_untracked(|set| target_anchor(set, &target));
    if let Some(anchor) = anchor {
        let (w, h) = canvas_dimensions();
        let lift = anchor_lift(&target);
        viewport.update(|vp| {
            let (ax, ay) = vp.point_to_screen(anchor);
            let (dx, dy) = autopan_delta(
                ax,
                ay - lift,
                POPUP_WIDTH,
                POPUP_HEIGHT_ESTIMATE,
                w,
                h,
                AUTOPAN_PADDING,
            );
            if dx != 0.0 || dy != 0.0 {
                vp.pan(dx, dy);
            }
        });
    }
    open.set(Some(target));
}

/// Close the open popup and stop its refresh timer.
pub fn close_popup(OpenPopup(open): OpenPopup) {
    POPUP_REFRESH.with(|slot| {
        slot.borrow_mut().close();
    });
    if open.get_untracked().is_some() {
        open.set(None);
    }
}

fn popup_content(set: &OverlaySet, target: &PopupTarget, now: i64) -> Option<PopupContent> {
    match target {
        PopupTarget::Nest(key) => set.nest_by_key(key).map(nest_popup),
        PopupTarget::Spawn(idx) => set.spawns.items().get(*idx).map(|s| spawn_popup(s, now)),
    }
}

#[component]
pub fn MapPopup() -> impl IntoView {
    let open_ctx: OpenPopup = expect_context();
    let OpenPopup(open) = open_ctx;
    let PopupClock(clock) = expect_context();
    let overlays: RwSignal<OverlaySet> = expect_context();
    let viewport: RwSignal<Viewport> = expect_context();

    // Rebuilt on every clock tick while open.
    let content = Memo::new(move |_| {
        let target = open.get()?;
        let now = clock.get();
        overlays.with(|set| {
            let anchor = target_anchor(set, &target)?;
            let content = popup_content(set, &target, now)?;
            Some((content, anchor, anchor_lift(&target)))
        })
    });

    view! {
        {move || {
            let Some((content, anchor, lift)) = content.get() else {
                return ().into_any();
            };
            let (x, y) = viewport.with(|vp| vp.point_to_screen(anchor));
            let PopupContent { heading, heading_link, details, directions } = content;
            view! {
                <div
                    style:left=format!("{x}px")
                    style:top=format!("{}px", y - lift)
                    style=format!("position: absolute; z-index: 20; width: {POPUP_WIDTH}px; transform: translate(-50%, calc(-100% - 8px)); background: #13161f; border: 1px solid #282c3e; border-radius: 6px; box-shadow: 0 4px 16px rgba(0,0,0,0.5); padding: 10px 12px; font-family: 'Inter', system-ui, sans-serif; color: #e2e0d8;")
                    on:pointerdown=|e| e.stop_propagation()
                    on:click=|e| e.stop_propagation()
                >
                    <button
                        title="Close"
                        style="position: absolute; top: 4px; right: 6px; background: none; border: none; color: #5a5860; cursor: pointer; font-size: 1rem; line-height: 1;"
                        on:click=move |_| close_popup(open_ctx)
                    >
                        "\u{00D7}"
                    </button>
                    <div style="font-size: 0.9rem; font-weight: 700; padding-right: 14px;">
                        {heading}
                        {heading_link.map(|link| view! {
                            " "
                            <a
                                href=link.href
                                target="_blank"
                                rel="noopener"
                                style="color: #f5c542; text-decoration: none; font-family: 'JetBrains Mono', monospace; font-size: 0.78rem;"
                            >
                                {link.label}
                            </a>
                        })}
                    </div>
                    <div style="margin-top: 6px; font-size: 0.75rem; color: #9a9590; font-family: 'JetBrains Mono', monospace; line-height: 1.5;">
                        {details.into_iter().map(|line| view! { <div>{line}</div> }).collect_view()}
                    </div>
                    <a
                        href=directions.href
                        target="_blank"
                        rel="noopener"
                        style="display: inline-block; margin-top: 8px; font-size: 0.75rem; color: #f5c542; text-decoration: none;"
                    >
                        {directions.label}
                    </a>
                </div>
            }
            .into_any()
        }}
    }
}
