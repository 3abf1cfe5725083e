use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use leptos::prelude::*;
use web_sys::HtmlImageElement;

pub const ICON_BASE_PATH: &str = "/static/monocle-icons/icons";
/// Drawn edge length of a nest marker icon.
pub const ICON_SIZE_PX: f64 = 32.0;

static ICON_WARNED: AtomicBool = AtomicBool::new(false);

#[derive(Clone)]
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub enum IconState {
    Loading,
    Ready(HtmlImageElement),
    Missing,
}

pub type IconCache = HashMap<u16, IconState>;

pub fn icon_src(pokemon_id: u16) -> String {
    format!("{ICON_BASE_PATH}/{pokemon_id}.png")
}

fn warn_icon_once(message: &str) {
    if ICON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        web_sys::console::warn_1(&message.into());
    }
}

/// Start loading every species icon not yet known to the cache.
pub fn ensure_icons(cache: RwSignal<IconCache>, ids: impl IntoIterator<Item = u16>) {
    let missing: Vec<u16> = cache.with_untracked(|known| {
        let mut ids: Vec<u16> = ids.into_iter().filter(|id| !known.contains_key(id)).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    });
    if missing.is_empty() {
        return;
    }
    cache.update(|known| {
        for id in &missing {
            known.insert(*id, IconState::Loading);
        }
    });
    for id in missing {
        load_icon(cache, id);
    }
}

fn load_icon(cache: RwSignal<IconCache>, pokemon_id: u16) {
    wasm_bindgen_futures::spawn_local(async move {
        let Ok(image) = HtmlImageElement::new() else {
            cache.update(|known| {
                known.insert(pokemon_id, IconState::Missing);
            });
            warn_icon_once("Failed to create icon image element.");
            return;
        };
        image.set_src(&icon_src(pokemon_id));
        let state = match wasm_bindgen_futures::JsFuture::from(image.decode()).await {
            Ok(_) => IconState::Ready(image),
            Err(err) => {
                warn_icon_once(&format!(
                    "Failed to decode icon for #{pokemon_id}: {:?}",
                    err
                ));
                IconState::Missing
            }
        };
        cache.update(|known| {
            known.insert(pokemon_id, state);
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_path_uses_species_number() {
        assert_eq!(icon_src(129), "/static/monocle-icons/icons/129.png");
    }
}
