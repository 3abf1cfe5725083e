use std::fmt;

use leptos::prelude::*;
use nestmap_shared::{MapConfig, OverlayKind, OverlayPayload, OverlaySet};
use serde::de::DeserializeOwned;

pub const MAP_CONFIG_URL: &str = "/api/map_config";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Network(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "fetch error: {e}"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Decode(e) => write!(f, "parse error: {e}"),
        }
    }
}

async fn fetch_text(url: &str) -> Result<String, FetchError> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    if !resp.ok() {
        return Err(FetchError::Status(resp.status()));
    }
    resp.text()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Decode an endpoint body into the payload of the overlay that requested it.
pub fn decode_payload(kind: OverlayKind, body: &str) -> Result<OverlayPayload, FetchError> {
    Ok(match kind {
        OverlayKind::Nests => OverlayPayload::Nests(decode(body)?),
        OverlayKind::Spawns => OverlayPayload::Spawns(decode(body)?),
        OverlayKind::Parks => OverlayPayload::Parks(decode(body)?),
        OverlayKind::L12Cells => OverlayPayload::L12Cells(decode(body)?),
        OverlayKind::ScanArea => OverlayPayload::ScanArea(decode(body)?),
    })
}

pub async fn fetch_overlay(kind: OverlayKind) -> Result<OverlayPayload, FetchError> {
    let body = fetch_text(kind.endpoint()).await?;
    decode_payload(kind, &body)
}

/// Issue the one fetch for `kind` and store the outcome. Callers must hold the
/// permission returned by the overlay's gate.
pub fn load_overlay(kind: OverlayKind, overlays: RwSignal<OverlaySet>) {
    wasm_bindgen_futures::spawn_local(async move {
        match fetch_overlay(kind).await {
            Ok(payload) => overlays.update(|set| {
                set.fill(payload);
            }),
            Err(e) => {
                web_sys::console::warn_1(
                    &format!("Failed to load {} overlay: {e}", kind.label()).into(),
                );
                overlays.update(|set| {
                    set.fail(kind, e.to_string());
                });
            }
        }
    });
}

pub async fn fetch_map_config() -> Result<MapConfig, FetchError> {
    let body = fetch_text(MAP_CONFIG_URL).await?;
    decode(&body)
}
