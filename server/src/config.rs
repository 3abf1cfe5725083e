use std::time::Duration;

use nestmap_shared::MapConfig;
use nestmap_shared::map_config::{
    DEFAULT_ATTRIBUTION, DEFAULT_PROVIDER_URL, DEFAULT_ZOOM, clamp_zoom,
};

pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_CLIENT_DIST_DIR: &str = "client/dist";
pub const DEFAULT_AREA_NAME: &str = "Nests";
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub fn server_port() -> u16 {
    non_empty_var("SERVER_PORT")
        .or_else(|| non_empty_var("PORT"))
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Base URL of the Monocle backend serving the nest and map data.
pub fn backend_url() -> String {
    non_empty_var("MONOCLE_BACKEND_URL")
        .map(|value| value.trim_end_matches('/').to_owned())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned())
}

pub fn client_dist_dir() -> String {
    non_empty_var("CLIENT_DIST_DIR").unwrap_or_else(|| DEFAULT_CLIENT_DIST_DIR.to_owned())
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

fn coordinate(name: &str, limit: f64) -> Option<f64> {
    non_empty_var(name)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite() && value.abs() <= limit)
}

pub fn map_config() -> MapConfig {
    let center = match (
        coordinate("MAP_CENTER_LAT", 90.0),
        coordinate("MAP_CENTER_LON", 180.0),
    ) {
        (Some(lat), Some(lon)) => [lat, lon],
        _ => MapConfig::default().center,
    };
    let zoom = non_empty_var("MAP_ZOOM")
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .map(clamp_zoom)
        .unwrap_or(DEFAULT_ZOOM);

    MapConfig {
        area_name: non_empty_var("AREA_NAME").unwrap_or_else(|| DEFAULT_AREA_NAME.to_owned()),
        center,
        zoom,
        provider_url: non_empty_var("MAP_PROVIDER_URL")
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_owned()),
        attribution: non_empty_var("MAP_PROVIDER_ATTRIBUTION")
            .unwrap_or_else(|| DEFAULT_ATTRIBUTION.to_owned()),
    }
}
