use serde::{Deserialize, Serialize};

pub const DEFAULT_ZOOM: f64 = 13.0;
/// Zoom range the map can display.
pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 19.0;
pub const DEFAULT_PROVIDER_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Page settings served at `/api/map_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub area_name: String,
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub provider_url: String,
    pub attribution: String,
}

pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            area_name: "Nests".to_string(),
            center: [0.0, 0.0],
            zoom: DEFAULT_ZOOM,
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            attribution: DEFAULT_ATTRIBUTION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: MapConfig =
            serde_json::from_str(r#"{"center": [51.5, -0.12]}"#).expect("decode config");
        assert_eq!(config.center, [51.5, -0.12]);
        assert_eq!(config.zoom, DEFAULT_ZOOM);
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
    }

    #[test]
    fn zoom_clamps_to_display_range() {
        assert_eq!(clamp_zoom(0.0), MIN_ZOOM);
        assert_eq!(clamp_zoom(25.0), MAX_ZOOM);
        assert_eq!(clamp_zoom(DEFAULT_ZOOM), DEFAULT_ZOOM);
    }
}
