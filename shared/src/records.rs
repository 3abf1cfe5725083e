use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend identifiers arrive as integers or strings depending on the source table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// One nesting spawn point from `/nest_spawns?pokes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestRecord {
    pub spawn_id: RecordId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub pokemon_id: Option<u16>,
    #[serde(default)]
    pub name: Option<String>,
    /// Runner-up species, separated by `<br>`.
    #[serde(default)]
    pub alternatives: Option<String>,
}

impl NestRecord {
    /// Registry key: the record id when present, the spawn id otherwise.
    pub fn key(&self) -> String {
        self.id.as_ref().unwrap_or(&self.spawn_id).to_string()
    }
}

/// One spawn point from `/nest_spawns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub spawn_id: RecordId,
    pub lat: f64,
    pub lon: f64,
    /// Seconds past the hour.
    #[serde(default)]
    pub despawn_time: Option<u32>,
    /// Minutes.
    #[serde(default)]
    pub duration: Option<u32>,
}

/// A closed ring of `[lat, lon]` vertices (parks, S2 cells).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub coords: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAreaKind {
    ScanArea,
    ScanBlacklist,
    #[serde(other)]
    Unknown,
}

/// Scan boundary or blacklisted hole from `/scan_coords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAreaRecord {
    #[serde(rename = "type")]
    pub kind: ScanAreaKind,
    pub coords: Vec<[f64; 2]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nest_record_without_species_still_decodes() {
        let raw = r#"[{"spawn_id": 81723, "lat": 40.1, "lon": -73.9}]"#;
        let nests: Vec<NestRecord> = serde_json::from_str(raw).expect("decode nests");
        assert_eq!(nests[0].pokemon_id, None);
        assert_eq!(nests[0].key(), "81723");
    }

    #[test]
    fn nest_key_prefers_record_id() {
        let raw = r#"{"spawn_id": "89c2598d", "id": 17, "lat": 0.0, "lon": 0.0,
            "pokemon_id": 129, "name": "Magikarp 0.64", "alternatives": "<br>Pidgey 0.20"}"#;
        let nest: NestRecord = serde_json::from_str(raw).expect("decode nest");
        assert_eq!(nest.key(), "17");
        assert_eq!(nest.spawn_id, RecordId::Text("89c2598d".into()));
    }

    #[test]
    fn spawn_record_accepts_null_timing() {
        let raw = r#"{"spawn_id": 5, "lat": 1.0, "lon": 2.0, "despawn_time": null, "duration": null}"#;
        let spawn: SpawnRecord = serde_json::from_str(raw).expect("decode spawn");
        assert_eq!(spawn.despawn_time, None);
        assert_eq!(spawn.duration, None);
    }

    #[test]
    fn scan_area_kinds_decode_from_type_tag() {
        let raw = r#"[
            {"type": "scanarea", "coords": [[1.0, 2.0], [3.0, 4.0]]},
            {"type": "scanblacklist", "coords": [[1.5, 2.5]]},
            {"type": "weather", "coords": []}
        ]"#;
        let areas: Vec<ScanAreaRecord> = serde_json::from_str(raw).expect("decode scan areas");
        let kinds: Vec<_> = areas.iter().map(|area| area.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ScanAreaKind::ScanArea,
                ScanAreaKind::ScanBlacklist,
                ScanAreaKind::Unknown
            ]
        );
    }

    #[test]
    fn park_polygon_keeps_type_tag() {
        let raw = r#"{"type": "park", "coords": [[1.0, 2.0], [1.0, 3.0], [2.0, 3.0]]}"#;
        let park: PolygonRecord = serde_json::from_str(raw).expect("decode park");
        assert_eq!(park.kind.as_deref(), Some("park"));
        assert_eq!(park.coords.len(), 3);
    }
}
