use crate::records::{ScanAreaKind, SpawnRecord};

/// Stroke for paths without a dedicated color.
pub const DEFAULT_STROKE: &str = "#3388ff";
pub const UNKNOWN_DESPAWN_STROKE: &str = "#f03";
pub const PARK_STROKE: &str = "limegreen";
pub const CELL_STROKE: &str = "grey";
pub const BLACKLIST_STROKE: &str = "red";

const DEFAULT_WEIGHT: f64 = 3.0;
const DEFAULT_FILL_OPACITY: f64 = 0.2;
/// Spawn circles are drawn with a fixed ground radius.
pub const SPAWN_RADIUS_METERS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle {
    pub stroke: &'static str,
    pub weight: f64,
    /// Fill uses the stroke color at this opacity; `None` draws an open path.
    pub fill_opacity: Option<f64>,
}

impl ShapeStyle {
    const fn polygon(stroke: &'static str) -> Self {
        Self {
            stroke,
            weight: DEFAULT_WEIGHT,
            fill_opacity: Some(DEFAULT_FILL_OPACITY),
        }
    }

    const fn polyline(stroke: &'static str) -> Self {
        Self {
            stroke,
            weight: DEFAULT_WEIGHT,
            fill_opacity: None,
        }
    }
}

pub fn spawn_style(spawn: &SpawnRecord) -> ShapeStyle {
    let stroke = if spawn.despawn_time.is_some() {
        DEFAULT_STROKE
    } else {
        UNKNOWN_DESPAWN_STROKE
    };
    ShapeStyle {
        stroke,
        weight: 2.0,
        fill_opacity: Some(DEFAULT_FILL_OPACITY),
    }
}

pub const fn park_style() -> ShapeStyle {
    ShapeStyle::polygon(PARK_STROKE)
}

pub const fn cell_style() -> ShapeStyle {
    ShapeStyle::polygon(CELL_STROKE)
}

/// Scan boundaries are open outlines; blacklisted holes are red. Unknown tags draw nothing.
pub const fn scan_area_style(kind: ScanAreaKind) -> Option<ShapeStyle> {
    match kind {
        ScanAreaKind::ScanArea => Some(ShapeStyle::polyline(DEFAULT_STROKE)),
        ScanAreaKind::ScanBlacklist => Some(ShapeStyle::polyline(BLACKLIST_STROKE)),
        ScanAreaKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordId;

    #[test]
    fn blacklist_is_distinguishable_from_scan_area() {
        let area = scan_area_style(ScanAreaKind::ScanArea).expect("scan area style");
        let blacklist = scan_area_style(ScanAreaKind::ScanBlacklist).expect("blacklist style");
        assert_ne!(area.stroke, blacklist.stroke);
        assert_eq!(blacklist.stroke, "red");
        assert_eq!(area.fill_opacity, None);
        assert_eq!(scan_area_style(ScanAreaKind::Unknown), None);
    }

    #[test]
    fn spawn_without_despawn_time_is_highlighted() {
        let mut spawn = SpawnRecord {
            spawn_id: RecordId::Int(1),
            lat: 0.0,
            lon: 0.0,
            despawn_time: None,
            duration: None,
        };
        assert_eq!(spawn_style(&spawn).stroke, UNKNOWN_DESPAWN_STROKE);
        spawn.despawn_time = Some(0);
        assert_eq!(spawn_style(&spawn).stroke, DEFAULT_STROKE);
        assert_eq!(spawn_style(&spawn).weight, 2.0);
    }

    #[test]
    fn polygons_are_filled() {
        assert_eq!(park_style().stroke, "limegreen");
        assert_eq!(cell_style().stroke, "grey");
        assert!(park_style().fill_opacity.is_some());
    }
}
