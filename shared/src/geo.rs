//! Spherical Web-Mercator math for slippy raster maps.

use std::f64::consts::PI;

pub const TILE_SIZE: f64 = 256.0;
/// Latitude bound of the square Mercator world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub const fn from_pair(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[0],
            lon: pair[1],
        }
    }
}

/// World size in pixels at a (possibly fractional) zoom.
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Project to world pixel coordinates at `zoom` (origin top-left, y down).
pub fn project(point: LatLon, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (point.lon + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

pub fn unproject(x: f64, y: f64, zoom: f64) -> LatLon {
    let size = world_size(zoom);
    let lon = x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / size;
    let lat = n.sinh().atan().to_degrees();
    LatLon { lat, lon }
}

/// Ground meters covered by one pixel at `lat`.
pub fn meters_per_pixel(lat: f64, zoom: f64) -> f64 {
    EARTH_CIRCUMFERENCE_M * lat.to_radians().cos() / world_size(zoom)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Fill a `{s}`/`{z}`/`{x}`/`{y}`/`{r}` provider template. Subdomains rotate over `abc`.
    pub fn url(&self, template: &str) -> String {
        let subdomain = ["a", "b", "c"][((self.x + self.y) % 3) as usize];
        template
            .replace("{s}", subdomain)
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
            .replace("{r}", "")
    }

    /// World pixel origin of this tile at zoom `z`.
    pub fn origin(&self) -> (f64, f64) {
        (self.x as f64 * TILE_SIZE, self.y as f64 * TILE_SIZE)
    }
}

/// Tiles at integer zoom `z` intersecting the world-pixel rectangle (in zoom-`z` pixels).
pub fn tiles_covering(min_x: f64, min_y: f64, max_x: f64, max_y: f64, z: u8) -> Vec<TileCoord> {
    let count = 1i64 << z;
    let clamp = |v: f64| ((v / TILE_SIZE).floor() as i64).clamp(0, count - 1);
    let (x0, x1) = (clamp(min_x), clamp(max_x));
    let (y0, y1) = (clamp(min_y), clamp(max_y));

    let mut tiles = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)).max(0) as usize);
    for y in y0..=y1 {
        for x in x0..=x1 {
            tiles.push(TileCoord {
                x: x as u32,
                y: y as u32,
                z,
            });
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn origin_projects_to_world_center() {
        let (x, y) = project(LatLon::new(0.0, 0.0), 0.0);
        assert_close(x, 128.0, 1e-9);
        assert_close(y, 128.0, 1e-9);
    }

    #[test]
    fn project_unproject_agree() {
        let point = LatLon::new(40.7128, -74.006);
        let (x, y) = project(point, 13.0);
        let back = unproject(x, y, 13.0);
        assert_close(back.lat, point.lat, 1e-9);
        assert_close(back.lon, point.lon, 1e-9);
    }

    #[test]
    fn latitude_is_clamped_to_mercator_bounds() {
        let (_, y) = project(LatLon::new(90.0, 0.0), 0.0);
        assert_close(y, 0.0, 1e-6);
    }

    #[test]
    fn tile_url_fills_template() {
        let tile = TileCoord { x: 2, y: 3, z: 4 };
        assert_eq!(
            tile.url("https://{s}.tile.example.org/{z}/{x}/{y}{r}.png"),
            "https://c.tile.example.org/4/2/3.png"
        );
    }

    #[test]
    fn covering_clamps_to_world() {
        let tiles = tiles_covering(-500.0, -500.0, 300.0, 100.0, 1);
        assert_eq!(
            tiles,
            vec![TileCoord { x: 0, y: 0, z: 1 }, TileCoord { x: 1, y: 0, z: 1 }]
        );
    }

    #[test]
    fn meters_per_pixel_at_equator() {
        assert_close(meters_per_pixel(0.0, 0.0), 156_543.03, 0.01);
    }
}
