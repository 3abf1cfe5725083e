use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(&*state.client_dist_dir)
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(apply_cache_policy));

    let icons = Router::new()
        .route(
            &format!("{}/{{*path}}", routes::proxy::ICON_PREFIX),
            get(routes::proxy::monocle_icon),
        )
        .layer(middleware::from_fn(apply_cache_policy));

    // Data paths keep the backend's names so the client fetches them as-is.
    let app = Router::new()
        .route("/nest_spawns", get(routes::proxy::nest_spawns))
        .route("/parks", get(routes::proxy::parks))
        .route("/L12cells", get(routes::proxy::l12_cells))
        .route("/scan_coords", get(routes::proxy::scan_coords))
        .route("/api/map_config", get(routes::api::map_config))
        .route("/api/health", get(routes::api::health))
        .merge(icons);

    app.layer(CompressionLayer::new())
        .fallback_service(static_assets)
        .with_state(state)
}

/// How long browsers may keep a successful response for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CachePolicy {
    /// Trunk bundle files carry a content hash in their name.
    Immutable,
    /// Marker icons change only with a backend upgrade.
    Day,
    /// Leave whatever the inner service chose.
    Untouched,
}

impl CachePolicy {
    fn for_path(path: &str) -> Self {
        if is_hashed_bundle_asset(path) {
            Self::Immutable
        } else if path.starts_with("/static/") {
            Self::Day
        } else {
            Self::Untouched
        }
    }

    fn header(self) -> Option<HeaderValue> {
        match self {
            Self::Immutable => Some(HeaderValue::from_static(
                "public, max-age=31536000, immutable",
            )),
            Self::Day => Some(HeaderValue::from_static("public, max-age=86400")),
            Self::Untouched => None,
        }
    }
}

async fn apply_cache_policy(request: Request, next: Next) -> Response {
    let policy = CachePolicy::for_path(request.uri().path());
    let mut response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }
    if let Some(value) = policy.header() {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

/// `name-<hex>.wasm`, `name_<hex>_bg.wasm` and friends, with at least 8 hex digits.
fn is_hashed_bundle_asset(path: &str) -> bool {
    let path = Path::new(path);
    let is_bundle_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "wasm" | "js" | "css"));
    if !is_bundle_ext {
        return false;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| {
            stem.split(['-', '_', '.'])
                .any(|part| part.len() >= 8 && part.bytes().all(|b| b.is_ascii_hexdigit()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_bundle_files_are_immutable() {
        for path in [
            "/nestmap-client-71578f6b278221f3_bg.wasm",
            "/index-a93762ff3bf6d63a.css",
        ] {
            assert_eq!(CachePolicy::for_path(path), CachePolicy::Immutable, "{path}");
        }
    }

    #[test]
    fn icons_cache_for_a_day() {
        let policy = CachePolicy::for_path("/static/monocle-icons/icons/129.png");
        assert_eq!(policy, CachePolicy::Day);
        assert_eq!(
            policy.header(),
            Some(HeaderValue::from_static("public, max-age=86400"))
        );
    }

    #[test]
    fn pages_and_unhashed_scripts_are_untouched() {
        for path in ["/", "/index.html", "/main.js"] {
            assert_eq!(CachePolicy::for_path(path), CachePolicy::Untouched, "{path}");
        }
        assert_eq!(CachePolicy::Untouched.header(), None);
    }
}
