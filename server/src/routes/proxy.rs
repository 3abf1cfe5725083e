//! Pass-through for the Monocle data endpoints and marker icons the map reads.
//!
//! Bodies are forwarded byte-for-byte; the server never inspects the records.

use std::fmt;

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The backend could not be reached or timed out.
    Transport(String),
    /// The backend answered with a non-success status.
    Status(u16),
    /// The response body could not be read.
    Body(String),
    /// The requested icon path leaves the icon directory.
    BadPath,
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "upstream unreachable: {e}"),
            Self::Status(code) => write!(f, "upstream returned HTTP {code}"),
            Self::Body(e) => write!(f, "upstream body error: {e}"),
            Self::BadPath => write!(f, "invalid icon path"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(_) | Self::Body(_) => StatusCode::BAD_GATEWAY,
            Self::Status(code) => StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::BadPath => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

pub async fn nest_spawns(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, "/nest_spawns", query.as_deref()).await
}

pub async fn parks(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, "/parks", query.as_deref()).await
}

pub async fn l12_cells(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, "/L12cells", query.as_deref()).await
}

pub async fn scan_coords(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    forward(&state, "/scan_coords", query.as_deref()).await
}

/// Backend directory holding the per-species marker icons.
pub const ICON_PREFIX: &str = "/static/monocle-icons";

pub async fn monocle_icon(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ProxyError> {
    if !is_safe_icon_path(&path) {
        return Err(ProxyError::BadPath);
    }
    let upstream_path = format!("{ICON_PREFIX}/{path}");
    let (content_type, body) = fetch_upstream(&state, &upstream_path, None).await?;
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        content_type.unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}

fn is_safe_icon_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

async fn forward(
    state: &AppState,
    path: &'static str,
    query: Option<&str>,
) -> Result<Response, ProxyError> {
    let (_, body) = fetch_upstream(state, path, query).await?;
    Ok(json_bytes_response(body))
}

/// GET a backend path, returning its content type and body.
async fn fetch_upstream(
    state: &AppState,
    path: &str,
    query: Option<&str>,
) -> Result<(Option<HeaderValue>, Bytes), ProxyError> {
    let url = state.upstream_url(path, query);
    let resp = state.http_client.get(&url).send().await.map_err(|e| {
        warn!(error = %e, %url, "upstream request failed");
        ProxyError::Transport(e.to_string())
    })?;

    let status = resp.status();
    if !status.is_success() {
        warn!(status = status.as_u16(), %url, "upstream returned an error status");
        return Err(ProxyError::Status(status.as_u16()));
    }

    let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
    let body = resp.bytes().await.map_err(|e| {
        warn!(error = %e, %url, "failed to read upstream body");
        ProxyError::Body(e.to_string())
    })?;

    Ok((content_type, body))
}

fn json_bytes_response(body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::extract::RawQuery;
    use axum::http::StatusCode;
    use axum::routing::get;
    use nestmap_shared::{MapConfig, NestRecord, PolygonRecord, ScanAreaKind, ScanAreaRecord};

    use super::{ProxyError, is_safe_icon_path};
    use crate::state::AppState;

    async fn spawn_router(router: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve test router");
        });
        (addr, handle)
    }

    async fn fake_nest_spawns(RawQuery(query): RawQuery) -> axum::Json<serde_json::Value> {
        if query.as_deref() == Some("pokes") {
            axum::Json(serde_json::json!([{
                "spawn_id": 11, "lat": 1.5, "lon": 2.5, "id": 3,
                "pokemon_id": 129, "name": "Magikarp 0.64",
                "alternatives": "<br>Pidgey 0.20"
            }]))
        } else {
            axum::Json(serde_json::json!([
                {"spawn_id": 11, "lat": 1.5, "lon": 2.5, "despawn_time": 125, "duration": 30}
            ]))
        }
    }

    fn fake_backend() -> Router {
        Router::new()
            .route("/nest_spawns", get(fake_nest_spawns))
            .route(
                "/parks",
                get(|| async {
                    axum::Json(serde_json::json!([
                        {"type": "park", "coords": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]}
                    ]))
                }),
            )
            .route(
                "/static/monocle-icons/icons/129.png",
                get(|| async {
                    (
                        [(axum::http::header::CONTENT_TYPE, "image/png")],
                        &[0x89u8, b'P', b'N', b'G'][..],
                    )
                }),
            )
            .route(
                "/L12cells",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route(
                "/scan_coords",
                get(|| async {
                    axum::Json(serde_json::json!([
                        {"type": "scanarea", "coords": [[0.0, 0.0], [0.0, 2.0]]},
                        {"type": "scanblacklist", "coords": [[0.5, 0.5], [0.5, 1.0]]}
                    ]))
                }),
            )
    }

    async fn spawn_app(backend_url: String) -> (String, tokio::task::JoinHandle<()>) {
        let state = AppState::new(backend_url, MapConfig::default(), "client/dist".to_owned());
        let (addr, handle) = spawn_router(crate::app::build_app(state)).await;
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn forwards_query_flag_to_backend() {
        let (backend_addr, backend_handle) = spawn_router(fake_backend()).await;
        let (base_url, app_handle) = spawn_app(format!("http://{backend_addr}")).await;
        let client = reqwest::Client::new();

        let nests = client
            .get(format!("{base_url}/nest_spawns?pokes"))
            .send()
            .await
            .expect("nests request")
            .error_for_status()
            .expect("nests status")
            .json::<Vec<NestRecord>>()
            .await
            .expect("parse nests");
        assert_eq!(nests.len(), 1);
        assert_eq!(nests[0].pokemon_id, Some(129));
        assert_eq!(nests[0].key(), "3");

        let spawns = client
            .get(format!("{base_url}/nest_spawns"))
            .send()
            .await
            .expect("spawns request")
            .json::<Vec<serde_json::Value>>()
            .await
            .expect("parse spawns");
        assert_eq!(spawns[0]["despawn_time"], 125);
        assert!(spawns[0].get("pokemon_id").is_none());

        app_handle.abort();
        backend_handle.abort();
    }

    #[tokio::test]
    async fn forwards_polygon_endpoints_unchanged() {
        let (backend_addr, backend_handle) = spawn_router(fake_backend()).await;
        let (base_url, app_handle) = spawn_app(format!("http://{backend_addr}")).await;
        let client = reqwest::Client::new();

        let parks = client
            .get(format!("{base_url}/parks"))
            .send()
            .await
            .expect("parks request")
            .json::<Vec<PolygonRecord>>()
            .await
            .expect("parse parks");
        assert_eq!(parks[0].kind.as_deref(), Some("park"));
        assert_eq!(parks[0].coords.len(), 3);

        let scan = client
            .get(format!("{base_url}/scan_coords"))
            .send()
            .await
            .expect("scan request")
            .json::<Vec<ScanAreaRecord>>()
            .await
            .expect("parse scan coords");
        assert_eq!(scan[1].kind, ScanAreaKind::ScanBlacklist);

        app_handle.abort();
        backend_handle.abort();
    }

    #[tokio::test]
    async fn passes_through_upstream_error_status() {
        let (backend_addr, backend_handle) = spawn_router(fake_backend()).await;
        let (base_url, app_handle) = spawn_app(format!("http://{backend_addr}")).await;

        let resp = reqwest::get(format!("{base_url}/L12cells"))
            .await
            .expect("cells request");
        assert_eq!(resp.status().as_u16(), 500);

        app_handle.abort();
        backend_handle.abort();
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind throwaway listener");
        let dead_addr = listener.local_addr().expect("throwaway address");
        drop(listener);

        let (base_url, app_handle) = spawn_app(format!("http://{dead_addr}")).await;
        let resp = reqwest::get(format!("{base_url}/parks"))
            .await
            .expect("parks request");
        assert_eq!(resp.status().as_u16(), 502);

        app_handle.abort();
    }

    #[tokio::test]
    async fn forwards_icons_with_upstream_content_type() {
        let (backend_addr, backend_handle) = spawn_router(fake_backend()).await;
        let (base_url, app_handle) = spawn_app(format!("http://{backend_addr}")).await;

        let resp = reqwest::get(format!("{base_url}/static/monocle-icons/icons/129.png"))
            .await
            .expect("icon request");
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(
            resp.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("image/png")
        );
        assert_eq!(
            resp.headers()
                .get(reqwest::header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("public, max-age=86400")
        );
        let body = resp.bytes().await.expect("icon body");
        assert_eq!(&body[..], &[0x89u8, b'P', b'N', b'G'][..]);

        let missing = reqwest::get(format!("{base_url}/static/monocle-icons/icons/999.png"))
            .await
            .expect("missing icon request");
        assert_eq!(missing.status().as_u16(), 404);

        app_handle.abort();
        backend_handle.abort();
    }

    #[test]
    fn icon_paths_stay_inside_icon_directory() {
        assert!(is_safe_icon_path("icons/129.png"));
        assert!(!is_safe_icon_path("../secret"));
        assert!(!is_safe_icon_path("icons/../../x"));
        assert!(!is_safe_icon_path("icons//129.png"));
        assert!(!is_safe_icon_path(""));
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            ProxyError::Transport("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ProxyError::Status(404).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ProxyError::BadPath.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProxyError::Body("eof".into()).to_string(),
            "upstream body error: eof"
        );
    }
}
