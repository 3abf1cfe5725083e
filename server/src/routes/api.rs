use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "backend_url": &*state.backend_url,
        "area_name": state.map_config.area_name,
    }))
}

/// Page settings for the client, read once from the environment at startup.
pub async fn map_config(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json((*state.map_config).clone()),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use nestmap_shared::MapConfig;
    use tower::ServiceExt;

    use crate::state::AppState;

    fn test_state() -> AppState {
        AppState::new(
            "http://monocle.invalid".to_owned(),
            MapConfig {
                area_name: "Springfield".to_owned(),
                center: [40.5, -73.25],
                ..MapConfig::default()
            },
            "client/dist".to_owned(),
        )
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = crate::app::build_app(test_state());
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).expect("build request"))
            .await
            .expect("route request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&bytes).expect("parse json body");
        (status, value)
    }

    #[tokio::test]
    async fn map_config_serves_configured_page_settings() {
        let (status, body) = get_json("/api/map_config").await;
        assert_eq!(status, StatusCode::OK);
        let config: MapConfig = serde_json::from_value(body).expect("decode map config");
        assert_eq!(config.area_name, "Springfield");
        assert_eq!(config.center, [40.5, -73.25]);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(
            body.get("backend_url").and_then(|v| v.as_str()),
            Some("http://monocle.invalid")
        );
    }
}
