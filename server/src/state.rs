use std::sync::Arc;

use nestmap_shared::MapConfig;
use tracing::warn;

use crate::config::{upstream_connect_timeout, upstream_http_timeout};

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    /// Monocle backend base URL, without trailing slash.
    pub backend_url: Arc<str>,
    pub map_config: Arc<MapConfig>,
    pub client_dist_dir: Arc<str>,
}

impl AppState {
    pub fn new(backend_url: String, map_config: MapConfig, client_dist_dir: String) -> Self {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("nestmap/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })
            .unwrap_or_else(|e| {
                panic!("failed to build timeout-configured HTTP client: {e}");
            });
        Self {
            http_client,
            backend_url: Arc::from(backend_url.trim_end_matches('/')),
            map_config: Arc::new(map_config),
            client_dist_dir: Arc::from(client_dist_dir),
        }
    }

    /// Full upstream URL for a backend path and optional raw query string.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) => format!("{}{path}?{query}", self.backend_url),
            None => format!("{}{path}", self.backend_url),
        }
    }
}
