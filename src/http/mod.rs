// HTTP surface - axum router over the console service, operation bridge and backups

mod error;
mod handlers;

pub use error::ApiError;

use crate::config::PanelConfig;
use crate::console::ConsoleService;
use crate::instances::InstanceRegistry;
use crate::logs::LogService;
use crate::operations::{BackupStore, OperationBridge};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub console: Arc<ConsoleService>,
    pub bridge: OperationBridge,
    pub backups: BackupStore,
    pub logs: Arc<LogService>,
}

impl AppState {
    pub fn new(config: &PanelConfig, registry: Arc<InstanceRegistry>) -> Self {
        Self {
            console: Arc::new(ConsoleService::new(registry.clone(), config.rcon.clone())),
            logs: Arc::new(LogService::new(registry.clone())),
            bridge: OperationBridge::new(
                registry,
                config.operations.clone(),
                config.backups.clone(),
            ),
            backups: BackupStore::new(config.backups.dir.clone()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/players", get(handlers::list_players))
        .route("/api/messages", post(handlers::send_message))
        .route("/api/rcon", post(handlers::run_rcon))
        .route("/api/server/status", get(handlers::server_status))
        .route("/api/logs/:kind", get(handlers::read_log))
        .route("/api/logs/:kind/stats", get(handlers::log_stats))
        .route(
            "/api/server/logs/stream/:operation",
            get(handlers::stream_operation),
        )
        .route("/api/backups", get(handlers::list_backups))
        .route("/api/backups/:filename", delete(handlers::delete_backup))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    /// Service commands become `echo`, so every operation runs without touching systemd
    fn echo_config() -> PanelConfig {
        let mut config = PanelConfig::default();
        config.operations.use_sudo = false;
        config.operations.systemctl = "echo".to_string();
        config.operations.journalctl = "echo".to_string();
        config.operations.settle_delay_ms = 10;
        config
    }

    fn app(config: &PanelConfig) -> Router {
        router(AppState::new(config, Arc::new(InstanceRegistry::single(config))))
    }

    async fn fetch(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_operation_stream_wire_format() {
        let response = fetch(app(&echo_config()), "/api/server/logs/stream/start").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let text = body_text(response).await;
        assert!(text.ends_with("\n\n"));

        let frames: Vec<Value> = text
            .split("\n\n")
            .filter(|frame| !frame.is_empty())
            .map(|frame| {
                let data = frame
                    .strip_prefix("data: ")
                    .unwrap_or_else(|| panic!("frame without data prefix: {:?}", frame));
                assert!(!data.contains('\n'), "multi-line frame: {:?}", frame);
                serde_json::from_str(data).unwrap()
            })
            .collect();

        assert!(frames.len() > 2);
        assert!(frames
            .iter()
            .any(|f| f["log"].as_str().map_or(false, |l| l.contains("start pzserver"))));

        let last = frames.last().unwrap();
        assert_eq!(last["complete"], true);
        assert_eq!(last["success"], true);
        assert!(last["timestamp"].is_string());
        assert_eq!(
            frames.iter().filter(|f| f.get("complete").is_some()).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_operation_route_is_bad_request() {
        let response = fetch(app(&echo_config()), "/api/server/logs/stream/reboot").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_server_status_route() {
        let response = fetch(app(&echo_config()), "/api/server/status").await;
        assert_eq!(response.status(), StatusCode::OK);

        let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["running"], false);
        assert_eq!(value["status"], "stopped");
        assert!(value["pid"].is_null());
    }

    #[tokio::test]
    async fn test_log_routes() {
        let dir = std::env::temp_dir().join(format!("pzpanel-http-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let log = dir.join("server-console.txt");
        std::fs::write(&log, "boot\nloading map\nERROR: mod failed\nready\n").unwrap();

        let mut config = echo_config();
        config.service.log_path = Some(log);

        let response = fetch(app(&config), "/api/logs/main?lines=2").await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["content"], "ERROR: mod failed\nready");
        assert_eq!(value["lines"], 2);

        let response = fetch(app(&config), "/api/logs/main/stats").await;
        let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["totalLines"], 4);
        assert!(value["fileSizeFormatted"].is_string());

        let response = fetch(app(&config), "/api/logs/debug").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unconfigured_log_route_is_not_found() {
        let response = fetch(app(&echo_config()), "/api/logs/maintenance").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
