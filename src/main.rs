// PZ Panel - Main entry point
// Serves the admin API for a Project Zomboid dedicated server

use pzpanel_lib::config::PanelConfig;
use pzpanel_lib::http::{router, AppState};
use pzpanel_lib::instances::InstanceRegistry;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Keep the HTTP stack quiet unless asked
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("tower_http=warn".parse().unwrap())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = PanelConfig::default_path();
    let config = PanelConfig::load(&config_path).expect("Failed to load panel config");

    let registry = match &config.instances_path {
        Some(path) => InstanceRegistry::load(path, &config).expect("Failed to load instances"),
        None => InstanceRegistry::single(&config),
    };
    tracing::info!("Managing {} server instance(s)", registry.list().len());

    let app = router(AppState::new(&config, Arc::new(registry)));

    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .expect("Failed to bind HTTP listener");
    tracing::info!("PZ Panel listening on {}", config.http.bind);

    axum::serve(listener, app).await.expect("HTTP server error");
}
