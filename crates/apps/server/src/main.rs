use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use scene::ViewpointGraph;
use server::{router, AppState};
use store::{FileBackend, HotspotSnapshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = env::var("HOTSPOTS_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
        .parse()
        .expect("invalid HOTSPOTS_ADDR");
    let data_path = env::var("HOTSPOTS_DATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/hotspots.json"));
    let upload_root = env::var("UPLOAD_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public"));

    let defaults = match env::var("VIEWPOINTS_CONFIG") {
        Ok(path) => load_defaults(&path),
        Err(_) => HotspotSnapshot::new(),
    };

    let backend = FileBackend::open(&data_path, defaults).expect("failed to open hotspot data");
    if let Err(err) = tokio::fs::create_dir_all(&upload_root).await {
        warn!("failed to create upload root: {err}");
    }

    let app = router(AppState::new(backend, upload_root));

    info!("hotspot server listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

/// Default hotspots shipped with the viewpoint configuration; empty on error.
fn load_defaults(path: &str) -> HotspotSnapshot {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("failed to read viewpoint config {path}: {err}");
            return HotspotSnapshot::new();
        }
    };
    match ViewpointGraph::from_json_str(&raw) {
        Ok(graph) => graph.default_hotspots(),
        Err(err) => {
            warn!("invalid viewpoint config {path}: {err}");
            HotspotSnapshot::new()
        }
    }
}
