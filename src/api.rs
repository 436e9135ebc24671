use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

use crate::engine::HealthMonitor;
use crate::models::StatusSnapshot;

pub async fn get_status(State(monitor): State<Arc<HealthMonitor>>) -> Json<StatusSnapshot> {
    Json(monitor.snapshot())
}

pub async fn recheck_all(State(monitor): State<Arc<HealthMonitor>>) -> Json<StatusSnapshot> {
    monitor.check_all().await;
    Json(monitor.snapshot())
}

pub async fn recheck_one(
    Path(key): Path<String>,
    State(monitor): State<Arc<HealthMonitor>>,
) -> impl IntoResponse {
    match monitor.check_one(&key).await {
        Some(outcome) => Json(outcome).into_response(),
        None => (StatusCode::NOT_FOUND, format!("Unknown probe target: {}", key)).into_response(),
    }
}

pub fn create_router(monitor: Arc<HealthMonitor>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/status/check", post(recheck_all))
        .route("/api/status/check/{key}", post(recheck_one))
        .fallback_service(ServeDir::new("public"))
        .with_state(monitor)
}

pub async fn start_server(port: u16, monitor: Arc<HealthMonitor>) {
    let app = create_router(monitor);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Status API: http://localhost:{}", addr.port());
    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind API port");
    axum::serve(listener, app).await.unwrap();
}
