use axum::{extract::State, response::Json, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::status::StatusSnapshot;

#[derive(Clone)]
struct HttpState {
    status_rx: watch::Receiver<StatusSnapshot>,
}

pub fn router(status_rx: watch::Receiver<StatusSnapshot>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .layer(CorsLayer::permissive())
        .with_state(HttpState { status_rx })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    status_rx: watch::Receiver<StatusSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(status_rx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("Status API listening on http://{}/api/state", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<StatusSnapshot> {
    Json(state.status_rx.borrow().clone())
}
