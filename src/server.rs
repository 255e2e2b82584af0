use std::net::SocketAddr;

use axum::{Extension, Router, routing::get};

use crate::api::{self, CallbackState};

pub fn router(state: CallbackState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback).layer(Extension(state)))
}

/// Serves the callback endpoints on `addr` until the process exits.
pub async fn start_api_server(state: CallbackState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await
}
