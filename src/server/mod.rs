//! HTTP bridge between the chat transport and the conversation engine.
//!
//! The transport posts one inbound event per request and renders whatever
//! response descriptors come back. Requests must carry the shared transport
//! token; everything else about delivery lives on the transport side.

mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::ConversationEngine;

pub fn build_router(engine: Arc<ConversationEngine>, transport_token: String) -> Router {
    let state = Arc::new(AppState { engine, transport_token });

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/event", post(handlers::event))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(
    host: &str,
    port: u16,
    engine: Arc<ConversationEngine>,
    transport_token: String,
) -> std::io::Result<()> {
    let app = build_router(engine, transport_token);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "event bridge listening");
    axum::serve(listener, app).await
}
