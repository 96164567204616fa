use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    message::{SendMessageRequest, SendMessageResponse},
    registry::ConnectionRegistry,
    session,
};

pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
}

impl RelayServer {
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the registry the server routes through.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let RelayServer { listener, registry } = self;
        let app = router(Arc::clone(&registry));

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                handle_shutdown(&registry).await;
            })
            .await
            .context("relay server failed")
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

async fn handle_shutdown(registry: &ConnectionRegistry) {
    let closed = registry.close_all().await;
    info!(closed, "relay shutting down");
}

pub fn router(registry: Arc<ConnectionRegistry>) -> Router {
    Router::new()
        .route("/ws/:identity", get(ws_upgrade))
        .route("/send-message", post(send_message))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn ws_upgrade(
    Path(identity): Path<String>,
    State(registry): State<Arc<ConnectionRegistry>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| session::run_session(socket, registry, identity))
}

/// Relays a submission and acknowledges it whatever the delivery outcome.
async fn send_message(
    State(registry): State<Arc<ConnectionRegistry>>,
    Json(request): Json<SendMessageRequest>,
) -> Json<SendMessageResponse> {
    let outcome = registry
        .send(&request.receiver, request.relay_text())
        .await;
    info!(
        sender = %request.sender,
        receiver = %request.receiver,
        ?outcome,
        "message submitted"
    );

    Json(SendMessageResponse::sent())
}
