pub mod handlers;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::{routing::post, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::service::CustodyService;

#[derive(Clone)]
pub struct RpcState {
    pub service: Arc<CustodyService>,
}

pub struct RpcServer {
    state: RpcState,
}

impl RpcServer {
    pub fn new(service: Arc<CustodyService>) -> Self {
        Self {
            state: RpcState { service },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handlers::handle_rpc_request))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind `bind_addr` and serve until `shutdown` resolves
    pub async fn start(self, bind_addr: &str, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()> + Send + 'static) -> std::io::Result<()> {
        info!("RPC server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
