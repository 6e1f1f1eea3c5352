//! HTTP surface of the stream hub: the SSE endpoint, history replay and the
//! API docs.

use domain::Authenticator;
use log::*;
use service::config::Config;
use ::sse::Hub;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

mod controller;
mod error;
mod extractors;
mod params;
pub mod router;
mod sse;

pub use error::{Error, Result};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(config: Config, hub: Arc<Hub>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            config,
            hub,
            authenticator,
        }
    }
}

/// Serves the API until `shutdown` resolves, then closes every stream so the
/// graceful shutdown is not held open by long-lived responses.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{interface}:{}", app_state.config.port);

    let hub = Arc::clone(&app_state.hub);
    let app = router::define_routes(app_state);

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        info!("Shutdown signal received, closing streams");
        hub.shutdown();
    })
    .await
}
