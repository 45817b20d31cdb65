//! Stand-in for the detection service.
//!
//! Serves the same HTTP interface as the real service but answers `/api/detect` with fixed
//! detections scaled to the uploaded image.
use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;

pub mod endpoints;
pub mod mock;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Build the router with all endpoints.
pub fn app() -> Router {
    Router::new()
        .route("/api/", get(endpoints::root))
        .route("/api/health", get(endpoints::healthcheck))
        .route("/api/model-info", get(endpoints::model_info))
        .route("/api/detect", post(endpoints::detect))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Serve `router` on `addr` in a separate task.
///
/// Returns the bound address, which differs from `addr` when binding to port 0.
pub async fn spawn_server(
    router: Router,
    addr: &str,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let addr: SocketAddr = addr.parse()?;
    let server = axum::Server::try_bind(&addr)?.serve(router.into_make_service());
    let local_addr = server.local_addr();
    log::info!("Serving on {}", &local_addr);

    let handle = tokio::spawn(async move {
        server.await?;
        Ok::<_, anyhow::Error>(())
    });

    Ok((local_addr, handle))
}
