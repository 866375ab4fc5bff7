//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::routes;
use crate::core::CoreApp;

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Router serving the collector's routes under the mount path
    pub fn router(app: &CoreApp) -> Router {
        Router::new()
            .nest(
                &app.config.capture.mount_path,
                routes::routes(app.tracker.clone()),
            )
            .fallback(middleware::handle_404)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until shutdown; returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app } = self;
        let shutdown = app.shutdown.clone();

        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);
        let router = Self::router(&app);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            "Health check at http://{}{}/health",
            addr,
            app.config.capture.mount_path
        );
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}
