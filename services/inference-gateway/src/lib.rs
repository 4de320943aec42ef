//! Model-serving gateway: lazy model registry, prediction dispatch and the HTTP API around them.

use anyhow::Result;
use gateway_core::{load_settings, Settings};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub mod api;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod registry;

pub use api::{router, AppState};
pub use dispatch::Dispatcher;
pub use registry::{ModelRegistry, DEFAULT_KEY};

pub const SERVICE_NAME: &str = "inference-gateway";

/// Loads settings and serves until ctrl-c.
pub async fn run() -> Result<()> {
    let settings = load_settings(SERVICE_NAME)?;
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    serve(listener, settings, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves, then unloads models.
pub async fn serve<F>(listener: TcpListener, settings: Settings, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(service=%settings.service_name, title=%settings.api_title, version=%settings.api_version, model_dir=%settings.model_dir.display(), default_model=%settings.default_model_path().display(), "gateway_config");
    info!(epochs=settings.training.epochs, batch_size=settings.training.batch_size, learning_rate=settings.training.learning_rate, "training_defaults");
    let registry = Arc::new(ModelRegistry::new(settings.model_dir.clone(), settings.default_model_file.clone()));
    if settings.preload {
        let r = registry.clone();
        tokio::task::spawn_blocking(move || r.preload()).await?;
    }
    let app = router(AppState::new(Dispatcher::new(registry.clone())));
    info!(addr=%listener.local_addr()?, "gateway_listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    registry.clear();
    info!("gateway_stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown_signal_received"),
        Err(e) => warn!(error=?e, "ctrl_c handler failed, shutting down"),
    }
}
