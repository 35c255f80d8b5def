use std::net::SocketAddr;
use std::sync::Arc;

use relax_api::config::ServerConfig;
use relax_api::router::build_app_router;
use relax_api::state::AppState;
use relax_compute::PotentialConfig;
use relax_core::slab::SlabBuilder;
use relax_engine::{EngineConfig, RelaxationService};
use relax_materials::MaterialsProjectClient;
use relax_store::InMemoryJobRepo;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relax_api=debug,relax_engine=debug,relax_materials=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        workers = engine_config.workers,
        isolation = ?engine_config.isolation,
        "Loaded server configuration",
    );
    if config.mp_api_key.is_none() {
        tracing::warn!("MP_API_KEY not set; requests must carry their own key");
    }

    // --- Relaxation service ---
    let factory = Arc::new(PotentialConfig::from_env().factory());
    let service = RelaxationService::start(
        Arc::new(InMemoryJobRepo::new()),
        Arc::new(MaterialsProjectClient::new(config.mp_api_url.clone())),
        Arc::new(SlabBuilder::default()),
        engine_config.backend(factory),
        engine_config.service_config(),
    );

    // --- App state ---
    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    service.shutdown().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
