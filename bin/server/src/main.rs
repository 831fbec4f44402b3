use befree_server::{
    app,
    auth::{AppState, SupabaseIdentity},
    config::ServerConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load and validate configuration before touching the network
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };
    let backend = match config.validate() {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(environment = ?config.environment, "loaded configuration");

    let http = reqwest::Client::new();
    let identity = Arc::new(SupabaseIdentity::new(
        http.clone(),
        backend.clone(),
        config.session.secure_cookies,
    ));

    let state = AppState::new(
        identity,
        backend,
        http,
        config.environment,
        config.session.secure_cookies,
    );
    let router = app::router(Arc::new(state), &config.static_dir);

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.listen_addr, "failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!("listening on http://{}", config.listen_addr);

    if let Err(e) = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
