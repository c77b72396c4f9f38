use advisory_auth::{
    build_router,
    config::AdvisoryConfig,
    services::{
        spawn_compaction_task, InMemoryIdentityRepository, InMemoryRevocationStore,
        RevocationStore, SystemClock,
    },
    AppState,
};
use secrecy::ExposeSecret;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = AdvisoryConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting advisory authentication service"
    );

    let clock = Arc::new(SystemClock);

    let revocations: Arc<dyn RevocationStore> = Arc::new(
        InMemoryRevocationStore::new(
            config.revocation_retention(),
            config.revocation.compaction_threshold,
            clock.clone(),
        )
        .with_identity_retention(config.identity_revocation_retention()),
    );
    let identities = Arc::new(InMemoryIdentityRepository::new(clock.clone()));
    tracing::info!(
        retention_hours = config.revocation.retention_hours,
        identity_retention_hours = config.identity_revocation_retention().num_hours(),
        compaction_threshold = config.revocation.compaction_threshold,
        "Revocation store initialized"
    );

    let shutdown = CancellationToken::new();
    let compaction = spawn_compaction_task(
        revocations.clone(),
        Duration::from_secs(config.revocation.compaction_interval_seconds),
        shutdown.clone(),
    );

    let bootstrap_admin = config.bootstrap_admin.clone();
    let port = config.common.port;
    let service_name = config.service_name.clone();
    let service_version = config.service_version.clone();

    let state = AppState::new(config, identities, revocations, clock)?;

    if let Some(admin) = bootstrap_admin {
        state
            .auth_service
            .bootstrap_admin(
                &admin.email,
                admin.password.expose_secret().to_string(),
                &admin.name,
            )
            .await?;
    }

    // Build application router
    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let service_span = tracing::info_span!(
        "service",
        service = %service_name,
        version = %service_version,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    if let Err(e) = compaction.await {
        tracing::error!(error = %e, "Revocation compaction task ended abnormally");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
