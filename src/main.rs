use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use backoffice_notification_service::clock::SystemClock;
use backoffice_notification_service::config::Settings;
use backoffice_notification_service::database::DatabasePool;
use backoffice_notification_service::engine::{EngineOptions, NotificationEngine};
use backoffice_notification_service::mailer::create_mailer;
use backoffice_notification_service::scheduler::NotificationScheduler;
use backoffice_notification_service::server::{create_app, AppState};
use backoffice_notification_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (and OTLP export when enabled)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Record store
    let db = DatabasePool::connect(&settings.database).await?;

    // Mail transport
    let mailer = create_mailer(&settings.smtp)?;
    tracing::info!(backend = mailer.backend_name(), "Mailer initialized");

    let engine = NotificationEngine::new(
        db.pool().clone(),
        mailer,
        Arc::new(SystemClock),
        EngineOptions::from(&settings.app),
    );

    // Reminder schedule
    let scheduler = if settings.scheduler.enabled {
        let mut scheduler = NotificationScheduler::new(engine.clone()).await?;
        scheduler.register_from_config(&settings.scheduler).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let state = AppState::new(settings.clone(), db.clone(), engine.clone());
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    if let Some(mut scheduler) = scheduler {
        if let Err(e) = scheduler.shutdown().await {
            tracing::error!(error = %e, "Failed to stop scheduler");
        }
    }

    // Let outstanding deliveries record their terminal status
    let grace = Duration::from_secs(settings.scheduler.delivery_grace_seconds);
    tracing::info!(
        in_flight = engine.sender().deliveries().in_flight(),
        "Waiting for outstanding deliveries..."
    );
    if tokio::time::timeout(grace, engine.wait_for_deliveries())
        .await
        .is_err()
    {
        let outstanding = engine.sender().deliveries().outstanding();
        tracing::warn!(
            in_flight = outstanding.len(),
            "Deliveries still running after grace period"
        );
        for notification_id in &outstanding {
            tracing::warn!(
                notification_id = %notification_id,
                "Notification left inflight at shutdown"
            );
        }
    }

    db.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
