//! Voice Dialer Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_dialer_agent::{CallOrchestrator, OrchestratorOptions};
use voice_dialer_config::{load_settings, Settings};
use voice_dialer_core::CallSummarySink;
use voice_dialer_persistence::{create_summary_sink, InMemorySummaryStore};
use voice_dialer_pipeline::create_recognizer_factory;
use voice_dialer_server::{create_router, init_metrics, spawn_event_recorder, AppState};
use voice_dialer_transport::create_signaling_provider;

/// Time given to the summary writer after live calls are ended on shutdown
const SHUTDOWN_DRAIN: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICE_DIALER_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);

    tracing::info!("Starting Voice Dialer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_path = env.as_deref().unwrap_or("default"),
        provider = ?settings.telephony.provider,
        recognizer = ?settings.media.recognizer,
        "Configuration loaded"
    );

    let metrics_handle = if settings.observability.metrics_enabled {
        let handle = init_metrics();
        tracing::info!("Initialized Prometheus metrics at /metrics");
        handle
    } else {
        None
    };

    let (provider_tx, provider_rx) = mpsc::unbounded_channel();
    let provider = create_signaling_provider(&settings.telephony, provider_tx)?;
    let recognizers = create_recognizer_factory(&settings.media)?;

    let sink: Arc<dyn CallSummarySink> = match create_summary_sink(&settings.persistence).await {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!(
                "Failed to initialize ScyllaDB: {}. Falling back to in-memory.",
                e
            );
            Arc::new(InMemorySummaryStore::new())
        }
    };

    let orchestrator = CallOrchestrator::new(
        provider,
        recognizers,
        sink,
        OrchestratorOptions::from_settings(&settings),
    );
    orchestrator.spawn_provider_listener(provider_rx);
    if metrics_handle.is_some() {
        spawn_event_recorder(&orchestrator);
    }

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!(
        public_url = %settings.server.public_base_url,
        media_stream = %settings.server.media_stream_url(),
        "Webhooks and media stream configured"
    );

    let state = AppState::new(settings, orchestrator.clone()).with_metrics(metrics_handle);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let ended = orchestrator.end_all();
    if ended > 0 {
        tokio::time::sleep(SHUTDOWN_DRAIN).await;
    }

    tracing::info!(ended, "Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("voice_dialer={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
