use ikigai_api::{config::Config, create_router, services::AppState};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export only when an endpoint is configured
    let provider = init_telemetry()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ikigai_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    match &provider {
        Some(provider) => {
            use opentelemetry::trace::TracerProvider as _;
            registry
                .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("ikigai-api")))
                .init();
        }
        None => registry.init(),
    }

    tracing::info!("Starting IKIGAI progress API");

    let config = Config::load()?;
    tracing::info!(
        storage_backend = ?config.storage_backend,
        "Configuration loaded for environment: {}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let listen_addr = config.listen_addr.clone();
    let app_state = Arc::new(AppState::connect(config).await?);

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = provider {
        tracing::info!("Shutting down OpenTelemetry");
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to flush spans: {}", e);
        }
    }

    Ok(())
}

fn init_telemetry() -> anyhow::Result<Option<SdkTracerProvider>> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::Resource;

    let Ok(otlp_endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()?;

    let resource = Resource::builder_empty()
        .with_service_name("ikigai-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(Some(provider))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
