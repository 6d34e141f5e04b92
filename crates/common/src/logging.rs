use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::Layered, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initialize tracing subscriber with pretty formatting for development
/// and JSON formatting for production.
///
/// `RUST_LOG` takes precedence; otherwise `log_level` is used, falling back to "info".
pub fn setup_logging(log_level: Option<&str>, environment: Environment) {
    install(tracing_opentelemetry::layer(), log_level, environment);
}

/// Install the subscriber with the given OpenTelemetry bridge layer.
pub(crate) fn install<L>(otel_layer: L, log_level: Option<&str>, environment: Environment)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.unwrap_or("info").into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer);

    let result = match environment {
        Environment::Production => registry
            .with(tracing_subscriber::fmt::layer().json().with_level(true))
            .try_init(),
        Environment::Development => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}
