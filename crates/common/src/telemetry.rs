use crate::Environment;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use std::time::Duration;

/// Keeps the OTLP trace and metric pipelines alive; dropping it flushes both.
///
/// Create it inside a Tokio runtime that lives at least as long as the guard.
pub struct TelemetryGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

impl TelemetryGuard {
    /// Export spans and metrics to the collector at `endpoint` and install the
    /// subscriber (see [`crate::setup_logging`] for `log_level`/`environment`).
    pub fn init(
        service_name: &str,
        endpoint: &str,
        log_level: Option<&str>,
        environment: Environment,
    ) -> anyhow::Result<Self> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let resource = service_resource(service_name);
        let tracer_provider = tracer_provider(endpoint, resource.clone())?;
        let meter_provider = meter_provider(endpoint, resource)?;

        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        let tracer = global::tracer(service_name.to_string());
        crate::logging::install(
            tracing_opentelemetry::layer().with_tracer(tracer),
            log_level,
            environment,
        );

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }
}

fn service_resource(service_name: &str) -> Resource {
    use opentelemetry_semantic_conventions::attribute::{SERVICE_NAME, SERVICE_VERSION};

    Resource::builder()
        .with_attributes([
            KeyValue::new(SERVICE_NAME, service_name.to_string()),
            KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        ])
        .build()
}

fn tracer_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_batch_exporter(exporter)
        .build())
}

fn meter_provider(endpoint: &str, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Tracer provider shutdown failed: {e:?}");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("Meter provider shutdown failed: {e:?}");
        }
    }
}

/// Entered info span, dropped at end of scope.
#[macro_export]
macro_rules! span {
    ($name:literal) => {
        tracing::info_span!($name).entered()
    };
}

/// Same as [`span!`] at debug level.
#[macro_export]
macro_rules! span_debug {
    ($name:literal) => {
        tracing::debug_span!($name).entered()
    };
}
