// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! OpenTelemetry exporters for traces and metrics

use std::sync::LazyLock;

use anyhow::Context as _;
use opentelemetry::{InstrumentationScope, KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    Resource,
    error::OTelSdkResult,
    metrics::{SdkMeterProvider, periodic_reader_with_async_runtime::PeriodicReader},
    runtime,
    trace::{
        Sampler, SdkTracerProvider, Tracer, span_processor_with_async_runtime::BatchSpanProcessor,
    },
};
use opentelemetry_semantic_conventions as semcov;
use sweep_config::{ExportConfig, ExporterKind, TelemetryConfig, TracingConfig};
use url::Url;

static SCOPE: LazyLock<InstrumentationScope> = LazyLock::new(|| {
    InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semcov::SCHEMA_URL)
        .build()
});

/// The installed exporters, to be flushed before exiting
///
/// Signals whose exporter is `none` get no provider at all, and the global
/// no-op implementation stays in place for them.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// Build the exporters described by the configuration and install them
    /// as the global providers
    pub fn setup(config: &TelemetryConfig) -> anyhow::Result<Self> {
        let resource = resource();

        let tracer_provider = tracer_provider(&config.tracing, resource.clone())
            .context("Failed to configure traces exporter")?;
        let meter_provider = meter_provider(&config.metrics, resource)
            .context("Failed to configure metrics exporter")?;

        if let Some(provider) = &tracer_provider {
            opentelemetry::global::set_tracer_provider(provider.clone());
        }

        if let Some(provider) = &meter_provider {
            opentelemetry::global::set_meter_provider(provider.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
        })
    }

    /// The tracer to bridge `tracing` spans into, if traces are exported
    pub fn tracer(&self) -> Option<Tracer> {
        self.tracer_provider
            .as_ref()
            .map(|provider| provider.tracer_with_scope(SCOPE.clone()))
    }

    /// Flush and stop every exporter
    pub fn shutdown(&self) -> OTelSdkResult {
        if let Some(provider) = &self.tracer_provider {
            provider.shutdown()?;
        }

        if let Some(provider) = &self.meter_provider {
            provider.shutdown()?;
        }

        Ok(())
    }
}

/// Resolve the signal-specific URL under an OTLP/HTTP base URL
fn otlp_endpoint(base: &Url, signal: &str) -> anyhow::Result<String> {
    let url = base
        .join(signal)
        .with_context(|| format!("Invalid OTLP endpoint {base}"))?;
    Ok(url.into())
}

fn tracer_provider(
    config: &TracingConfig,
    resource: Resource,
) -> anyhow::Result<Option<SdkTracerProvider>> {
    // Every invocation is a root trace, there is no parent to follow
    let builder = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::TraceIdRatioBased(
            config.sample_rate.unwrap_or(1.0),
        ));

    let provider = match config.export.exporter {
        ExporterKind::None => return Ok(None),

        ExporterKind::Stdout => builder
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build(),

        ExporterKind::Otlp => {
            let mut exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_http_client(sweep_http::reqwest_client());
            if let Some(base) = &config.export.endpoint {
                exporter = exporter.with_endpoint(otlp_endpoint(base, "v1/traces")?);
            }
            let exporter = exporter.build()?;

            builder
                .with_span_processor(BatchSpanProcessor::builder(exporter, runtime::Tokio).build())
                .build()
        }
    };

    Ok(Some(provider))
}

fn meter_provider(
    config: &ExportConfig,
    resource: Resource,
) -> anyhow::Result<Option<SdkMeterProvider>> {
    let builder = SdkMeterProvider::builder().with_resource(resource);

    let provider = match config.exporter {
        ExporterKind::None => return Ok(None),

        ExporterKind::Stdout => {
            let exporter = opentelemetry_stdout::MetricExporter::builder().build();
            builder
                .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
                .build()
        }

        ExporterKind::Otlp => {
            let mut exporter = opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .with_http_client(sweep_http::reqwest_client());
            if let Some(base) = &config.endpoint {
                exporter = exporter.with_endpoint(otlp_endpoint(base, "v1/metrics")?);
            }
            let exporter = exporter.build()?;

            builder
                .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
                .build()
        }
    };

    Ok(Some(provider))
}

fn resource() -> Resource {
    Resource::builder()
        .with_service_name("tieba-sweep")
        .with_detectors(&[
            Box::new(opentelemetry_resource_detectors::HostResourceDetector::default()),
            Box::new(opentelemetry_resource_detectors::OsResourceDetector),
            Box::new(opentelemetry_resource_detectors::ProcessResourceDetector),
        ])
        .with_attributes([KeyValue::new(
            semcov::resource::SERVICE_VERSION,
            crate::VERSION,
        )])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otlp_endpoint_appends_the_signal_path() {
        let base: Url = "http://collector:4318".parse().unwrap();
        assert_eq!(
            otlp_endpoint(&base, "v1/traces").unwrap(),
            "http://collector:4318/v1/traces"
        );

        let base: Url = "https://otel.example.com/ingest/".parse().unwrap();
        assert_eq!(
            otlp_endpoint(&base, "v1/metrics").unwrap(),
            "https://otel.example.com/ingest/v1/metrics"
        );
    }

    #[test]
    fn nothing_is_installed_without_exporters() {
        let telemetry = Telemetry::setup(&TelemetryConfig::default()).unwrap();
        assert!(telemetry.tracer().is_none());
        telemetry.shutdown().unwrap();
    }
}
