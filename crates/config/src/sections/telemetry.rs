// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_at},
};

fn sample_rate_example() -> f64 {
    0.1
}

#[allow(clippy::unnecessary_wraps)]
fn otlp_endpoint_example() -> Option<String> {
    Some("http://localhost:4318".to_owned())
}

/// Where to send telemetry data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    /// Don't export anything
    #[default]
    None,

    /// Print to the standard output. Only useful for debugging
    Stdout,

    /// Send to an OpenTelemetry collector over HTTP
    Otlp,
}

/// Exporter settings, shared by traces and metrics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExportConfig {
    /// Exporter to use
    #[serde(default)]
    pub exporter: ExporterKind,

    /// Base URL of the OTLP/HTTP collector, when using the `otlp` exporter.
    /// Defaults to what the `OTEL_EXPORTER_OTLP_ENDPOINT` environment
    /// variable says, or `http://localhost:4318`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(url, example = "otlp_endpoint_example")]
    pub endpoint: Option<Url>,
}

impl ExportConfig {
    fn is_default(&self) -> bool {
        self == &Self::default()
    }

    fn validate_at(&self, figment: &figment::Figment, path: &str) -> Result<(), BoxError> {
        if let Some(endpoint) = &self.endpoint
            && !matches!(endpoint.scheme(), "http" | "https")
        {
            return Err(invalid_at(
                figment,
                &format!("{path}.endpoint"),
                "The OTLP endpoint must be an HTTP or HTTPS URL",
            ));
        }

        Ok(())
    }
}

/// Configuration related to exporting traces
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TracingConfig {
    /// Exporter settings
    #[serde(flatten)]
    pub export: ExportConfig,

    /// Fraction of the runs to trace, defaults to `1.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(example = "sample_rate_example", range(min = 0.0, max = 1.0))]
    pub sample_rate: Option<f64>,
}

impl TracingConfig {
    fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

/// Configuration related to sending monitoring data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TelemetryConfig {
    /// Configuration related to exporting traces
    #[serde(default, skip_serializing_if = "TracingConfig::is_default")]
    pub tracing: TracingConfig,

    /// Configuration related to exporting metrics
    #[serde(default, skip_serializing_if = "ExportConfig::is_default")]
    pub metrics: ExportConfig,
}

impl TelemetryConfig {
    pub(crate) fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

impl ConfigurationSection for TelemetryConfig {
    const PATH: Option<&'static str> = Some("telemetry");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        if let Some(sample_rate) = self.tracing.sample_rate
            && !(0.0..=1.0).contains(&sample_rate)
        {
            return Err(invalid_at(
                figment,
                "telemetry.tracing.sample_rate",
                "Tracing sample rate must be between 0.0 and 1.0",
            ));
        }

        self.tracing
            .export
            .validate_at(figment, "telemetry.tracing")?;
        self.metrics.validate_at(figment, "telemetry.metrics")?;

        Ok(())
    }
}
