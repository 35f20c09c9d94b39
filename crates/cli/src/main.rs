// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

use std::{io::IsTerminal, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use opentelemetry_sdk::trace::Tracer;
use sweep_config::{ConfigurationSectionExt, TelemetryConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::telemetry::Telemetry;

mod commands;
mod shutdown;
mod telemetry;
mod util;

/// The application version, as reported by `git describe` at build time
static VERSION: &str = match option_env!("SWEEP_VERSION") {
    Some(version) => version,
    None => match option_env!("SWEEP_GIT_VERSION") {
        Some(version) => version,
        None => env!("CARGO_PKG_VERSION"),
    },
};

fn main() -> anyhow::Result<ExitCode> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

/// Install the logging pipeline: human-readable lines on stderr, plus the
/// OpenTelemetry bridge when traces are exported
///
/// The returned guard flushes the log writer when dropped.
fn init_logging(tracer: Option<Tracer>) -> anyhow::Result<WorkerGuard> {
    let output = std::io::stderr();
    let with_ansi = output.is_terminal();
    let (writer, guard) = tracing_appender::non_blocking(output);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(with_ansi);

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("could not setup logging filter")?;

    let telemetry_layer = tracer.map(|tracer| {
        tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_tracked_inactivity(false)
            .with_filter(LevelFilter::INFO)
    });

    Registry::default()
        .with(telemetry_layer)
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .context("could not initialize logging")?;

    Ok(guard)
}

async fn async_main() -> anyhow::Result<ExitCode> {
    // Logging isn't up yet, so the outcome is reported further down
    let dotenv: Result<Option<PathBuf>, dotenvy::Error> = match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    };

    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("could not install the AWS LC crypto provider"))?;

    let opts = self::commands::Options::parse();
    let figment = opts.figment();

    let telemetry_config = TelemetryConfig::extract_or_default(&figment)
        .map_err(anyhow::Error::from_boxed)
        .context("Failed to load telemetry config")?;
    let telemetry = Telemetry::setup(&telemetry_config).context("failed to setup OpenTelemetry")?;

    let _log_guard = init_logging(telemetry.tracer())?;

    match dotenv {
        Ok(Some(path)) => tracing::info!(?path, "Loaded environment variables from .env file"),
        Ok(None) => {}
        Err(e) => tracing::warn!(?e, "Failed to load .env file"),
    }

    tracing::trace!(?opts, "Running command");
    let result = opts.run(&figment).await;

    // Flush the exporters whatever the outcome of the command
    if let Err(err) = telemetry.shutdown() {
        tracing::warn!(
            error = &err as &dyn std::error::Error,
            "Failed to shutdown telemetry exporters"
        );
    }

    result
}
