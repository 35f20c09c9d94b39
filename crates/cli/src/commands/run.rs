// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use figment::Figment;
use sweep_config::{CategoriesConfig, ConfigurationSection, RootConfig};
use sweep_engine::{Category, DryRun, Engine, Progress, ProgressStage, RunConfig, RunResult};
use sweep_tieba::{CategoryKind, TiebaCategory, TiebaConnection};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    shutdown::ShutdownManager,
    util::{connection_from_config, run_config_from_config, session_from_config},
};

/// Exit code when a category was halted by the service or by its error
/// budget
const EXIT_HALTED: u8 = 2;
/// Exit code when interrupted by a signal, as a shell would report SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug, Default)]
pub(super) struct Options {
    /// Only process these categories, regardless of what the configuration
    /// enables. Can be repeated.
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<CategoryKind>,

    /// Run the enabled categories concurrently
    #[arg(long)]
    parallel: bool,

    /// Walk through the listings without deleting anything
    #[arg(long)]
    dry_run: bool,
}

/// A category ready to be handed to the engine
struct Registered {
    kind: CategoryKind,
    run_config: RunConfig,
    category: Arc<dyn Category>,
    progress: Progress,
}

/// Apply the `--category` override on top of the configuration
fn select_categories(config: &CategoriesConfig, only: &[CategoryKind]) -> CategoriesConfig {
    let mut config = config.clone();
    if only.is_empty() {
        return config;
    }

    for kind in CategoryKind::ALL {
        if let Some(category) = config.get_mut(kind.name()) {
            category.enable = only.contains(&kind);
        }
    }

    config
}

fn registry(
    connection: &TiebaConnection,
    config: &CategoriesConfig,
    dry_run: bool,
) -> anyhow::Result<Vec<Registered>> {
    CategoryKind::ALL
        .into_iter()
        .map(|kind| {
            let category_config = config
                .get(kind.name())
                .with_context(|| format!("No configuration for category {kind}"))?;
            let run_config = run_config_from_config(category_config)
                .with_context(|| format!("Invalid configuration for category {kind}"))?;

            let category = TiebaCategory::new(kind, connection.clone());
            let category: Arc<dyn Category> = if dry_run {
                Arc::new(DryRun::new(category))
            } else {
                Arc::new(category)
            };

            Ok(Registered {
                kind,
                run_config,
                category,
                progress: Progress::default(),
            })
        })
        .collect()
}

/// Hand out the progress trackers the categories report to
///
/// A tracker has a single current stage, so concurrent runs get one each.
/// Sequential runs share one.
fn assign_progress(registry: &mut [Registered], parallel: bool) -> Vec<Progress> {
    if !parallel {
        let progress = Progress::default();
        for entry in registry.iter_mut() {
            entry.progress = progress.clone();
        }
        return vec![progress];
    }

    registry
        .iter_mut()
        .filter(|entry| entry.run_config.enable)
        .map(|entry| {
            let progress = Progress::default();
            entry.progress = progress.clone();
            progress
        })
        .collect()
}

/// Deleted, failed and skipped entities across all trackers
fn totals(trackers: &[Progress]) -> (u64, u64, u64) {
    trackers.iter().fold((0, 0, 0), |(deleted, failed, skipped), progress| {
        let counters = progress.counters();
        (
            deleted + counters.deleted(),
            failed + counters.failed(),
            skipped + counters.skipped(),
        )
    })
}

fn report(kind: CategoryKind, result: &RunResult) {
    match result {
        RunResult::Disabled => debug!(category = %kind, "Category disabled, skipping"),
        RunResult::Exhausted(stats) => info!(
            category = %kind,
            deleted = stats.succeeded,
            failed = stats.failed,
            pages = stats.pages_fetched,
            "Nothing left to delete"
        ),
        RunResult::Halted { reason, stats } => error!(
            category = %kind,
            ?reason,
            deleted = stats.succeeded,
            failed = stats.failed,
            last_page = stats.last_page,
            "Category halted"
        ),
        RunResult::Cancelled(stats) => warn!(
            category = %kind,
            deleted = stats.succeeded,
            last_page = stats.last_page,
            "Category interrupted"
        ),
    }
}

/// Run the categories one after the other, stopping at the first halt
async fn run_sequential(
    engine: &Engine,
    registry: Vec<Registered>,
) -> anyhow::Result<Vec<(CategoryKind, RunResult)>> {
    let mut results = Vec::with_capacity(registry.len());

    for entry in registry {
        let result = engine
            .clone()
            .with_progress(entry.progress)
            .run(entry.category.as_ref(), &entry.run_config)
            .await
            .with_context(|| format!("Category {} failed", entry.kind))?;
        report(entry.kind, &result);

        let stop = matches!(result, RunResult::Halted { .. } | RunResult::Cancelled(_));
        results.push((entry.kind, result));
        if stop {
            break;
        }
    }

    Ok(results)
}

/// Run every enabled category on its own task
///
/// The first halt or failure cancels every other run through the engine's
/// cancellation token.
async fn run_parallel(
    engine: &Engine,
    registry: Vec<Registered>,
    cancellation: &CancellationToken,
) -> anyhow::Result<Vec<(CategoryKind, RunResult)>> {
    let mut tasks = JoinSet::new();
    for entry in registry {
        let Registered {
            kind,
            run_config,
            category,
            progress,
        } = entry;
        if !run_config.enable {
            continue;
        }

        let engine = engine.clone().with_progress(progress);
        let span = info_span!("cli.run.category", category = %kind);
        tasks.spawn(
            async move {
                let result = engine.run(category.as_ref(), &run_config).await;
                (kind, result)
            }
            .instrument(span),
        );
    }

    let mut results = Vec::new();
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        let (kind, result) = match joined {
            Ok(joined) => joined,
            Err(err) => {
                cancellation.cancel();
                failure.get_or_insert(anyhow::Error::new(err).context("A category task panicked"));
                continue;
            }
        };

        match result {
            Ok(result) => {
                report(kind, &result);
                if result.is_halted() {
                    info!(category = %kind, "Stopping the other categories");
                    cancellation.cancel();
                }
                results.push((kind, result));
            }
            Err(err) => {
                cancellation.cancel();
                failure.get_or_insert(
                    anyhow::Error::new(err).context(format!("Category {kind} failed")),
                );
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(results),
    }
}

/// Periodically log what each run is doing
async fn report_progress(trackers: Vec<Progress>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        for progress in &trackers {
            let stage = ProgressStage::clone(&progress.get_current_stage());
            if stage == ProgressStage::Idle {
                continue;
            }

            let counters = progress.counters();
            info!(
                %stage,
                deleted = counters.deleted(),
                failed = counters.failed(),
                skipped = counters.skipped(),
                "Progress"
            );
        }
    }
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let span = info_span!("cli.run");
        self.run_inner(figment).instrument(span).await
    }

    async fn run_inner(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let config = RootConfig::extract(figment)
            .map_err(anyhow::Error::from_boxed)
            .context("Failed to load the configuration")?;

        let categories = select_categories(&config.categories, &self.categories);
        let enabled: Vec<&str> = categories
            .iter()
            .filter(|(_, c)| c.enable)
            .map(|(name, _)| name)
            .collect();
        if enabled.is_empty() {
            warn!("No category is enabled, nothing to do");
            return Ok(ExitCode::SUCCESS);
        }

        let session = session_from_config(&config.session).await?;
        let connection = connection_from_config(&config.session, &session)?;
        connection
            .validate_session()
            .await
            .context("The session is not valid, please update the cookie file")?;
        info!(?enabled, dry_run = self.dry_run, "Session is valid, starting");

        let shutdown = ShutdownManager::new().context("Failed to install signal handlers")?;
        let interrupted = shutdown.stop_token();
        let aborted = shutdown.abort_token();
        let cancellation = interrupted.child_token();
        tokio::spawn(shutdown.run());

        let parallel = self.parallel || config.engine.parallel;
        let mut registry = registry(&connection, &categories, self.dry_run)?;
        let trackers = assign_progress(&mut registry, parallel);
        // Every run reports to the tracker of its category
        let engine = Engine::new(config.engine.delete_interval, Progress::default())
            .with_cancellation(cancellation.clone());

        let reporter = tokio::spawn(report_progress(
            trackers.clone(),
            config.engine.progress_interval,
        ));

        let dispatch = async {
            if parallel {
                run_parallel(&engine, registry, &cancellation).await
            } else {
                run_sequential(&engine, registry).await
            }
        };

        let results = tokio::select! {
            results = dispatch => results,
            () = aborted.cancelled() => {
                reporter.abort();
                warn!("Aborted");
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
        };
        reporter.abort();
        let results = results?;

        let (deleted, failed, skipped) = totals(&trackers);
        info!(deleted, failed, skipped, "Finished");

        if results.iter().any(|(_, result)| result.is_halted()) {
            return Ok(ExitCode::from(EXIT_HALTED));
        }

        if interrupted.is_cancelled() {
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }

        Ok(ExitCode::SUCCESS)
    }
}
