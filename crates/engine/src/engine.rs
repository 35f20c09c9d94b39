// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{num::NonZeroU32, time::Duration};

use opentelemetry::KeyValue;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    BoxError, Category, Cursor, DeletionOutcome, Entity, ErrorBudget, Fingerprint, Ledger,
    Progress, ProgressStage,
    budget::DEFAULT_MAX_ERROR_COUNT,
    telemetry::{DELETIONS, PAGES},
};

/// Default pause between two delete calls
pub const DEFAULT_DELETE_INTERVAL: Duration = Duration::from_secs(1);

/// Per-category knobs of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Disabled categories are not touched at all
    pub enable: bool,

    /// Page to start the listing from
    pub start_page: NonZeroU32,

    /// Number of consecutive failures after which the run halts
    pub max_error_count: NonZeroU32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enable: false,
            start_page: NonZeroU32::MIN,
            max_error_count: DEFAULT_MAX_ERROR_COUNT,
        }
    }
}

/// Counters of what happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of pages fetched, including stuck and empty ones
    pub pages_fetched: u32,
    /// Number of pages skipped because everything on them was already seen
    pub stuck_pages: u32,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Entities skipped because they were already seen on a previous page
    pub skipped: u64,
    /// Page the run ended on
    pub last_page: u32,
    /// Failures in a row at the end of the run
    pub consecutive_failures: u32,
    /// Distinct entities seen during the run
    pub seen: usize,
}

/// Why a run halted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The service signalled that nothing more can be done
    Requested { entity: Entity, body: String },

    /// Too many consecutive failures
    ErrorBudgetExhausted { consecutive_failures: u32 },
}

/// How a run ended
///
/// `Halted` means something is wrong beyond this category (quota, expired
/// session), and callers are expected to stop everything else too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    /// The category is not enabled, nothing was done
    Disabled,

    /// The listing is empty, everything there was to delete was attempted
    Exhausted(RunStats),

    Halted { reason: HaltReason, stats: RunStats },

    /// The run was cancelled from the outside
    Cancelled(RunStats),
}

impl RunResult {
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }

    #[must_use]
    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            Self::Disabled => None,
            Self::Exhausted(stats) | Self::Cancelled(stats) | Self::Halted { stats, .. } => {
                Some(stats)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to collect page {page} of category {category}")]
    Collect {
        category: String,
        page: u32,
        #[source]
        source: BoxError,
    },
}

/// Drives a [`Category`] through its listing until nothing is left, the
/// service asks to stop, or too many deletes fail in a row
///
/// A single engine can be reused for many runs, but runs are independent:
/// each one has its own page cursor, dedup ledger and error budget.
#[derive(Clone)]
pub struct Engine {
    delete_interval: Duration,
    progress: Progress,
    cancellation: CancellationToken,
}

impl Engine {
    #[must_use]
    pub fn new(delete_interval: Duration, progress: Progress) -> Self {
        Self {
            delete_interval,
            progress,
            cancellation: CancellationToken::new(),
        }
    }

    /// Make runs stop at the next entity once the token is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Report to another progress tracker, keeping everything else
    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Run the bulk deletion of one category
    ///
    /// # Errors
    ///
    /// Returns an error if a listing page could not be collected.
    #[tracing::instrument(
        name = "engine.run",
        skip_all,
        fields(category = category.name()),
    )]
    pub async fn run<C>(&self, category: &C, config: &RunConfig) -> Result<RunResult, RunError>
    where
        C: Category + ?Sized,
    {
        if !config.enable {
            return Ok(RunResult::Disabled);
        }

        let name = category.name().to_owned();
        let volatile_fields = category.volatile_fields();
        let attributes = [KeyValue::new("category", name.clone())];

        let mut cursor = Cursor::new(config.start_page);
        let mut ledger = Ledger::new();
        let mut budget = ErrorBudget::new(config.max_error_count);
        let mut stats = RunStats::default();

        info!("Starting run");

        loop {
            let page = cursor.current();
            stats.last_page = page;

            if self.cancellation.is_cancelled() {
                return Ok(self.cancelled(&name, stats));
            }

            self.progress.set_current_stage(ProgressStage::Fetching {
                category: name.clone(),
                page,
            });

            let entities = category
                .collect(page)
                .await
                .map_err(|source| RunError::Collect {
                    category: name.clone(),
                    page,
                    source,
                })?;
            stats.pages_fetched += 1;
            PAGES.add(1, &[attributes[0].clone(), KeyValue::new("kind", "fetched")]);

            if entities.is_empty() {
                info!(page, "No entity left, all done");
                self.progress
                    .set_current_stage(ProgressStage::Done { category: name });
                return Ok(RunResult::Exhausted(stats));
            }

            let fingerprints: Vec<Fingerprint> = entities
                .iter()
                .map(|entity| Fingerprint::of(entity, volatile_fields))
                .collect();

            if ledger.all_known(&fingerprints) {
                // The service sometimes keeps listing entities which are
                // already gone, move past them
                if !cursor.advance() {
                    warn!(page, "Stuck on the last possible page, giving up");
                    self.progress
                        .set_current_stage(ProgressStage::Done { category: name });
                    return Ok(RunResult::Exhausted(stats));
                }
                stats.stuck_pages += 1;
                PAGES.add(1, &[attributes[0].clone(), KeyValue::new("kind", "stuck")]);
                info!(
                    page,
                    next_page = cursor.current(),
                    "No new entity on this page, switching to the next one"
                );
                continue;
            }

            self.progress.set_current_stage(ProgressStage::Deleting {
                category: name.clone(),
                page,
            });

            for (entity, fingerprint) in entities.iter().zip(fingerprints) {
                if !ledger.add(fingerprint) {
                    stats.skipped += 1;
                    self.progress.counters().add_skipped();
                    continue;
                }
                stats.seen = ledger.len();

                if self.cancellation.is_cancelled() {
                    return Ok(self.cancelled(&name, stats));
                }

                info!(%entity, page, "Deleting");
                stats.attempted += 1;
                let response = category.delete(entity).await;
                let outcome = category.classify(&response);

                DELETIONS.add(
                    1,
                    &[
                        attributes[0].clone(),
                        KeyValue::new("outcome", outcome.label()),
                    ],
                );

                match outcome {
                    DeletionOutcome::Success => {
                        info!(%entity, "Deleted");
                        stats.succeeded += 1;
                        self.progress.counters().add_deleted();
                        budget.record_success();
                    }

                    DeletionOutcome::SoftFailure(reason) => {
                        stats.failed += 1;
                        self.progress.counters().add_failed();
                        budget.record_failure();
                        error!(
                            %entity,
                            %reason,
                            consecutive_failures = budget.consecutive_failures(),
                            "Failed to delete"
                        );
                    }

                    DeletionOutcome::HaltRequested { body } => {
                        stats.failed += 1;
                        self.progress.counters().add_failed();
                        error!(%entity, body = body.as_str(), "The service asked to stop, halting");
                        self.progress
                            .set_current_stage(ProgressStage::Done { category: name });
                        return Ok(RunResult::Halted {
                            reason: HaltReason::Requested {
                                entity: entity.clone(),
                                body,
                            },
                            stats,
                        });
                    }
                }

                stats.consecutive_failures = budget.consecutive_failures();
                if budget.exceeded() {
                    error!(
                        max_error_count = budget.ceiling().get(),
                        "Reached maximum error count, halting"
                    );
                    self.progress
                        .set_current_stage(ProgressStage::Done { category: name });
                    return Ok(RunResult::Halted {
                        reason: HaltReason::ErrorBudgetExhausted {
                            consecutive_failures: budget.consecutive_failures(),
                        },
                        stats,
                    });
                }

                if !self.delete_interval.is_zero() {
                    tokio::select! {
                        () = self.cancellation.cancelled() => {
                            return Ok(self.cancelled(&name, stats));
                        }
                        () = tokio::time::sleep(self.delete_interval) => {}
                    }
                }
            }

            // Stay on the same page: it should now list what is left
        }
    }

    fn cancelled(&self, category: &str, stats: RunStats) -> RunResult {
        info!("Run cancelled");
        self.progress.set_current_stage(ProgressStage::Done {
            category: category.to_owned(),
        });
        RunResult::Cancelled(stats)
    }
}
