// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Paginated bulk-deletion engine
//!
//! Walks the listing of a [`Category`] page by page and deletes every entity
//! on it, deduplicating entities across pages with [`Fingerprint`]s, skipping
//! pages which only list already-attempted entities, and halting on repeated
//! failures or when the service says so.

#![allow(clippy::module_name_repetitions)]

mod budget;
mod category;
mod cursor;
mod dry_run;
mod engine;
mod entity;
mod fingerprint;
mod ledger;
pub mod outcome;
mod progress;
mod telemetry;

pub use self::{
    budget::{DEFAULT_MAX_ERROR_COUNT, ErrorBudget},
    category::{BoxError, Category},
    cursor::Cursor,
    dry_run::DryRun,
    engine::{
        DEFAULT_DELETE_INTERVAL, Engine, HaltReason, RunConfig, RunError, RunResult, RunStats,
    },
    entity::Entity,
    fingerprint::Fingerprint,
    ledger::Ledger,
    outcome::{
        Classifier, DeletionOutcome, FailureReason, FieldMatch, JsonClassifier, RawResponse,
    },
    progress::{Progress, ProgressCounters, ProgressStage},
};
