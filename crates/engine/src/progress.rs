// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwap;

/// Tracker for the progress of a run
///
/// Cloning this struct gives a 'handle' to the same counters, so it can be
/// handed to the engine and read from another task.
#[derive(Clone)]
pub struct Progress {
    current_stage: Arc<ArcSwap<ProgressStage>>,
    counters: Arc<ProgressCounters>,
}

impl Progress {
    #[inline]
    pub fn set_current_stage(&self, stage: ProgressStage) {
        self.current_stage.store(Arc::new(stage));
    }

    #[inline]
    #[must_use]
    pub fn get_current_stage(&self) -> arc_swap::Guard<Arc<ProgressStage>> {
        self.current_stage.load()
    }

    #[must_use]
    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current_stage: Arc::new(ArcSwap::new(Arc::new(ProgressStage::Idle))),
            counters: Arc::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStage {
    Idle,
    Fetching { category: String, page: u32 },
    Deleting { category: String, page: u32 },
    Done { category: String },
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Fetching { category, page } => write!(f, "fetching {category} page {page}"),
            Self::Deleting { category, page } => write!(f, "deleting {category} page {page}"),
            Self::Done { category } => write!(f, "done with {category}"),
        }
    }
}

/// Running totals, updated once per delete attempt
#[derive(Debug, Default)]
pub struct ProgressCounters {
    deleted: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl ProgressCounters {
    pub(crate) fn add_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}
