// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::num::NonZeroU32;

/// Default number of consecutive failures after which a run is stopped
pub const DEFAULT_MAX_ERROR_COUNT: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Counter of consecutive delete failures
///
/// Failures are not told apart by kind, only by how often they happen in a
/// row: a success resets the counter, and reaching the ceiling means
/// something is wrong with the whole process.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    consecutive: u32,
    ceiling: NonZeroU32,
}

impl ErrorBudget {
    #[must_use]
    pub fn new(ceiling: NonZeroU32) -> Self {
        Self {
            consecutive: 0,
            ceiling,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive = self.consecutive.saturating_add(1);
    }

    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.consecutive >= self.ceiling.get()
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    #[must_use]
    pub fn ceiling(&self) -> NonZeroU32 {
        self.ceiling
    }
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERROR_COUNT)
    }
}
