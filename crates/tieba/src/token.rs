// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

/// Retry policy when fetching the anti-forgery token
///
/// The delay starts at `initial_backoff` and doubles after each failed
/// attempt, up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRetry {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for TokenRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl TokenRetry {
    /// Delay to wait after the given failed attempt, counted from 1
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let retry = TokenRetry::default();

        assert_eq!(retry.backoff(1), Duration::from_millis(500));
        assert_eq!(retry.backoff(2), Duration::from_secs(1));
        assert_eq!(retry.backoff(3), Duration::from_secs(2));
        assert_eq!(retry.backoff(5), Duration::from_secs(8));
        assert_eq!(retry.backoff(6), Duration::from_secs(8));
        assert_eq!(retry.backoff(u32::MAX), Duration::from_secs(8));
    }
}
