// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use tokio::signal::unix::{Signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Turns SIGINT and SIGTERM into cancellation of the running deletions
///
/// The first signal cancels the [`stop`](Self::stop_token) token: the runs
/// finish the delete they are doing and end as cancelled. A second signal
/// cancels the [`abort`](Self::abort_token) token, on which the caller should
/// drop whatever is still in flight.
pub struct ShutdownManager {
    abort: CancellationToken,
    stop: CancellationToken,
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownManager {
    /// Install the signal handlers
    ///
    /// # Errors
    ///
    /// Returns an error if a signal handler could not be installed
    pub fn new() -> Result<Self, std::io::Error> {
        let abort = CancellationToken::new();
        // Aborting implies stopping
        let stop = abort.child_token();

        Ok(Self {
            abort,
            stop,
            sigterm: tokio::signal::unix::signal(SignalKind::terminate())?,
            sigint: tokio::signal::unix::signal(SignalKind::interrupt())?,
        })
    }

    /// Cancelled on the first signal
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Cancelled on the second signal
    #[must_use]
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    async fn next_signal(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }

    /// Wait for signals until an abort is requested
    pub async fn run(mut self) {
        let signal = self.next_signal().await;
        tracing::info!(signal, "Stopping after the current delete, signal again to abort");
        self.stop.cancel();

        let signal = self.next_signal().await;
        tracing::warn!(signal, "Aborting");
        self.abort.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn abort_implies_stop() {
        let manager = ShutdownManager::new().unwrap();
        let stop = manager.stop_token();
        let abort = manager.abort_token();

        assert!(!stop.is_cancelled());
        abort.cancel();
        assert!(stop.is_cancelled());
    }

    #[tokio::test]
    async fn stop_leaves_abort_alone() {
        let manager = ShutdownManager::new().unwrap();
        manager.stop_token().cancel();
        assert!(!manager.abort_token().is_cancelled());
    }
}
