// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::collections::HashSet;

use crate::Fingerprint;

/// The set of fingerprints already attempted during a run
///
/// It only ever grows, and is dropped with the run that owns it.
#[derive(Debug, Default)]
pub struct Ledger {
    seen: HashSet<Fingerprint>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Record a fingerprint
    ///
    /// Returns `true` if it was not known yet.
    pub fn add(&mut self, fingerprint: Fingerprint) -> bool {
        self.seen.insert(fingerprint)
    }

    /// Whether every given fingerprint is already known
    ///
    /// This is used to detect pages which keep listing entities we already
    /// went through. An empty sequence is trivially known.
    pub fn all_known<'a>(&self, fingerprints: impl IntoIterator<Item = &'a Fingerprint>) -> bool {
        fingerprints.into_iter().all(|fp| self.contains(fp))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
