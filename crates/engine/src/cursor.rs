// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::num::NonZeroU32;

/// The page of the listing currently being worked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    page: NonZeroU32,
}

impl Cursor {
    #[must_use]
    pub fn new(start_page: NonZeroU32) -> Self {
        Self { page: start_page }
    }

    #[must_use]
    pub fn current(&self) -> u32 {
        self.page.get()
    }

    /// Move to the next page
    ///
    /// Returns `false`, leaving the cursor where it is, if there is no next
    /// page.
    #[must_use]
    pub fn advance(&mut self) -> bool {
        match self.page.checked_add(1) {
            Some(next) => {
                self.page = next;
                true
            }
            None => false,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new(NonZeroU32::MIN)
    }
}
