// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use crate::{DeletionOutcome, Entity, RawResponse};

/// Type-erased error returned by collectors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A kind of remote content which can be listed page by page and deleted one
/// entity at a time
///
/// The [`Engine`](crate::Engine) is written against this trait only, and
/// doesn't know which service or which kind of content it is driving.
#[async_trait::async_trait]
pub trait Category: Send + Sync {
    /// The name of the category, used in logs and metrics
    fn name(&self) -> &str;

    /// Fields which change on every fetch and must not be used to identify
    /// an entity
    fn volatile_fields(&self) -> &[&'static str];

    /// Fetch one page of the listing
    ///
    /// Calling this again with the same page after some deletions should
    /// reflect the current state of the service. An empty page means there
    /// is nothing left to delete.
    ///
    /// # Parameters
    ///
    /// * `page` - The page number, starting at 1
    ///
    /// # Errors
    ///
    /// Returns an error if the page could not be fetched or parsed.
    async fn collect(&self, page: u32) -> Result<Vec<Entity>, BoxError>;

    /// Issue the delete call for one entity
    ///
    /// This never fails: a call which could not be made is reported as
    /// [`RawResponse::NoResponse`].
    async fn delete(&self, entity: &Entity) -> RawResponse;

    /// Interpret the response of a delete call
    fn classify(&self, response: &RawResponse) -> DeletionOutcome;
}

#[async_trait::async_trait]
impl<T: Category + ?Sized> Category for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn volatile_fields(&self) -> &[&'static str] {
        (**self).volatile_fields()
    }

    async fn collect(&self, page: u32) -> Result<Vec<Entity>, BoxError> {
        (**self).collect(page).await
    }

    async fn delete(&self, entity: &Entity) -> RawResponse {
        (**self).delete(entity).await
    }

    fn classify(&self, response: &RawResponse) -> DeletionOutcome {
        (**self).classify(response)
    }
}
