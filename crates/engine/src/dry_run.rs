// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use tracing::info;

use crate::{BoxError, Category, DeletionOutcome, Entity, RawResponse};

/// A wrapper around a [`Category`] that lists entities but never deletes them
///
/// Every delete is reported as a success, so a run walks through the listing
/// exactly as it would for real, minus the side effects.
pub struct DryRun<C> {
    inner: C,
}

impl<C> DryRun<C> {
    pub fn new(inner: C) -> Self
    where
        C: Category,
    {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl<C: Category> Category for DryRun<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn volatile_fields(&self) -> &[&'static str] {
        self.inner.volatile_fields()
    }

    async fn collect(&self, page: u32) -> Result<Vec<Entity>, BoxError> {
        self.inner.collect(page).await
    }

    async fn delete(&self, entity: &Entity) -> RawResponse {
        info!(%entity, "Dry run, not deleting");
        RawResponse::received(200, "dry-run")
    }

    fn classify(&self, _response: &RawResponse) -> DeletionOutcome {
        DeletionOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::{Engine, Progress, RunConfig, RunResult};

    struct OnePage;

    #[async_trait::async_trait]
    impl Category for OnePage {
        fn name(&self) -> &str {
            "one-page"
        }

        fn volatile_fields(&self) -> &[&'static str] {
            &[]
        }

        async fn collect(&self, page: u32) -> Result<Vec<Entity>, BoxError> {
            if page == 1 {
                Ok(vec![Entity::new().with("id", "A")])
            } else {
                Ok(Vec::new())
            }
        }

        async fn delete(&self, _entity: &Entity) -> RawResponse {
            panic!("dry runs must not delete");
        }

        fn classify(&self, _response: &RawResponse) -> DeletionOutcome {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn dry_run_walks_the_listing_without_deleting() {
        let config = RunConfig {
            enable: true,
            ..RunConfig::default()
        };

        let result = Engine::new(Duration::ZERO, Progress::default())
            .run(&DryRun::new(OnePage), &config)
            .await
            .unwrap();

        // The listing keeps returning A on page 1, so it ends up stuck and
        // the run moves on to the empty page 2
        let stats = assert_matches!(result, RunResult::Exhausted(stats) => stats);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.stuck_pages, 1);
    }
}
