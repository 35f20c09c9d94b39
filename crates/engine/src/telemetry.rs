// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::LazyLock;

use opentelemetry::{
    InstrumentationScope,
    metrics::{Counter, Meter},
};
use opentelemetry_semantic_conventions as semcov;

static SCOPE: LazyLock<InstrumentationScope> = LazyLock::new(|| {
    InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semcov::SCHEMA_URL)
        .build()
});

pub static METER: LazyLock<Meter> =
    LazyLock::new(|| opentelemetry::global::meter_with_scope(SCOPE.clone()));

pub(crate) static DELETIONS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("sweep.engine.deletions")
        .with_unit("{entity}")
        .with_description("Number of delete attempts, by outcome")
        .build()
});

pub(crate) static PAGES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("sweep.engine.pages")
        .with_unit("{page}")
        .with_description("Number of listing pages fetched, and of those skipped as stuck")
        .build()
});
