// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_at},
};

fn default_delete_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(30)
}

/// Configuration of the deletion engine
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between two delete calls, in milliseconds. The service rate
    /// limits aggressively, lowering this is not recommended. Defaults to
    /// 1000.
    #[schemars(with = "u64")]
    #[serde(default = "default_delete_interval")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub delete_interval: Duration,

    /// Run the enabled categories concurrently instead of one after the
    /// other
    #[serde(default)]
    pub parallel: bool,

    /// How often to log a progress summary, in seconds. Defaults to 30.
    #[schemars(with = "u64")]
    #[serde(default = "default_progress_interval")]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub progress_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delete_interval: default_delete_interval(),
            parallel: false,
            progress_interval: default_progress_interval(),
        }
    }
}

impl ConfigurationSection for EngineConfig {
    const PATH: Option<&'static str> = Some("engine");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        if self.progress_interval.is_zero() {
            return Err(invalid_at(
                figment,
                "engine.progress_interval",
                "The progress interval can't be zero",
            ));
        }

        Ok(())
    }
}
