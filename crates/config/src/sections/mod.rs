// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod categories;
mod engine;
mod session;
mod telemetry;

pub use self::{
    categories::{CategoriesConfig, CategoryConfig},
    engine::EngineConfig,
    session::{SessionConfig, TokenRetryConfig},
    telemetry::{ExportConfig, ExporterKind, TelemetryConfig, TracingConfig},
};
use crate::util::{BoxError, ConfigurationSection};

/// Application configuration root
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// Configuration of the authenticated session
    #[serde(default)]
    pub session: SessionConfig,

    /// Configuration of the deletion engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Which categories to clean up, and how
    #[serde(default, skip_serializing_if = "CategoriesConfig::is_default")]
    pub categories: CategoriesConfig,

    /// Configuration related to sending monitoring data
    #[serde(default, skip_serializing_if = "TelemetryConfig::is_default")]
    pub telemetry: TelemetryConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        self.session.validate(figment)?;
        self.engine.validate(figment)?;
        self.categories.validate(figment)?;
        self.telemetry.validate(figment)?;

        Ok(())
    }
}

impl RootConfig {
    /// Generate a starter configuration
    ///
    /// Every category is enabled, so that the generated file shows all of
    /// them and the user only has to turn off what they want to keep.
    #[must_use]
    pub fn generate() -> Self {
        let enabled = CategoryConfig {
            enable: true,
            ..CategoryConfig::default()
        };

        Self {
            categories: CategoriesConfig {
                thread: enabled.clone(),
                reply: enabled.clone(),
                followed_ba: enabled.clone(),
                concern: enabled.clone(),
                fan: enabled,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Env, Format, Toml, Yaml},
    };

    use super::*;

    #[test]
    fn empty_config_is_valid() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "{}")?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = RootConfig::extract(&figment).unwrap();

            assert_eq!(config.session, SessionConfig::default());
            assert_eq!(config.engine, EngineConfig::default());
            assert!(config.categories.iter().all(|(_, c)| !c.enable));

            Ok(())
        });
    }

    #[test]
    fn toml_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    [session]
                    cookie_file = "/etc/cookie"

                    [categories.reply]
                    enable = true
                "#,
            )?;
            jail.set_env("TIEBA_SWEEP_CATEGORIES__REPLY__START_PAGE", "7");
            jail.set_env("TIEBA_SWEEP_ENGINE__PARALLEL", "true");

            let figment = Figment::new()
                .merge(Toml::file("config.toml"))
                .merge(Env::prefixed("TIEBA_SWEEP_").split("__"));
            let config = RootConfig::extract(&figment).unwrap();

            assert_eq!(config.session.cookie_file, "/etc/cookie");
            assert!(config.categories.reply.enable);
            assert_eq!(config.categories.reply.start_page, 7);
            assert!(config.engine.parallel);

            Ok(())
        });
    }

    #[test]
    fn generated_config_round_trips() {
        let generated = RootConfig::generate();
        let yaml = serde_yaml::to_string(&generated).unwrap();

        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", &yaml)?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = RootConfig::extract(&figment).unwrap();
            assert!(config.categories.iter().all(|(_, c)| c.enable));

            Ok(())
        });
    }
}
