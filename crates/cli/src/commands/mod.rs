// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};

mod config;
mod doctor;
mod run;

/// Prefix of the environment variables overriding the configuration
const ENV_PREFIX: &str = "TIEBA_SWEEP_";

#[derive(Parser, Debug)]
enum Subcommand {
    /// Delete everything enabled in the configuration
    Run(self::run::Options),

    /// Configuration-related commands
    Config(self::config::Options),

    /// Run diagnostics on the configuration and the session
    Doctor(self::doctor::Options),
}

#[derive(Parser, Debug)]
#[command(version = crate::VERSION)]
pub struct Options {
    /// Path to the configuration file, YAML or TOML depending on its
    /// extension. Can be repeated, later files override earlier ones.
    #[arg(short, long, global = true, action = clap::ArgAction::Append)]
    config: Vec<Utf8PathBuf>,

    #[command(subcommand)]
    subcommand: Option<Subcommand>,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as S;
        match self.subcommand {
            Some(S::Run(c)) => c.run(figment).await,
            Some(S::Config(c)) => c.run(figment).await,
            Some(S::Doctor(c)) => c.run(figment).await,
            None => self::run::Options::default().run(figment).await,
        }
    }

    /// Get a [`Figment`] instance with the configuration loaded
    pub fn figment(&self) -> Figment {
        let configs = if self.config.is_empty() {
            // Read the TIEBA_SWEEP_CONFIG environment variable
            std::env::var(format!("{ENV_PREFIX}CONFIG"))
                // Split the file list on `:`
                .map(|config| config.split(':').map(Utf8PathBuf::from).collect())
                // Default to the config.yaml file
                .unwrap_or_else(|_| vec!["config.yaml".into()])
        } else {
            self.config.clone()
        };

        let figment = configs
            .iter()
            .fold(Figment::new(), |figment, path| match path.extension() {
                Some("toml") => figment.admerge(Toml::file(path)),
                _ => figment.admerge(Yaml::file(path)),
            });

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
