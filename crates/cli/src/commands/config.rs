// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use figment::Figment;
use sweep_config::{ConfigurationSection, RootConfig};
use tokio::io::AsyncWriteExt;
use tracing::{info, info_span, warn};

#[derive(Parser, Debug)]
pub(super) struct Options {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Parser, Debug)]
enum Subcommand {
    /// Print the resolved configuration, files and environment merged
    Dump {
        /// Write to this file instead of the standard output
        #[clap(short, long)]
        output: Option<Utf8PathBuf>,
    },

    /// Load and validate the configuration
    Check,

    /// Write a starter configuration with every category enabled
    Generate {
        /// Write to this file instead of the standard output
        #[clap(short, long)]
        output: Option<Utf8PathBuf>,
    },
}

/// Render the configuration as YAML, prefixed with the given header comment
fn render(config: &RootConfig, header: &str) -> anyhow::Result<String> {
    let body = serde_yaml::to_string(config).context("Failed to serialize the configuration")?;
    let header: String = header.lines().map(|line| format!("# {line}\n")).collect();
    Ok(format!("{header}{body}"))
}

async fn write_out(contents: &str, output: Option<&Utf8PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            info!(%path, "Writing configuration");
            tokio::fs::write(path, contents)
                .await
                .with_context(|| format!("Failed to write {path}"))?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(contents.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as SC;
        match self.subcommand {
            SC::Dump { output } => {
                let _span = info_span!("cli.config.dump").entered();

                let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;
                let contents = render(&config, "Resolved tieba-sweep configuration")?;
                write_out(&contents, output.as_ref()).await?;
            }

            SC::Check => {
                let _span = info_span!("cli.config.check").entered();

                let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;
                let enabled: Vec<&str> = config
                    .categories
                    .iter()
                    .filter(|(_, c)| c.enable)
                    .map(|(name, _)| name)
                    .collect();

                if !config.session.cookie_file.is_file() {
                    warn!(
                        path = %config.session.cookie_file,
                        "The cookie file doesn't exist yet"
                    );
                }

                info!(?enabled, "Configuration file looks good");
            }

            SC::Generate { output } => {
                let _span = info_span!("cli.config.generate").entered();

                let contents = render(
                    &RootConfig::generate(),
                    "tieba-sweep configuration\n\
                     Turn off the categories you want to keep, then put the cookies of a\n\
                     logged-in browser session in the cookie file.",
                )?;
                write_out(&contents, output.as_ref()).await?;
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Jail,
        providers::{Format, Yaml},
    };

    use super::*;

    #[test]
    fn generated_configuration_loads_back() {
        let contents = render(&RootConfig::generate(), "first\nsecond").unwrap();
        assert!(contents.starts_with("# first\n# second\n"));

        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", &contents)?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = RootConfig::extract(&figment).unwrap();
            assert!(config.categories.iter().all(|(_, c)| c.enable));

            Ok(())
        });
    }
}
