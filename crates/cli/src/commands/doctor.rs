// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Diagnostic utility to check that a run has a chance to succeed
//!
//! Every check logs its own outcome, and the command exits with a failure if
//! any of them failed.

use std::process::ExitCode;

use clap::Parser;
use figment::Figment;
use sweep_config::{ConfigurationSection, RootConfig};
use sweep_tieba::{Session, SessionError};
use tracing::{error, info, info_span, warn};

use crate::util::{connection_from_config, session_from_config};

#[derive(Parser, Debug)]
pub(super) struct Options {}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let _span = info_span!("cli.doctor").entered();
        info!("💡 Running diagnostics on the configuration and the session");

        let config = match RootConfig::extract(figment) {
            Ok(config) => {
                info!("✅ The configuration is valid");
                config
            }
            Err(e) => {
                error!("❌ The configuration is invalid: {e}");
                return Ok(ExitCode::FAILURE);
            }
        };

        let enabled: Vec<&str> = config
            .categories
            .iter()
            .filter(|(_, c)| c.enable)
            .map(|(name, _)| name)
            .collect();
        if enabled.is_empty() {
            warn!(
                "⚠️ No category is enabled in the configuration, `run` will do nothing unless given `--category`"
            );
        } else {
            info!("✅ Enabled categories: {}", enabled.join(", "));
        }

        let session: Session = match session_from_config(&config.session).await {
            Ok(session) => {
                info!(
                    r#"✅ The cookie file "{}" holds {} cookies"#,
                    config.session.cookie_file,
                    session.len()
                );
                session
            }
            Err(e) => {
                error!(
                    r#"❌ Can't use the cookie file "{}": {e:#}
Export the cookies of a logged-in browser session into this file."#,
                    config.session.cookie_file
                );
                return Ok(ExitCode::FAILURE);
            }
        };

        if session.get("BDUSS").is_none() {
            warn!("⚠️ The cookie file has no BDUSS cookie, the session is unlikely to be logged in");
        }

        let connection = match connection_from_config(&config.session, &session) {
            Ok(connection) => connection,
            Err(e) => {
                error!("❌ Can't build a connection from the session: {e:#}");
                return Ok(ExitCode::FAILURE);
            }
        };

        let mut failed = false;

        match connection.validate_session().await {
            Ok(()) => info!(r#"✅ The session is logged in on "{}""#, connection.base_url()),
            Err(SessionError::Expired) => {
                error!("❌ The session is expired, export fresh cookies from the browser");
                failed = true;
            }
            Err(e) => {
                error!(r#"❌ Can't reach "{}": {e}"#, connection.base_url());
                failed = true;
            }
        }

        match connection.fetch_token().await {
            Ok(_) => info!("✅ A form token could be obtained"),
            Err(e) => {
                error!("❌ Can't obtain a form token: {e}");
                failed = true;
            }
        }

        if failed {
            Ok(ExitCode::FAILURE)
        } else {
            info!("✅ Everything looks good");
            Ok(ExitCode::SUCCESS)
        }
    }
}
