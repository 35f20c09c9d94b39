// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::num::NonZeroU32;

use anyhow::Context;
use sweep_config::{CategoryConfig, SessionConfig};
use sweep_engine::RunConfig;
use sweep_tieba::{Session, TiebaConnection, TokenRetry};

/// Read and parse the cookie file pointed to by the configuration
pub async fn session_from_config(config: &SessionConfig) -> anyhow::Result<Session> {
    let raw = tokio::fs::read_to_string(&config.cookie_file)
        .await
        .with_context(|| format!("Failed to read the cookie file {:?}", config.cookie_file))?;

    Session::from_raw_cookie(&raw)
        .with_context(|| format!("Failed to parse the cookie file {:?}", config.cookie_file))
}

pub fn connection_from_config(
    config: &SessionConfig,
    session: &Session,
) -> anyhow::Result<TiebaConnection> {
    let token_retry = TokenRetry {
        max_attempts: config.token_retry.max_attempts,
        initial_backoff: config.token_retry.initial_backoff,
        max_backoff: config.token_retry.max_backoff,
    };

    let connection = TiebaConnection::new(
        config.base_url.clone(),
        session,
        sweep_http::reqwest_client(),
    )
    .context("Invalid cookie")?
    .with_token_retry(token_retry);

    let connection = match &config.user_agent {
        Some(user_agent) => connection
            .with_user_agent(user_agent)
            .context("Invalid user agent in the configuration")?,
        None => connection,
    };

    Ok(connection)
}

pub fn run_config_from_config(config: &CategoryConfig) -> anyhow::Result<RunConfig> {
    Ok(RunConfig {
        enable: config.enable,
        start_page: NonZeroU32::new(config.start_page).context("start_page can't be 0")?,
        max_error_count: NonZeroU32::new(config.max_error_count)
            .context("max_error_count can't be 0")?,
    })
}
