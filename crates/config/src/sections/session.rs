// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use camino::Utf8PathBuf;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use url::Url;

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_at},
};

fn default_cookie_file() -> Utf8PathBuf {
    "./cookie.txt".into()
}

fn default_base_url() -> Url {
    Url::parse("https://tieba.baidu.com/").unwrap()
}

fn user_agent_example() -> &'static str {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(8)
}

/// How hard to try when fetching the anti-forgery token
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TokenRetryConfig {
    /// Number of attempts before giving up on a delete. Defaults to 5.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds. It doubles after
    /// every failed attempt. Defaults to 500.
    #[schemars(with = "u64")]
    #[serde(default = "default_initial_backoff")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub initial_backoff: Duration,

    /// Upper bound of the delay between two attempts, in milliseconds.
    /// Defaults to 8000.
    #[schemars(with = "u64")]
    #[serde(default = "default_max_backoff")]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub max_backoff: Duration,
}

impl Default for TokenRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

/// Configuration of the authenticated session with the service
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SessionConfig {
    /// Path to the file holding the raw `Cookie` header of a logged-in
    /// browser session
    #[serde(default = "default_cookie_file")]
    #[schemars(with = "String")]
    pub cookie_file: Utf8PathBuf,

    /// User agent to send instead of the default one. Using the same one as
    /// the browser the cookie comes from is recommended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(example = "user_agent_example")]
    pub user_agent: Option<String>,

    /// Base URL of the service
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Retry policy for the anti-forgery token
    #[serde(default)]
    pub token_retry: TokenRetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_file: default_cookie_file(),
            user_agent: None,
            base_url: default_base_url(),
            token_retry: TokenRetryConfig::default(),
        }
    }
}

impl ConfigurationSection for SessionConfig {
    const PATH: Option<&'static str> = Some("session");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        if self.token_retry.max_attempts == 0 {
            return Err(invalid_at(
                figment,
                "session.token_retry.max_attempts",
                "At least one attempt is needed",
            ));
        }

        if self.base_url.cannot_be_a_base() {
            return Err(invalid_at(figment, "session.base_url", "Not a valid base URL"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Yaml},
    };

    use super::*;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    session:
                      cookie_file: /tmp/cookie
                      user_agent: Firefox
                      token_retry:
                        max_attempts: 2
                        initial_backoff: 100
                ",
            )?;

            let config = Figment::new()
                .merge(Yaml::file("config.yaml"))
                .extract_inner::<SessionConfig>("session")?;

            assert_eq!(config.cookie_file, "/tmp/cookie");
            assert_eq!(config.user_agent.as_deref(), Some("Firefox"));
            assert_eq!(config.base_url, default_base_url());
            assert_eq!(config.token_retry.max_attempts, 2);
            assert_eq!(config.token_retry.initial_backoff, Duration::from_millis(100));
            assert_eq!(config.token_retry.max_backoff, default_max_backoff());

            Ok(())
        });
    }

    #[test]
    fn reject_zero_attempts() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    session:
                      token_retry:
                        max_attempts: 0
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            assert!(SessionConfig::extract(&figment).is_err());

            Ok(())
        });
    }
}
