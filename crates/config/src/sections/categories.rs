// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_at},
};

const fn default_start_page() -> u32 {
    1
}

const fn default_max_error_count() -> u32 {
    3
}

/// Settings of a single deletion category
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Whether this category should be processed at all
    #[serde(default)]
    pub enable: bool,

    /// Listing page to start from. Defaults to 1.
    #[serde(default = "default_start_page")]
    #[schemars(range(min = 1))]
    pub start_page: u32,

    /// Number of consecutive failed deletions after which the category is
    /// abandoned. Defaults to 3.
    #[serde(default = "default_max_error_count")]
    #[schemars(range(min = 1))]
    pub max_error_count: u32,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            enable: false,
            start_page: default_start_page(),
            max_error_count: default_max_error_count(),
        }
    }
}

impl CategoryConfig {
    fn is_default(&self) -> bool {
        self == &Self::default()
    }

    fn validate_at(&self, figment: &figment::Figment, name: &str) -> Result<(), BoxError> {
        if self.start_page == 0 {
            return Err(invalid_at(
                figment,
                &format!("categories.{name}.start_page"),
                "Pages are numbered from 1",
            ));
        }

        if self.max_error_count == 0 {
            return Err(invalid_at(
                figment,
                &format!("categories.{name}.max_error_count"),
                "The error count ceiling must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Per-category settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CategoriesConfig {
    /// Threads started by the user
    #[serde(default, skip_serializing_if = "CategoryConfig::is_default")]
    pub thread: CategoryConfig,

    /// Replies posted by the user
    #[serde(default, skip_serializing_if = "CategoryConfig::is_default")]
    pub reply: CategoryConfig,

    /// Forums the user follows
    #[serde(default, skip_serializing_if = "CategoryConfig::is_default")]
    pub followed_ba: CategoryConfig,

    /// Users the user follows
    #[serde(default, skip_serializing_if = "CategoryConfig::is_default")]
    pub concern: CategoryConfig,

    /// Users following the user
    #[serde(default, skip_serializing_if = "CategoryConfig::is_default")]
    pub fan: CategoryConfig,
}

impl CategoriesConfig {
    /// Iterate over the categories, in their processing order, with their
    /// names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CategoryConfig)> {
        [
            ("thread", &self.thread),
            ("reply", &self.reply),
            ("followed_ba", &self.followed_ba),
            ("concern", &self.concern),
            ("fan", &self.fan),
        ]
        .into_iter()
    }

    /// Look up the settings of a category by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CategoryConfig> {
        self.iter()
            .find_map(|(candidate, config)| (candidate == name).then_some(config))
    }

    /// Mutably look up the settings of a category by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CategoryConfig> {
        match name {
            "thread" => Some(&mut self.thread),
            "reply" => Some(&mut self.reply),
            "followed_ba" => Some(&mut self.followed_ba),
            "concern" => Some(&mut self.concern),
            "fan" => Some(&mut self.fan),
            _ => None,
        }
    }

    pub(crate) fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

impl ConfigurationSection for CategoriesConfig {
    const PATH: Option<&'static str> = Some("categories");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        for (name, config) in self.iter() {
            config.validate_at(figment, name)?;
        }

        Ok(())
    }
}
