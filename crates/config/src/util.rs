// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use figment::Figment;
use serde::de::{DeserializeOwned, Error as _};

/// Error returned when loading or validating a configuration section
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build a validation error pointing at the given dotted configuration key
pub(crate) fn invalid_at(figment: &Figment, path: &str, message: &str) -> BoxError {
    let mut error = figment::error::Error::custom(message).with_path(path);
    error.metadata = figment.find_metadata(path).cloned();
    error.into()
}

/// A section of the configuration, living under [`Self::PATH`] in the root
/// document.
pub trait ConfigurationSection: Sized + DeserializeOwned {
    /// Where this section lives relative to the root, `None` for the root
    /// itself.
    const PATH: Option<&'static str> = None;

    /// Check the values once deserialized
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    fn validate(&self, _figment: &Figment) -> Result<(), BoxError> {
        Ok(())
    }

    /// Deserialize and validate this section
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing, can't be deserialized or
    /// is invalid
    fn extract(figment: &Figment) -> Result<Self, BoxError> {
        let this: Self = match Self::PATH {
            Some(path) => figment.extract_inner(path)?,
            None => figment.extract()?,
        };

        this.validate(figment)?;
        Ok(this)
    }
}

/// Extension of [`ConfigurationSection`] for sections which can be left out
/// of the configuration entirely.
pub trait ConfigurationSectionExt: ConfigurationSection + Default {
    /// Like [`ConfigurationSection::extract`], but fall back to the default
    /// value when the section is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is present but invalid
    fn extract_or_default(figment: &Figment) -> Result<Self, BoxError> {
        if let Some(path) = Self::PATH
            && !figment.contains(path)
        {
            return Ok(Self::default());
        }

        Self::extract(figment)
    }
}

impl<T: ConfigurationSection + Default> ConfigurationSectionExt for T {}
