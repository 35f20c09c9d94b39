// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::fmt;

use indexmap::IndexMap;
use reqwest::header::HeaderValue;

use crate::SessionError;

/// The cookies of a logged-in browser session
///
/// Values are never printed, only cookie names show up in [`fmt::Debug`].
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    cookies: IndexMap<String, String>,
}

impl Session {
    /// Parse the raw value of a `Cookie` header, as copied from a browser
    ///
    /// Pairs are separated by `;`, and split on their first `=`. Fragments
    /// without a `=` are ignored. A name appearing twice keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Empty`] if there is no pair at all
    pub fn from_raw_cookie(raw: &str) -> Result<Self, SessionError> {
        let cookies: IndexMap<String, String> = raw
            .split(';')
            .map(str::trim)
            .filter_map(|fragment| fragment.split_once('='))
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect();

        if cookies.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self { cookies })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Render the session back into a single `Cookie` header value
    ///
    /// # Errors
    ///
    /// Returns an error if a cookie contains characters not allowed in a
    /// header
    pub fn header_value(&self) -> Result<HeaderValue, SessionError> {
        let raw = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        let mut value = HeaderValue::from_str(&raw)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_browser_cookie() {
        let session =
            Session::from_raw_cookie("BDUSS=abc=def; STOKEN=xyz;  garbage ;\n PSTM=1\n").unwrap();

        assert_eq!(session.len(), 3);
        assert_eq!(session.get("BDUSS"), Some("abc=def"));
        assert_eq!(session.get("STOKEN"), Some("xyz"));
        assert_eq!(session.get("PSTM"), Some("1"));
        assert_eq!(session.get("garbage"), None);
    }

    #[test]
    fn later_values_win() {
        let session = Session::from_raw_cookie("a=1; b=2; a=3").unwrap();
        assert_eq!(session.get("a"), Some("3"));
        assert_eq!(session.header_value().unwrap(), "a=3; b=2");
    }

    #[test]
    fn rejects_cookie_without_pairs() {
        assert_matches!(Session::from_raw_cookie(""), Err(SessionError::Empty));
        assert_matches!(
            Session::from_raw_cookie("no pairs ; here"),
            Err(SessionError::Empty)
        );
    }

    #[test]
    fn header_value_is_sensitive() {
        let session = Session::from_raw_cookie("BDUSS=secret").unwrap();
        let value = session.header_value().unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value, "BDUSS=secret");
    }

    #[test]
    fn debug_hides_values() {
        let session = Session::from_raw_cookie("BDUSS=secret").unwrap();
        let debug = format!("{session:?}");
        assert!(debug.contains("BDUSS"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn rejects_unsendable_cookie() {
        let session = Session::from_raw_cookie("a=line\u{7f}break").unwrap();
        assert_matches!(session.header_value(), Err(SessionError::InvalidHeader(_)));
    }
}
