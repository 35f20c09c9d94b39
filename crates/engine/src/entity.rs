// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One remote resource targeted for deletion
///
/// This is a flat mapping of attribute names to values, as scraped from a
/// listing page. Insertion order is preserved so that the entity serializes
/// into a form body the same way it was collected, but it plays no role in
/// identity, see [`Fingerprint`](crate::Fingerprint).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    fields: IndexMap<String, String>,
}

impl Entity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Entity
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value:?}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_insertion_order() {
        let entity = Entity::new().with("tid", "1").with("pid", "2");
        assert_eq!(entity.to_string(), r#"{tid: "1", pid: "2"}"#);
    }

    #[test]
    fn serializes_as_flat_map() {
        let entity = Entity::new().with("cmd", "unfollow").with("id", "abc");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json, serde_json::json!({"cmd": "unfollow", "id": "abc"}));
    }

    #[test]
    fn insert_replaces() {
        let mut entity = Entity::new().with("tbs", "x1");
        entity.insert("tbs", "x2");
        assert_eq!(entity.get("tbs"), Some("x2"));
        assert_eq!(entity.len(), 1);
    }
}
