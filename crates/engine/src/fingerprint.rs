// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::collections::BTreeMap;

use crate::Entity;

/// Canonical identity of an [`Entity`], with its volatile fields removed
///
/// Fields are kept in a sorted map, so two entities with the same
/// non-volatile content compare and hash equal whatever order their fields
/// were collected in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    fields: BTreeMap<String, String>,
}

impl Fingerprint {
    /// Compute the fingerprint of an entity
    ///
    /// Volatile fields which are not present on the entity are ignored.
    #[must_use]
    pub fn of(entity: &Entity, volatile_fields: &[&str]) -> Self {
        let fields = entity
            .iter()
            .filter(|(key, _)| !volatile_fields.contains(key))
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();

        Self { fields }
    }

    /// Get the value of a retained field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn volatile_fields_do_not_matter() {
        let a = Entity::new().with("id", "A").with("tbs", "x1");
        let b = Entity::new().with("id", "A").with("tbs", "x2");
        assert_eq!(Fingerprint::of(&a, &["tbs"]), Fingerprint::of(&b, &["tbs"]));
    }

    #[test]
    fn field_order_does_not_matter() {
        let a = Entity::new().with("tid", "1").with("pid", "2");
        let b = Entity::new().with("pid", "2").with("tid", "1");

        let mut set = HashSet::new();
        set.insert(Fingerprint::of(&a, &[]));
        assert!(set.contains(&Fingerprint::of(&b, &[])));
    }

    #[test]
    fn missing_volatile_field_is_fine() {
        let a = Entity::new().with("id", "A");
        let b = Entity::new().with("id", "A").with("tbs", "x1");
        assert_eq!(
            Fingerprint::of(&a, &["tbs", "other"]),
            Fingerprint::of(&b, &["tbs", "other"])
        );
    }

    #[test]
    fn non_volatile_fields_distinguish() {
        let a = Entity::new().with("id", "A").with("tbs", "x1");
        let b = Entity::new().with("id", "B").with("tbs", "x1");
        let fp = Fingerprint::of(&a, &["tbs"]);
        assert_ne!(fp, Fingerprint::of(&b, &["tbs"]));
        assert_eq!(fp.get("id"), Some("A"));
        assert_eq!(fp.get("tbs"), None);
    }
}
