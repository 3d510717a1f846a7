// MIT License
//
// Copyright (c) 2024 Songlin Yang
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! The identity registry: the pipeline's central, append-only mapping from
//! `(object, source id)` to the newly created target id.
//!
//! Source ids are globally unique across object types (they carry a
//! 3-character key prefix identifying their object), so a lookup by source id
//! alone — without knowing which object it belongs to — is well defined. This
//! is what makes polymorphic reference remap (`WhatId`/`WhoId`, and
//! `DataDependency`/`InScopeReference` lookups on non-root tiers) possible
//! without a second schema round-trip.

use std::collections::HashMap;

use crate::errors::{SeedError, SeedResult};

#[derive(Debug, Default)]
pub struct IdentityRegistry {
    by_object: HashMap<String, HashMap<String, String>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source_id -> target_id` under `object`. Errors if an entry
    /// already exists for this `(object, source_id)` pair — the registry is
    /// append-only for the run's lifetime.
    pub fn insert(
        &mut self,
        object: &str,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> SeedResult<()> {
        let source_id = source_id.into();
        let map = self.by_object.entry(object.to_string()).or_default();
        if map.contains_key(&source_id) {
            return Err(SeedError::DuplicateRegistryEntry {
                object: object.to_string(),
                source_id,
            });
        }
        map.insert(source_id, target_id.into());
        Ok(())
    }

    /// Looks up a target id for `source_id` within a specific object's map.
    pub fn lookup_in(&self, object: &str, source_id: &str) -> Option<&str> {
        self.by_object
            .get(object)
            .and_then(|m| m.get(source_id))
            .map(String::as_str)
    }

    /// Looks up a target id for `source_id` across every object's map,
    /// relying on the platform invariant that source ids are globally
    /// unique. Returns the first match found; callers that care about the
    /// uniqueness invariant should assert it holds in tests rather than at
    /// runtime (scanning every object on every lookup is already O(objects)).
    pub fn lookup_any(&self, source_id: &str) -> Option<&str> {
        self.by_object
            .values()
            .find_map(|m| m.get(source_id))
            .map(String::as_str)
    }

    pub fn has_entries_for(&self, object: &str) -> bool {
        self.by_object
            .get(object)
            .map(|m| !m.is_empty())
            .unwrap_or(false)
    }

    /// All `(object, source_id, target_id)` triples known to the registry.
    /// Used by the activity and file stages, which may attach to any prior
    /// tier.
    pub fn all_entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.by_object.iter().flat_map(|(object, m)| {
            m.iter()
                .map(move |(src, tgt)| (object.as_str(), src.as_str(), tgt.as_str()))
        })
    }

    pub fn all_source_ids(&self) -> impl Iterator<Item = &str> {
        self.by_object.values().flat_map(|m| m.keys()).map(String::as_str)
    }

    pub fn object_map(&self, object: &str) -> Option<&HashMap<String, String>> {
        self.by_object.get(object)
    }

    pub fn len_for(&self, object: &str) -> usize {
        self.by_object.get(object).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup() {
        let mut reg = IdentityRegistry::new();
        reg.insert("Account", "001A", "001X").unwrap();
        assert_eq!(reg.lookup_in("Account", "001A"), Some("001X"));
        assert_eq!(reg.lookup_any("001A"), Some("001X"));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut reg = IdentityRegistry::new();
        reg.insert("Account", "001A", "001X").unwrap();
        let err = reg.insert("Account", "001A", "001Z").unwrap_err();
        assert!(matches!(err, SeedError::DuplicateRegistryEntry { .. }));
        // the original mapping is unchanged
        assert_eq!(reg.lookup_in("Account", "001A"), Some("001X"));
    }

    #[test]
    fn lookup_any_is_unique_across_objects() {
        let mut reg = IdentityRegistry::new();
        reg.insert("Account", "001A", "001X").unwrap();
        reg.insert("Contact", "003A", "003X").unwrap();
        assert_eq!(reg.lookup_any("001A"), Some("001X"));
        assert_eq!(reg.lookup_any("003A"), Some("003X"));
        assert_eq!(reg.lookup_any("999Z"), None);
    }
}
