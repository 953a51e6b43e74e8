//! Include-list resolution, inbound/outbound filtering and null-fill.
//!
//! Output maps are `serde_json::Map`, which is BTree-backed (the
//! `preserve_order` feature is off), so serialized objects always carry
//! lexicographically sorted keys. Deterministic, diff-friendly responses
//! fall out of that for free.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Resolved attribute visibility for one projection call.
#[derive(Debug, Clone)]
pub struct ProjectionFilter {
    include: Vec<String>,
    writable: BTreeSet<String>,
}

impl ProjectionFilter {
    /// Resolve the include-list: requested fields intersected with the
    /// readable set, defaulting to the full readable set when nothing was
    /// requested.
    #[must_use]
    pub fn new(
        requested: Option<&[String]>,
        readable: Vec<String>,
        writable: Vec<String>,
    ) -> Self {
        let include = requested.map_or_else(
            || readable.clone(),
            |requested| {
                readable
                    .iter()
                    .filter(|attr| requested.iter().any(|r| r == *attr))
                    .cloned()
                    .collect()
            },
        );

        Self {
            include,
            writable: writable.into_iter().collect(),
        }
    }

    /// The resolved include-list.
    #[must_use]
    pub fn attributes_to_include(&self) -> &[String] {
        &self.include
    }

    /// Whether an attribute is part of the resolved include-list.
    #[must_use]
    pub fn includes(&self, attribute: &str) -> bool {
        self.include.iter().any(|attr| attr == attribute)
    }

    /// The allowed-writable attribute set.
    #[must_use]
    pub const fn writable(&self) -> &BTreeSet<String> {
        &self.writable
    }

    /// Restrict raw input to the allowed-writable set.
    ///
    /// Unknown and forbidden keys are silently dropped, not rejected; see
    /// the design notes for the trade-off.
    #[must_use]
    pub fn filter_in(&self, raw: Map<String, Value>) -> Map<String, Value> {
        let (kept, dropped): (Vec<_>, Vec<_>) = raw
            .into_iter()
            .partition(|(key, _)| self.writable.contains(key));

        if !dropped.is_empty() {
            let keys: Vec<&str> = dropped.iter().map(|(key, _)| key.as_str()).collect();
            tracing::debug!(dropped = ?keys, "dropped non-writable input attributes");
        }

        kept.into_iter().collect()
    }

    /// Restrict projected data to the resolved include-list.
    #[must_use]
    pub fn filter_out(&self, data: Map<String, Value>) -> Map<String, Value> {
        data.into_iter()
            .filter(|(key, _)| self.includes(key))
            .collect()
    }

    /// Set every included-but-absent key to null, guaranteeing a stable
    /// response shape regardless of entity state.
    pub fn null_fill(&self, data: &mut Map<String, Value>) {
        for attribute in &self.include {
            if !data.contains_key(attribute) {
                data.insert(attribute.clone(), Value::Null);
            }
        }
    }
}
