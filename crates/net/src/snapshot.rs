//! # Weight Snapshots
//!
//! A read-only copy of every learnable tensor in a layer or network, keyed
//! by the owning unit's [`Meta`]. Snapshots are for inspection and export;
//! nothing reads them back into a live network.

use std::collections::BTreeMap;

use bptt_diff::{Meta, Weights};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<Meta, Weights>,
}

#[derive(Serialize)]
struct Entry<'a> {
    meta: &'a Meta,
    weights: &'a Weights,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, meta: Meta, weights: Weights) {
        self.entries.insert(meta, weights);
    }

    /// Merge another snapshot into this one.
    pub fn extend(&mut self, other: Snapshot) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, meta: &Meta) -> Option<&Weights> {
        self.entries.get(meta)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in `Meta` order.
    pub fn iter(&self) -> impl Iterator<Item = (&Meta, &Weights)> {
        self.entries.iter()
    }

    /// A JSON array of `{ meta, weights }` objects in `Meta` order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let entries: Vec<Entry<'_>> = self
            .entries
            .iter()
            .map(|(meta, weights)| Entry { meta, weights })
            .collect();
        serde_json::to_string_pretty(&entries)
    }
}
