//! Per-peer parameter store.
//!
//! A concurrent name → value map. Cloning a store yields another handle to
//! the same map, so a record handed out by the registry still observes (and
//! publishes) parameter updates made by the health monitor or by inbound
//! `parameter` commands. Use [`ParameterStore::deep_copy`] for an
//! independent map.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::param::{Parameter, Value};

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: Arc<DashMap<String, Value>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. Last write wins.
    pub fn upsert(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|v| v.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.remove(name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Visit a point-in-time copy of every parameter. No lock is held while
    /// `f` runs, so `f` may update this store.
    pub fn for_each(&self, mut f: impl FnMut(&str, &Value)) {
        for p in self.snapshot() {
            f(&p.name, &p.value);
        }
    }

    /// Copy of all parameters. Iteration order is unspecified.
    pub fn snapshot(&self) -> Vec<Parameter> {
        self.values
            .iter()
            .map(|e| Parameter {
                name: e.key().clone(),
                value: e.value().clone(),
            })
            .collect()
    }

    /// Copy of all parameters ordered by name.
    pub fn sorted(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Independent store holding the same values.
    pub fn deep_copy(&self) -> Self {
        let copy = Self::new();
        for e in self.values.iter() {
            copy.values.insert(e.key().clone(), e.value().clone());
        }
        copy
    }

    /// True if both handles refer to the same underlying map.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// Boolean value of `name`, if present and boolean.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(|v| v.value().as_bool())
    }
}

impl FromIterator<Parameter> for ParameterStore {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let store = Self::new();
        for p in iter {
            store.upsert(p.name, p.value);
        }
        store
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
