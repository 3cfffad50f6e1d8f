use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::Value;

/// Everything learned about a design so far, keyed by result name.
///
/// Entries can be added or overwritten but never removed. Storage is shared
/// between clones and copied on the first write, so a step can clone the
/// conditions it received, add to the clone, and leave every other holder of
/// the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions {
    entries: Arc<BTreeMap<String, Value>>,
}

impl Conditions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Adds or overwrites an entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        Arc::make_mut(&mut self.entries).insert(key.into(), value.into())
    }

    /// Adds or overwrites several entries at once.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Arc::make_mut(&mut self.entries).extend(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if both hold the same underlying storage.
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<K, V> FromIterator<(K, V)> for Conditions
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut conditions = Self::new();
        conditions.extend(iter);
        conditions
    }
}
