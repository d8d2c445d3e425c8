//! Shared per-run key/value state.
//!
//! `MemoryStore` is the mutable state that flows through a workflow run.
//! Every step reads what earlier steps wrote and task steps write their
//! output back under a declared key. The store is schema-less (a JSON map);
//! [`MemoryKey`] layers typed access on top for well-known keys.
//!
//! Absence is never an error: lookups return `Option` or fall back to a
//! caller-supplied default.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// MemoryKey
// ---------------------------------------------------------------------------

/// A well-known memory key paired with the Rust type stored under it.
///
/// ```
/// use waypoint_core::memory::{MemoryKey, MemoryStore};
///
/// const CASE: MemoryKey<String> = MemoryKey::new("case");
///
/// let mut memory = MemoryStore::new();
/// memory.set_typed(&CASE, &"dismissed after 5 years".to_string()).unwrap();
/// assert_eq!(memory.get_typed(&CASE).as_deref(), Some("dismissed after 5 years"));
/// ```
pub struct MemoryKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MemoryKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for MemoryKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MemoryKey<T> {}

impl<T> fmt::Debug for MemoryKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemoryKey").field(&self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Keyed state for exactly one workflow run. Last write wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    entries: Map<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Look up `key`, falling back to `default` when it is absent.
    pub fn get<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.entries.get(key).unwrap_or(default)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Bulk merge; entries in `data` overwrite existing keys.
    pub fn update(&mut self, data: Map<String, Value>) {
        for (key, value) in data {
            self.entries.insert(key, value);
        }
    }

    /// Walk `path` through nested objects.
    ///
    /// Returns `None` as soon as a segment is missing or an intermediate value
    /// is not an object. An empty path yields `None`.
    pub fn get_nested_value(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.entries.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    /// [`get_nested_value`](Self::get_nested_value) with a fallback value.
    pub fn get_nested<'a>(&'a self, path: &[&str], default: &'a Value) -> &'a Value {
        self.get_nested_value(path).unwrap_or(default)
    }

    /// Numeric lookup for threshold conditions such as
    /// `classification.confidence >= 0.5`.
    pub fn get_f64_nested(&self, path: &[&str]) -> Option<f64> {
        self.get_nested_value(path).and_then(Value::as_f64)
    }

    pub fn get_str_nested(&self, path: &[&str]) -> Option<&str> {
        self.get_nested_value(path).and_then(Value::as_str)
    }

    /// Deserialize the value under a typed key. Shape mismatches read as absent.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &MemoryKey<T>) -> Option<T> {
        self.entries
            .get(key.name())
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_typed<T: Serialize>(
        &mut self,
        key: &MemoryKey<T>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(key.name().to_string(), value);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Deep copy of the current state. The copy shares nothing with the
    /// live store.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries.clone()
    }

    /// Curated subset: the listed keys that are present and non-null,
    /// in the order given.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Map<String, Value> {
        let mut selected = Map::new();
        for key in keys {
            let key = key.as_ref();
            match self.entries.get(key) {
                Some(Value::Null) | None => {}
                Some(value) => {
                    selected.insert(key.to_string(), value.clone());
                }
            }
        }
        selected
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.entries
    }
}

impl From<Map<String, Value>> for MemoryStore {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
