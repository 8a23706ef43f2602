//! Run-scoped, type-erased key/value store.
//!
//! Values are stored untyped behind their key identity; the key's type
//! parameter restores the type at `get`/`set` call sites. The store is shared
//! by reference between the concurrently running members of a parallel
//! group, so all access goes through an internal lock.
//!
//! Values written with [`Store::set_serialized`] appear in snapshots as
//! their JSON rendering; values written with [`Store::set`] appear as their
//! type name.

use crate::errors::MissingKeyError;
use crate::key::{Key, KeyId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type Erased = Arc<dyn Any + Send + Sync>;
type Render = fn(&(dyn Any + Send + Sync)) -> serde_json::Value;

struct StoreEntry {
    name: Arc<str>,
    value: Erased,
    render: Render,
}

fn render_opaque<T: 'static>(_value: &(dyn Any + Send + Sync)) -> serde_json::Value {
    serde_json::Value::String(format!("<{}>", std::any::type_name::<T>()))
}

fn render_as<T: Serialize + 'static>(value: &(dyn Any + Send + Sync)) -> serde_json::Value {
    match value.downcast_ref::<T>() {
        Some(v) => serde_json::to_value(v)
            .unwrap_or_else(|e| serde_json::Value::String(format!("<unserializable: {e}>"))),
        None => serde_json::Value::Null,
    }
}

/// A heterogeneous mapping from typed keys to values, owned by one run.
///
/// Keys never set are absent; there is no null-valued slot.
#[derive(Default)]
pub struct Store {
    entries: RwLock<IndexMap<KeyId, StoreEntry>>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any prior value.
    ///
    /// Any `Send + Sync` value is accepted; snapshots show its type name.
    pub fn set<T>(&self, key: &Key<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.insert(key, value, render_opaque::<T>);
    }

    /// Like [`set`](Self::set), but snapshots render the value through serde.
    pub fn set_serialized<T>(&self, key: &Key<T>, value: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.insert(key, value, render_as::<T>);
    }

    fn insert<T>(&self, key: &Key<T>, value: T, render: Render)
    where
        T: Send + Sync + 'static,
    {
        let entry = StoreEntry {
            name: key.erased().shared_name(),
            value: Arc::new(value),
            render,
        };
        self.entries.write().insert(key.id(), entry);
    }

    /// Returns a clone of the value under `key`, or `None` if never set.
    #[must_use]
    pub fn get<T>(&self, key: &Key<T>) -> Option<T>
    where
        T: Clone + 'static,
    {
        self.with(key, T::clone)
    }

    /// Returns a clone of the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingKeyError`] naming the key if it has not been set.
    pub fn require<T>(&self, key: &Key<T>) -> Result<T, MissingKeyError>
    where
        T: Clone + 'static,
    {
        self.get(key).ok_or_else(|| MissingKeyError::new(key.name()))
    }

    /// Borrows the value under `key` for the duration of `f`, without cloning it.
    pub fn with<T, R>(&self, key: &Key<T>, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: 'static,
    {
        let value = self.entries.read().get(&key.id()).map(|e| Arc::clone(&e.value))?;
        value.downcast_ref::<T>().map(f)
    }

    /// Returns true if `key` has been set in this run.
    #[must_use]
    pub fn has<T>(&self, key: &Key<T>) -> bool {
        self.contains_id(key.id())
    }

    pub(crate) fn contains_id(&self, id: KeyId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Removes and returns the value under `key`.
    pub fn remove<T>(&self, key: &Key<T>) -> Option<T>
    where
        T: Clone + 'static,
    {
        let entry = self.entries.write().shift_remove(&key.id())?;
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Returns the number of keys set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the display names of all set keys, in insertion order.
    #[must_use]
    pub fn key_names(&self) -> Vec<String> {
        self.entries
            .read()
            .values()
            .map(|e| e.name.to_string())
            .collect()
    }

    /// Moves every entry into a new store, leaving this one empty.
    pub(crate) fn take(&self) -> Self {
        Self {
            entries: RwLock::new(std::mem::take(&mut *self.entries.write())),
        }
    }

    /// Captures a diagnostic view keyed by display name.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let entries = self.entries.read();
        let mut values = IndexMap::with_capacity(entries.len());
        for entry in entries.values() {
            values.insert(entry.name.to_string(), (entry.render)(entry.value.as_ref()));
        }
        StoreSnapshot { values }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.key_names())
            .finish()
    }
}

/// Frozen `name -> value` view of a store, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    values: IndexMap<String, serde_json::Value>,
}

impl StoreSnapshot {
    /// Returns the rendered value for a display name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the display names, in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `(name, summary)` pairs, in insertion order.
    #[must_use]
    pub fn summaries(&self) -> Vec<(&str, String)> {
        self.iter().map(|(k, v)| (k, summarize(v))).collect()
    }
}

impl Serialize for StoreSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

/// Renders a short diagnostic summary of a value.
#[must_use]
pub fn summarize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("\"{s}\""),
        serde_json::Value::Array(items) => format!("Array({})", items.len()),
        serde_json::Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("{{ {} }}", keys.join(", "))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::create_key;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct User {
        id: String,
        name: String,
    }

    #[test]
    fn test_set_then_require() {
        let store = Store::new();
        let key: Key<u32> = create_key("count");

        store.set(&key, 7);

        assert_eq!(store.require(&key), Ok(7));
        assert_eq!(store.get(&key), Some(7));
        assert!(store.has(&key));
    }

    #[test]
    fn test_absent_key() {
        let store = Store::new();
        let key: Key<String> = create_key("missing");

        assert!(!store.has(&key));
        assert_eq!(store.get(&key), None);
        assert_eq!(
            store.require(&key).unwrap_err(),
            MissingKeyError::new("missing")
        );
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let store = Store::new();
        let a: Key<u32> = create_key("a");
        let b: Key<u32> = create_key("b");

        store.set(&a, 1);
        store.set(&b, 2);
        store.set(&a, 3);

        assert_eq!(store.get(&a), Some(3));
        assert_eq!(store.key_names(), vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_same_name_keys_do_not_alias() {
        let store = Store::new();
        let first: Key<u32> = create_key("value");
        let second: Key<u32> = create_key("value");

        store.set(&first, 1);

        assert!(store.has(&first));
        assert!(!store.has(&second));
    }

    #[test]
    fn test_with_borrows() {
        let store = Store::new();
        let key: Key<Vec<u32>> = create_key("items");
        store.set(&key, vec![1, 2, 3]);

        let total = store.with(&key, |items| items.iter().sum::<u32>());
        assert_eq!(total, Some(6));
    }

    #[test]
    fn test_remove() {
        let store = Store::new();
        let key: Key<&'static str> = create_key("flag");
        store.set(&key, "on");

        assert_eq!(store.remove(&key), Some("on"));
        assert!(!store.has(&key));
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_order_and_values() {
        let store = Store::new();
        let user: Key<User> = create_key("user");
        let tags: Key<Vec<String>> = create_key("tags");
        let title: Key<String> = create_key("title");

        store.set_serialized(&title, "Report".to_string());
        store.set_serialized(
            &user,
            User {
                id: "u1".to_string(),
                name: "Ada".to_string(),
            },
        );
        store.set_serialized(&tags, vec!["a".to_string(), "b".to_string()]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.names(), vec!["title", "user", "tags"]);
        assert_eq!(snapshot.get("title"), Some(&serde_json::json!("Report")));

        let summaries: Vec<(String, String)> = snapshot
            .summaries()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(
            summaries,
            vec![
                ("title".to_string(), "\"Report\"".to_string()),
                ("user".to_string(), "{ id, name }".to_string()),
                ("tags".to_string(), "Array(2)".to_string()),
            ]
        );
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let store = Store::new();
        let key: Key<u32> = create_key("n");
        store.set_serialized(&key, 1);

        let snapshot = store.snapshot();
        store.set_serialized(&key, 2);

        assert_eq!(snapshot.get("n"), Some(&serde_json::json!(1)));
    }

    struct Client {
        base_url: String,
    }

    #[test]
    fn test_non_serializable_values() {
        let store = Store::new();
        let key: Key<Arc<Client>> = create_key("client");

        store.set(
            &key,
            Arc::new(Client {
                base_url: "https://api.example.com".to_string(),
            }),
        );

        let client = store.require(&key).unwrap();
        assert_eq!(client.base_url, "https://api.example.com");

        let rendered = store.snapshot().get("client").cloned();
        let expected = format!("<{}>", std::any::type_name::<Arc<Client>>());
        assert_eq!(rendered, Some(serde_json::Value::String(expected)));
    }

    #[test]
    fn test_summarize_scalars() {
        assert_eq!(summarize(&serde_json::Value::Null), "null");
        assert_eq!(summarize(&serde_json::json!(42)), "42");
        assert_eq!(summarize(&serde_json::json!(true)), "true");
        assert_eq!(summarize(&serde_json::json!({})), "{  }");
    }
}
