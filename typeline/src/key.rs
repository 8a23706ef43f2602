//! Typed store keys.
//!
//! A key is an identity token. Its display name exists only for diagnostics;
//! lookups always go through the [`KeyId`], so two keys created with the same
//! name never alias each other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque, globally unique key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(Uuid);

impl KeyId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type-erased key: identity plus display name.
///
/// Used wherever the value type does not matter, e.g. in a step's
/// `requires`/`provides` sets.
#[derive(Clone)]
pub struct AnyKey {
    id: KeyId,
    name: Arc<str>,
}

impl AnyKey {
    /// Returns the key identity.
    #[must_use]
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }
}

impl PartialEq for AnyKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AnyKey {}

impl Hash for AnyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for AnyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyKey")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Display for AnyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A key for a store slot holding values of type `T`.
///
/// `T` is a compile-time tag only; the key itself holds no value.
pub struct Key<T> {
    inner: AnyKey,
    _type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Creates a fresh key. Every call yields a distinct identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            inner: AnyKey {
                id: KeyId::generate(),
                name: Arc::from(name),
            },
            _type: PhantomData,
        }
    }

    /// Returns the key identity.
    #[must_use]
    pub fn id(&self) -> KeyId {
        self.inner.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the type-erased view of this key.
    #[must_use]
    pub fn erased(&self) -> AnyKey {
        self.inner.clone()
    }
}

// Manual impls so `T` needs no bounds.
impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _type: PhantomData,
        }
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.inner.name)
            .field("type", &std::any::type_name::<T>())
            .field("id", &self.inner.id)
            .finish()
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<T> From<&Key<T>> for AnyKey {
    fn from(key: &Key<T>) -> Self {
        key.erased()
    }
}

impl<T> From<Key<T>> for AnyKey {
    fn from(key: Key<T>) -> Self {
        key.inner
    }
}

/// Creates a fresh typed key with the given display name.
#[must_use]
pub fn create_key<T>(name: impl Into<String>) -> Key<T> {
    Key::new(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_name_distinct_identity() {
        let a: Key<u32> = create_key("value");
        let b: Key<u32> = create_key("value");

        assert_eq!(a.name(), b.name());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_clone_preserves_identity() {
        let a: Key<String> = create_key("user");
        let b = a.clone();

        assert_eq!(a, b);
        assert_eq!(a.erased(), b.erased());
    }

    #[test]
    fn test_erased_hashing_uses_identity() {
        let a: Key<u32> = create_key("x");
        let b: Key<&'static str> = create_key("x");

        let set: HashSet<AnyKey> = [a.erased(), a.erased(), b.erased()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_and_debug() {
        let key: Key<Vec<u8>> = create_key("payload");
        assert_eq!(key.to_string(), "payload");
        assert!(format!("{key:?}").contains("Vec<u8>"));
        assert_eq!(AnyKey::from(&key).to_string(), "payload");
    }

    #[test]
    fn test_key_is_send_sync_for_any_type() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Key<std::rc::Rc<u8>>>();
    }
}
