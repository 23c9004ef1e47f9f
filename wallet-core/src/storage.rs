// Key-value storage adapter
// Opaque JSON values keyed by string; chrome.storage.local in the extension,
// an in-memory map everywhere else

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::StorageError;

pub mod keys {
    pub const USER: &str = "user";
    pub const AUTH_TOKEN: &str = "authToken";
    pub const LAST_LOGIN: &str = "lastLogin";
    pub const ENABLED: &str = "enabled";
    pub const SETTINGS: &str = "settings";
    pub const FIRST_INSTALL: &str = "firstInstall";
    pub const INSTALL_DATE: &str = "installDate";

    /// Everything that makes up a session
    pub const SESSION: [&str; 3] = [USER, AUTH_TOKEN, LAST_LOGIN];
}

/// Persistent key-value store. Each call is a single atomic operation;
/// nothing spans multiple keys.
#[async_trait(?Send)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}

/// Typed helpers over any [`KeyValueStore`]
#[async_trait(?Send)]
pub trait KeyValueStoreExt: KeyValueStore {
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StorageError::Decode {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|e| StorageError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set(key, value).await
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

#[async_trait(?Send)]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Rc<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).remove(keys).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }
}

/// Process-local store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.borrow_mut();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set(keys::AUTH_TOKEN, json!("tok")).await.unwrap();
        store.set(keys::ENABLED, json!(true)).await.unwrap();

        assert_eq!(store.get(keys::AUTH_TOKEN).await.unwrap(), Some(json!("tok")));

        store.remove(&[keys::AUTH_TOKEN]).await.unwrap();
        assert_eq!(store.get(keys::AUTH_TOKEN).await.unwrap(), None);
        assert!(store.contains(keys::ENABLED));

        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = MemoryStore::new();
        store.set_json(keys::LAST_LOGIN, &1234u64).await.unwrap();
        let last: Option<u64> = store.get_json(keys::LAST_LOGIN).await.unwrap();
        assert_eq!(last, Some(1234));

        store.set(keys::USER, json!("not a user")).await.unwrap();
        let user: Result<Option<crate::types::User>, _> = store.get_json(keys::USER).await;
        assert!(matches!(user, Err(StorageError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        other.set("k", json!(1)).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
