use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Signature of the closure passed to [`DocumentStore::update`]: gets the
/// current bytes, returns the bytes to write or `None` to leave the key as is.
pub type UpdateFn<'a> = dyn FnMut(Option<Vec<u8>>) -> anyhow::Result<Option<Vec<u8>>> + 'a;

/// Key/document storage the handlers run against.
///
/// Writes are atomic per key and nothing more: multi-document updates are
/// sequences of independent writes.
pub trait DocumentStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Read-modify-write of one key. `apply` must not call back into the store.
    ///
    /// The default is a plain get followed by a set; stores shared between
    /// threads override it so no other write to `key` can land in between.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> anyhow::Result<()> {
        if let Some(next) = apply(self.get(key)?)? {
            self.set(key, &next)?;
        }
        Ok(())
    }
}

pub trait DocumentStoreExt: DocumentStore {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("decoding document {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(value).with_context(|| format!("encoding document {key}"))?;
        self.set(key, &bytes)
    }

    /// Mutates the document at `key` in place. `None` when there is no document.
    fn update_json<T, R>(&self, key: &str, mutate: impl FnOnce(&mut T) -> R) -> anyhow::Result<Option<R>>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut mutate = Some(mutate);
        let mut result = None;
        self.update(key, &mut |current| {
            let (Some(bytes), Some(mutate)) = (current, mutate.take()) else {
                return Ok(None);
            };
            let mut doc: T =
                serde_json::from_slice(&bytes).with_context(|| format!("decoding document {key}"))?;
            result = Some(mutate(&mut doc));
            let next = serde_json::to_vec(&doc).with_context(|| format!("encoding document {key}"))?;
            Ok(Some(next))
        })?;
        Ok(result)
    }

    /// Like [`update_json`](Self::update_json), starting from `T::default()` when the key is unset.
    fn upsert_json<T, R>(&self, key: &str, mutate: impl FnOnce(&mut T) -> R) -> anyhow::Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let mut mutate = Some(mutate);
        let mut result = None;
        self.update(key, &mut |current| {
            let Some(mutate) = mutate.take() else {
                return Ok(None);
            };
            let mut doc: T = match current {
                Some(bytes) => {
                    serde_json::from_slice(&bytes).with_context(|| format!("decoding document {key}"))?
                }
                None => T::default(),
            };
            result = Some(mutate(&mut doc));
            let next = serde_json::to_vec(&doc).with_context(|| format!("encoding document {key}"))?;
            Ok(Some(next))
        })?;
        result.ok_or_else(|| anyhow!("update of {key} did not run"))
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// The Spin key-value store backing the wasm component.
///
/// Spin has no cross-request lock on a key, so `update` is the default
/// get-then-set.
pub struct KvStore {
    inner: spin_sdk::key_value::Store,
}

impl KvStore {
    pub fn open_default() -> anyhow::Result<Self> {
        let inner = spin_sdk::key_value::Store::open_default()
            .map_err(|e| anyhow!("opening default key-value store: {e}"))?;
        Ok(Self { inner })
    }
}

impl DocumentStore for KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.get(key).map_err(|e| anyhow!("kv get {key}: {e}"))
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.inner.set(key, value).map_err(|e| anyhow!("kv set {key}: {e}"))
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.delete(key).map_err(|e| anyhow!("kv delete {key}: {e}"))
    }
}

/// Process-local store for the native server and tests. Data does not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let Ok(docs) = self.docs.read() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = docs.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        keys
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let docs = self.docs.read().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(docs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("memory store lock poisoned"))?;
        docs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("memory store lock poisoned"))?;
        docs.remove(key);
        Ok(())
    }

    /// Holds the write lock across `apply`.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> anyhow::Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("memory store lock poisoned"))?;
        if let Some(next) = apply(docs.get(key).cloned())? {
            docs.insert(key.to_string(), next);
        }
        Ok(())
    }
}
