use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::Mutex;

/// A keyed map behind a single async lock. Every method holds the lock for
/// its whole body, so each call is atomic with respect to the others.
#[derive(Default)]
pub struct GenericMemoryStore<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    store: Mutex<HashMap<K, V>>,
}

impl<K, V> GenericMemoryStore<K, V>
where
    K: Eq + Hash + Send + Clone + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.store.lock().await.get(key).cloned()
    }

    /// Inserts only when the key is absent. Returns whether it inserted.
    pub async fn put_if_absent(&self, key: K, value: V) -> bool {
        let mut store = self.store.lock().await;
        if store.contains_key(&key) {
            return false;
        }
        store.insert(key, value);
        true
    }

    /// Inserts every absent key under one lock, skipping keys already present.
    pub async fn put_many_if_absent<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut store = self.store.lock().await;
        for (key, value) in entries {
            store.entry(key).or_insert(value);
        }
    }

    /// Applies `f` to the entry for `key`, creating it from `V::default()`
    /// first if needed.
    pub async fn update<F, R>(&self, key: K, f: F) -> R
    where
        V: Default,
        F: FnOnce(&mut V) -> R,
    {
        let mut store = self.store.lock().await;
        f(store.entry(key).or_default())
    }

    /// Like [`update`](Self::update), but an entry created for an absent key
    /// is only kept when `f` reports a change.
    pub async fn update_if_changed<F, T>(&self, key: K, f: F) -> (bool, T)
    where
        V: Default,
        F: FnOnce(&mut V) -> (bool, T),
    {
        let mut store = self.store.lock().await;
        if let Some(value) = store.get_mut(&key) {
            return f(value);
        }
        let mut value = V::default();
        let (changed, out) = f(&mut value);
        if changed {
            store.insert(key, value);
        }
        (changed, out)
    }

    /// Like [`update`](Self::update) for many keys, under one lock.
    pub async fn update_many<I, F>(&self, entries: I, mut f: F)
    where
        V: Default,
        I: IntoIterator<Item = K>,
        F: FnMut(&K, &mut V),
    {
        let mut store = self.store.lock().await;
        for key in entries {
            let value = store.entry(key.clone()).or_default();
            f(&key, value);
        }
    }

    pub async fn put_many<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.store.lock().await.extend(entries);
    }

    pub async fn all(&self) -> HashMap<K, V> {
        self.store.lock().await.clone()
    }
}
