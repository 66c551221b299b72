//! Snapshot maps and live views over them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::watch;

/// Immutable view of a whole cache: one shared list per key.
pub type Snapshot<K, T> = Arc<HashMap<K, Arc<Vec<T>>>>;

/// A keyed cache whose lists are only ever replaced, never edited in place.
///
/// Every write computes the new list for a key and swaps it in under the
/// channel's write lock, so readers always see either the old or the new
/// list. Subscribers are woken only when a write actually changed something.
#[derive(Debug)]
pub(crate) struct SnapshotMap<K, T> {
    tx: watch::Sender<Snapshot<K, T>>,
}

impl<K, T> SnapshotMap<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(HashMap::new()));
        Self { tx }
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<Vec<T>>> {
        self.tx.borrow().get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.tx.borrow().contains_key(key)
    }

    /// Computes a new list for `key` from the current one.
    ///
    /// `f` receives the current list (if any) and returns the replacement, or
    /// `None` to leave the cache untouched. Returns the list now stored.
    pub(crate) fn update<F>(&self, key: &K, f: F) -> Option<Arc<Vec<T>>>
    where
        F: FnOnce(Option<&[T]>) -> Option<Vec<T>>,
    {
        let mut stored = None;
        self.tx.send_if_modified(|snapshot| {
            let Some(next) = f(snapshot.get(key).map(|list| list.as_slice())) else {
                return false;
            };
            let next = Arc::new(next);
            Arc::make_mut(snapshot).insert(key.clone(), Arc::clone(&next));
            stored = Some(next);
            true
        });
        stored
    }

    /// Replaces the list for `key` wholesale.
    pub(crate) fn replace(&self, key: &K, list: Vec<T>) -> Arc<Vec<T>> {
        let list = Arc::new(list);
        self.tx.send_modify(|snapshot| {
            Arc::make_mut(snapshot).insert(key.clone(), Arc::clone(&list));
        });
        list
    }

    /// Stores `list` only if `key` has no entry yet.
    pub(crate) fn insert_if_absent(&self, key: &K, list: Vec<T>) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.contains_key(key) {
                return false;
            }
            Arc::make_mut(snapshot).insert(key.clone(), Arc::new(list));
            true
        })
    }

    /// Drops the entry for `key`.
    pub(crate) fn remove(&self, key: &K) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if !snapshot.contains_key(key) {
                return false;
            }
            Arc::make_mut(snapshot).remove(key);
            true
        })
    }

    /// Drops every entry whose key matches `pred`, returning the dropped keys.
    pub(crate) fn remove_where<P>(&self, pred: P) -> Vec<K>
    where
        P: Fn(&K) -> bool,
    {
        let mut removed = Vec::new();
        self.tx.send_if_modified(|snapshot| {
            removed = snapshot.keys().filter(|k| pred(k)).cloned().collect();
            if removed.is_empty() {
                return false;
            }
            let map = Arc::make_mut(snapshot);
            for key in &removed {
                map.remove(key);
            }
            true
        });
        removed
    }

    pub(crate) fn watch(&self, key: K) -> LiveList<K, T> {
        LiveList::new(key, self.tx.subscribe())
    }
}

/// A live view of one cache entry.
///
/// [`LiveList::current`] reads the latest list; [`LiveList::changed`] waits
/// until the entry is replaced. An absent entry reads as an empty list.
#[derive(Debug)]
pub struct LiveList<K, T> {
    key: K,
    rx: watch::Receiver<Snapshot<K, T>>,
    seen: Option<Arc<Vec<T>>>,
}

impl<K, T> LiveList<K, T>
where
    K: Eq + Hash + Clone,
{
    fn new(key: K, mut rx: watch::Receiver<Snapshot<K, T>>) -> Self {
        let seen = rx.borrow_and_update().get(&key).cloned();
        Self { key, rx, seen }
    }

    /// Key this view follows.
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Latest list for the key.
    #[must_use]
    pub fn current(&self) -> Arc<Vec<T>> {
        self.rx
            .borrow()
            .get(&self.key)
            .cloned()
            .unwrap_or_else(|| Arc::new(Vec::new()))
    }

    /// Whether the cache holds an entry for the key (possibly empty).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.rx.borrow().contains_key(&self.key)
    }

    /// Waits until the entry for the key is replaced or removed.
    ///
    /// Returns the new list, or `None` once the owning cache is gone.
    pub async fn changed(&mut self) -> Option<Arc<Vec<T>>> {
        loop {
            self.rx.changed().await.ok()?;
            let next = self.rx.borrow_and_update().get(&self.key).cloned();
            let same = match (&self.seen, &next) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if !same {
                self.seen = next;
                return Some(self.current());
            }
        }
    }

    /// Waits until the list satisfies `pred`, checking the current list first.
    ///
    /// Returns `None` if the owning cache is dropped before that happens.
    pub async fn wait_for<P>(&mut self, pred: P) -> Option<Arc<Vec<T>>>
    where
        P: Fn(&[T]) -> bool,
    {
        let current = self.current();
        if pred(&current) {
            return Some(current);
        }
        loop {
            let next = self.changed().await?;
            if pred(&next) {
                return Some(next);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_list_sees_replacement() {
        let map: SnapshotMap<&'static str, u32> = SnapshotMap::new();
        let mut live = map.watch("a");
        assert!(live.current().is_empty());
        assert!(!live.is_loaded());

        map.replace(&"a", vec![1, 2]);
        let next = live.changed().await.unwrap();
        assert_eq!(*next, vec![1, 2]);
        assert!(live.is_loaded());
    }

    #[tokio::test]
    async fn test_other_keys_do_not_wake() {
        let map: SnapshotMap<&'static str, u32> = SnapshotMap::new();
        let mut live = map.watch("a");

        map.replace(&"b", vec![9]);
        map.replace(&"a", vec![1]);

        assert_eq!(*live.changed().await.unwrap(), vec![1]);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let map: SnapshotMap<&'static str, u32> = SnapshotMap::new();
        map.replace(&"a", vec![1]);
        let before = map.get(&"a").unwrap();

        map.update(&"a", |list| {
            let mut next = list.unwrap_or_default().to_vec();
            next.push(2);
            Some(next)
        });

        assert_eq!(*before, vec![1]);
        assert_eq!(*map.get(&"a").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_update_returning_none_leaves_cache() {
        let map: SnapshotMap<&'static str, u32> = SnapshotMap::new();
        map.replace(&"a", vec![1]);
        let before = map.get(&"a").unwrap();

        assert!(map.update(&"a", |_| None).is_none());
        assert!(Arc::ptr_eq(&before, &map.get(&"a").unwrap()));
    }

    #[test]
    fn test_insert_if_absent_and_remove_where() {
        let map: SnapshotMap<&'static str, u32> = SnapshotMap::new();
        assert!(map.insert_if_absent(&"a", vec![1]));
        assert!(!map.insert_if_absent(&"a", vec![2]));
        map.replace(&"ab", vec![3]);
        map.replace(&"b", vec![4]);

        let mut removed = map.remove_where(|k| k.starts_with('a'));
        removed.sort_unstable();
        assert_eq!(removed, vec!["a", "ab"]);
        assert!(map.contains(&"b"));
        assert!(!map.contains(&"ab"));
    }

    #[tokio::test]
    async fn test_wait_for_checks_current_first() {
        let map: SnapshotMap<&'static str, u32> = SnapshotMap::new();
        map.replace(&"a", vec![1]);
        let mut live = map.watch("a");
        let list = live.wait_for(|l| l.len() == 1).await.unwrap();
        assert_eq!(*list, vec![1]);
    }
}
