//! Per-task result caches.
//!
//! Each task owns exactly one [`TaskCache`]. Whether it stores anything is decided at run time by
//! the task's fan-in: the owning task enables the cache once a second consumer registers and
//! disables it again when consumers drop back to one or zero.

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

use lru::LruCache;
use parking_lot::Mutex;

use crate::foundation::core::TaskId;
use crate::render::image::{PngBytes, RasterImage};

/// A task result that can be cached, including behind a weak reference.
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Non-owning form of the value.
    type Weak: Send + Sync + 'static;

    fn downgrade(&self) -> Self::Weak;

    /// `None` once every strong holder is gone.
    fn upgrade(weak: &Self::Weak) -> Option<Self>;
}

pub struct WeakImage {
    width: u32,
    height: u32,
    pixels: Weak<Vec<u8>>,
}

impl CacheValue for RasterImage {
    type Weak = WeakImage;

    fn downgrade(&self) -> WeakImage {
        WeakImage {
            width: self.width(),
            height: self.height(),
            pixels: Arc::downgrade(self.shared_pixels()),
        }
    }

    fn upgrade(weak: &WeakImage) -> Option<Self> {
        let pixels = weak.pixels.upgrade()?;
        Some(RasterImage::from_shared(weak.width, weak.height, pixels))
    }
}

impl CacheValue for PngBytes {
    type Weak = Weak<Vec<u8>>;

    fn downgrade(&self) -> Weak<Vec<u8>> {
        Arc::downgrade(&self.0)
    }

    fn upgrade(weak: &Weak<Vec<u8>>) -> Option<Self> {
        weak.upgrade().map(PngBytes)
    }
}

impl CacheValue for () {
    type Weak = ();

    fn downgrade(&self) {}

    fn upgrade(_: &()) -> Option<Self> {
        Some(())
    }
}

/// How a task stores its last successful result while caching is enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Never store.
    None,
    /// Keep until cleared.
    #[default]
    Strong,
    /// Keep a weak reference; the value survives only while someone else holds it.
    Weak,
    /// Store in an LRU shared by every task of the same value type.
    SharedLru {
        /// Entries kept across all participating tasks.
        capacity: usize,
    },
}

/// LRU store shared by many tasks, keyed by task identity.
pub struct SharedLru<T> {
    entries: Mutex<LruCache<TaskId, T>>,
}

impl<T: Clone> SharedLru<T> {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: TaskId) -> Option<T> {
        self.entries.lock().get(&key).cloned()
    }

    pub fn put(&self, key: TaskId, value: T) {
        self.entries.lock().put(key, value);
    }

    pub fn remove(&self, key: TaskId) -> Option<T> {
        self.entries.lock().pop(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Store<T: CacheValue> {
    Noop,
    Strong(Option<T>),
    Weak(Option<T::Weak>),
    Shared { lru: Arc<SharedLru<T>>, key: TaskId },
}

/// Storage slot for one task's last successful result.
///
/// While disabled, [`TaskCache::get_now`] is always empty and [`TaskCache::set`] does nothing.
pub struct TaskCache<T: CacheValue> {
    enabled: bool,
    store: Store<T>,
}

impl<T: CacheValue> TaskCache<T> {
    pub fn noop() -> Self {
        Self::with_store(Store::Noop)
    }

    pub fn strong() -> Self {
        Self::with_store(Store::Strong(None))
    }

    pub fn weak() -> Self {
        Self::with_store(Store::Weak(None))
    }

    pub fn shared(lru: Arc<SharedLru<T>>, key: TaskId) -> Self {
        Self::with_store(Store::Shared { lru, key })
    }

    fn with_store(store: Store<T>) -> Self {
        Self {
            enabled: false,
            store,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start storing results. Returns `false` for a no-op cache, which never enables.
    pub fn enable(&mut self) -> bool {
        if matches!(self.store, Store::Noop) {
            return false;
        }
        self.enabled = true;
        true
    }

    /// Stop storing results, handing back whatever was still stored.
    pub fn disable(&mut self) -> Option<T> {
        let value = self.take();
        self.enabled = false;
        value
    }

    pub fn get_now(&self) -> Option<T> {
        if !self.enabled {
            return None;
        }
        match &self.store {
            Store::Noop => None,
            Store::Strong(v) => v.clone(),
            Store::Weak(w) => w.as_ref().and_then(T::upgrade),
            Store::Shared { lru, key } => lru.get(*key),
        }
    }

    pub fn set(&mut self, value: T) {
        if !self.enabled {
            return;
        }
        match &mut self.store {
            Store::Noop => {}
            Store::Strong(v) => *v = Some(value),
            Store::Weak(w) => *w = Some(value.downgrade()),
            Store::Shared { lru, key } => lru.put(*key, value),
        }
    }

    pub fn clear(&mut self) {
        self.take();
    }

    fn take(&mut self) -> Option<T> {
        match &mut self.store {
            Store::Noop => None,
            Store::Strong(v) => v.take(),
            Store::Weak(w) => w.take().as_ref().and_then(T::upgrade),
            Store::Shared { lru, key } => lru.remove(*key),
        }
    }
}

impl<T: CacheValue> Drop for TaskCache<T> {
    fn drop(&mut self) {
        if let Store::Shared { lru, key } = &self.store {
            lru.remove(*key);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/cache.rs"]
mod tests;
