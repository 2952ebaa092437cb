//! Bounded least-recently-used cache over an explicit doubly linked list.
//!
//! Nodes live in a slot arena and are linked by index, so promoting an
//! entry relinks it in place instead of copying it. Lookups scan the list
//! from the most-recently-used end; that is linear in the number of
//! entries, which is fine at the default capacity of 50 but does not scale
//! to thousands of keys.

use crate::error::{CoreError, CoreResult};

/// Capacity used by [`ByteCache::default`].
pub const DEFAULT_CAPACITY: usize = 50;

/// A key/value pair owned by the cache's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
}

#[derive(Debug)]
struct Node<T> {
    entry: CacheEntry<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// String-keyed LRU cache with a fixed capacity.
///
/// The head of the list is the most recently used entry and the tail is
/// the next eviction candidate.
///
/// # Examples
///
/// ```
/// use opfsx_core::cache::ByteCache;
///
/// let mut cache = ByteCache::new(2).unwrap();
/// cache.set("a", 1);
/// cache.set("b", 2);
/// cache.set("c", 3);
/// assert_eq!(cache.get("a"), None);
/// assert_eq!(cache.get("c"), Some(&3));
/// ```
#[derive(Debug)]
pub struct ByteCache<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    capacity: usize,
}

impl<T> ByteCache<T> {
    /// Creates an empty cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidCapacity`] if `capacity` is `0`.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        if capacity == 0 {
            return Err(CoreError::InvalidCapacity(capacity));
        }
        Ok(Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            capacity,
        })
    }

    /// Builds a cache by inserting `entries` in order; later entries end up
    /// most recently used.
    pub fn from_entries<I>(entries: I, capacity: usize) -> CoreResult<Self>
    where
        I: IntoIterator<Item = CacheEntry<T>>,
    {
        let mut cache = Self::new(capacity)?;
        for entry in entries {
            cache.set(entry.key, entry.value);
        }
        Ok(cache)
    }

    /// Returns the value stored under `key` and marks it most recently used.
    ///
    /// A miss returns `None` and leaves the order untouched.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        self.get_by(|entry| entry.key == key)
    }

    /// Returns the first entry (scanning from most recently used) accepted
    /// by `predicate`, and marks it most recently used.
    pub fn get_by<F>(&mut self, predicate: F) -> Option<&T>
    where
        F: Fn(&CacheEntry<T>) -> bool,
    {
        let index = self.find(predicate)?;
        self.promote(index);
        self.node(index).map(|node| &node.entry.value)
    }

    /// Inserts or replaces `key`, making it most recently used.
    ///
    /// Evicts from the least-recently-used end until the cache fits its
    /// capacity again.
    pub fn set(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        if let Some(index) = self.find(|entry| entry.key == key) {
            if let Some(node) = self.node_mut(index) {
                node.entry.value = value;
            }
            self.promote(index);
            return;
        }

        let index = self.alloc(Node {
            entry: CacheEntry { key, value },
            prev: None,
            next: None,
        });
        self.push_front(index);
        self.len += 1;

        while self.len > self.capacity {
            if self.pop_back().is_none() {
                break;
            }
        }
    }

    /// Removes `key` and returns its value, if present.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let index = self.find(|entry| entry.key == key)?;
        self.take(index).map(|entry| entry.value)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys ordered from most to least recently used.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let Some(node) = self.node(index) else { break };
            keys.push(node.entry.key.as_str());
            cursor = node.next;
        }
        keys
    }

    fn find<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&CacheEntry<T>) -> bool,
    {
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let node = self.node(index)?;
            if predicate(&node.entry) {
                return Some(index);
            }
            cursor = node.next;
        }
        None
    }

    fn node(&self, index: usize) -> Option<&Node<T>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn promote(&mut self, index: usize) {
        if self.head == Some(index) {
            return;
        }
        self.unlink(index);
        self.push_front(index);
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head.and_then(|h| self.node_mut(h)) {
            Some(head) => head.prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    fn unlink(&mut self, index: usize) {
        let Some((prev, next)) = self.node(index).map(|n| (n.prev, n.next)) else {
            return;
        };
        match prev.and_then(|p| self.node_mut(p)) {
            Some(node) => node.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(node) => node.prev = prev,
            None => self.tail = prev,
        }
        if let Some(node) = self.node_mut(index) {
            node.prev = None;
            node.next = None;
        }
    }

    fn take(&mut self, index: usize) -> Option<CacheEntry<T>> {
        self.unlink(index);
        let node = self.slots.get_mut(index)?.take()?;
        self.free.push(index);
        self.len -= 1;
        Some(node.entry)
    }

    fn pop_back(&mut self) -> Option<CacheEntry<T>> {
        let index = self.tail?;
        self.take(index)
    }
}

impl<T> Default for ByteCache<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            capacity: DEFAULT_CAPACITY,
        }
    }
}
