// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Short-lived memoization of layout reads and selector queries.

use core::any::Any;
use core::cell::RefCell;
use core::fmt;
use std::rc::{Rc, Weak};

use bramble_dom::{
    Document, DomError, EventTarget, ListenerId, ListenerOptions, NodeId, ObserverId,
    SelectorList,
};
use hashbrown::HashMap;
use kurbo::{Rect, Size};

/// Cache lifetimes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct CacheConfig {
    /// Maximum age of rect, query and memo entries, in milliseconds.
    pub max_age_ms: f64,
    /// Maximum age of the viewport snapshot, in milliseconds.
    pub viewport_max_age_ms: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 100.0,
            viewport_max_age_ms: 16.0,
        }
    }
}

#[derive(Clone, Debug)]
struct Entry<T> {
    value: T,
    at: f64,
}

impl<T> Entry<T> {
    fn fresh(&self, now: f64, max_age: f64) -> bool {
        now - self.at < max_age
    }
}

#[derive(Clone, Debug)]
struct QueryEntry {
    nodes: Vec<NodeId>,
    epoch: u64,
}

#[derive(Default)]
struct Store {
    rects: HashMap<NodeId, Entry<Rect>>,
    queries: HashMap<NodeId, HashMap<String, Entry<QueryEntry>>>,
    memo: HashMap<NodeId, HashMap<String, Entry<Rc<dyn Any>>>>,
    viewport: Option<Entry<Size>>,
}

impl Store {
    fn evict(&mut self, node: NodeId) {
        self.rects.remove(&node);
        self.queries.remove(&node);
        self.memo.remove(&node);
    }
}

struct Shared {
    doc: Document,
    config: CacheConfig,
    store: RefCell<Store>,
    hooks: RefCell<Option<(ObserverId, ListenerId)>>,
}

/// Per-node TTL cache for bounding rects, selector queries and arbitrary values.
///
/// Entries older than their max age are recomputed on the next read. Entries are
/// keyed by [`NodeId`] and evicted when the document destroys the node. Query
/// results are also recomputed whenever the document's child lists changed since
/// they were stored.
///
/// ```
/// use bramble_dom::{Document, Rect};
/// use bramble_scheduler::{Cache, CacheConfig};
///
/// let doc = Document::new();
/// let cache = Cache::new(doc.clone(), CacheConfig::default());
/// let el = doc.create_element("div");
/// doc.append_child(doc.body(), el).unwrap();
///
/// doc.set_rect(el, Rect::new(0.0, 0.0, 10.0, 10.0));
/// assert_eq!(cache.dimensions(el).width(), 10.0);
/// doc.set_rect(el, Rect::new(0.0, 0.0, 20.0, 10.0));
/// // Still served from the cache.
/// assert_eq!(cache.dimensions(el).width(), 10.0);
/// cache.invalidate(el);
/// assert_eq!(cache.dimensions(el).width(), 20.0);
/// ```
#[derive(Clone)]
pub struct Cache {
    shared: Rc<Shared>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.shared.store.borrow();
        f.debug_struct("Cache")
            .field("config", &self.shared.config)
            .field("rects", &store.rects.len())
            .field("queries", &store.queries.len())
            .field("memo", &store.memo.len())
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Create a cache over `doc`.
    ///
    /// Installs a disposal hook for eviction and a passive window `resize`
    /// listener that refreshes the viewport snapshot.
    pub fn new(doc: Document, config: CacheConfig) -> Self {
        let shared = Rc::new(Shared {
            doc: doc.clone(),
            config,
            store: RefCell::default(),
            hooks: RefCell::new(None),
        });
        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let hook = doc.add_disposal_hook(move |node| {
            if let Some(shared) = weak.upgrade() {
                shared.store.borrow_mut().evict(node);
            }
        });
        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let resize = doc.add_event_listener(
            EventTarget::Window,
            "resize",
            ListenerOptions::default().passive(),
            move |_| {
                if let Some(shared) = weak.upgrade() {
                    let now = shared.doc.now();
                    let value = shared.doc.viewport();
                    shared.store.borrow_mut().viewport = Some(Entry { value, at: now });
                }
            },
        );
        *shared.hooks.borrow_mut() = Some((hook, resize));
        Self { shared }
    }

    /// The configured lifetimes.
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    fn now(&self) -> f64 {
        self.shared.doc.now()
    }

    /// The bounding rect of `node`, measured at most `max_age_ms` ago.
    pub fn dimensions(&self, node: NodeId) -> Rect {
        let now = self.now();
        if let Some(entry) = self.shared.store.borrow().rects.get(&node)
            && entry.fresh(now, self.shared.config.max_age_ms)
        {
            return entry.value;
        }
        let value = self.shared.doc.bounding_client_rect(node);
        self.shared
            .store
            .borrow_mut()
            .rects
            .insert(node, Entry { value, at: now });
        value
    }

    /// Force the next [`Cache::dimensions`] call for `node` to measure.
    pub fn invalidate(&self, node: NodeId) {
        self.shared.store.borrow_mut().rects.remove(&node);
    }

    fn query(&self, container: NodeId, key: String, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let now = self.now();
        let epoch = self.shared.doc.mutation_epoch();
        if let Some(entry) = self
            .shared
            .store
            .borrow()
            .queries
            .get(&container)
            .and_then(|m| m.get(&key))
            && entry.fresh(now, self.shared.config.max_age_ms)
            && entry.value.epoch == epoch
        {
            return Ok(entry.value.nodes.clone());
        }
        let list = SelectorList::parse(selector)?;
        let nodes = if key.starts_with("one:") {
            self.shared.doc.select_first(container, &list).into_iter().collect()
        } else {
            self.shared.doc.select_all(container, &list)
        };
        self.shared
            .store
            .borrow_mut()
            .queries
            .entry(container)
            .or_default()
            .insert(
                key,
                Entry {
                    value: QueryEntry {
                        nodes: nodes.clone(),
                        epoch,
                    },
                    at: now,
                },
            );
        Ok(nodes)
    }

    /// Memoized [`Document::query_selector`].
    pub fn query_one(&self, container: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let nodes = self.query(container, format!("one:{selector}"), selector)?;
        Ok(nodes.first().copied())
    }

    /// Memoized [`Document::query_selector_all`].
    pub fn query_all(&self, container: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        self.query(container, format!("all:{selector}"), selector)
    }

    /// Direct element children of `container`, optionally restricted to a `slot` attribute value.
    pub fn children(&self, container: NodeId, slot: Option<&str>) -> Result<Vec<NodeId>, DomError> {
        let selector = match slot {
            Some(name) => format!(":scope > [slot=\"{name}\"]"),
            None => ":scope > *".to_owned(),
        };
        self.query_all(container, &selector)
    }

    /// Memoize `compute()` under `(owner, key)` for `max_age_ms` (default: the configured max age).
    ///
    /// A stored value of a different type counts as a miss.
    pub fn memo<T: Clone + 'static>(
        &self,
        owner: NodeId,
        key: &str,
        max_age_ms: Option<f64>,
        compute: impl FnOnce() -> T,
    ) -> T {
        let now = self.now();
        let max_age = max_age_ms.unwrap_or(self.shared.config.max_age_ms);
        if let Some(entry) = self
            .shared
            .store
            .borrow()
            .memo
            .get(&owner)
            .and_then(|m| m.get(key))
            && entry.fresh(now, max_age)
            && let Some(value) = entry.value.downcast_ref::<T>()
        {
            return value.clone();
        }
        let value = compute();
        self.shared
            .store
            .borrow_mut()
            .memo
            .entry(owner)
            .or_default()
            .insert(
                key.to_owned(),
                Entry {
                    value: Rc::new(value.clone()) as Rc<dyn Any>,
                    at: now,
                },
            );
        value
    }

    /// The viewport size, re-read when the snapshot is older than the viewport max age.
    pub fn viewport(&self) -> Size {
        let now = self.now();
        if let Some(entry) = &self.shared.store.borrow().viewport
            && entry.fresh(now, self.shared.config.viewport_max_age_ms)
        {
            return entry.value;
        }
        let value = self.shared.doc.viewport();
        self.shared.store.borrow_mut().viewport = Some(Entry { value, at: now });
        value
    }

    /// Drop the viewport snapshot.
    pub fn clear(&self) {
        self.shared.store.borrow_mut().viewport = None;
    }

    /// Drop every entry owned by `node`.
    pub fn evict(&self, node: NodeId) {
        self.shared.store.borrow_mut().evict(node);
    }

    /// Remove the disposal hook and resize listener installed by [`Cache::new`].
    pub fn detach(&self) {
        let hooks = self.shared.hooks.borrow_mut().take();
        if let Some((hook, resize)) = hooks {
            self.shared.doc.remove_disposal_hook(hook);
            self.shared.doc.remove_event_listener(resize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    fn setup() -> (Document, Cache, NodeId) {
        let doc = Document::new();
        let cache = Cache::new(doc.clone(), CacheConfig::default());
        let el = doc.create_element("ul");
        doc.append_child(doc.body(), el).unwrap();
        (doc, cache, el)
    }

    #[test]
    fn rects_expire_after_max_age() {
        let (doc, cache, el) = setup();
        doc.set_rect(el, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(cache.dimensions(el).width(), 10.0);
        doc.set_rect(el, Rect::new(0.0, 0.0, 30.0, 10.0));
        doc.advance(96.0);
        assert_eq!(cache.dimensions(el).width(), 10.0);
        doc.advance(16.0);
        assert_eq!(cache.dimensions(el).width(), 30.0);
    }

    #[test]
    fn memo_respects_owner_key_and_age() {
        let (doc, cache, el) = setup();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            calls.get()
        };
        assert_eq!(cache.memo(el, "a", None, compute), 1);
        assert_eq!(cache.memo(el, "a", None, compute), 1);
        assert_eq!(cache.memo(el, "b", None, compute), 2);
        doc.advance(32.0);
        assert_eq!(cache.memo(el, "a", Some(20.0), compute), 3);
    }

    #[test]
    fn queries_recompute_after_mutation() {
        let (doc, cache, el) = setup();
        let first = doc.create_element("li");
        doc.append_child(el, first).unwrap();
        assert_eq!(cache.query_all(el, "li").unwrap(), vec![first]);
        let second = doc.create_element("li");
        doc.append_child(el, second).unwrap();
        assert_eq!(cache.query_all(el, "li").unwrap(), vec![first, second]);
        assert_eq!(cache.query_one(el, "li").unwrap(), Some(first));
    }

    #[test]
    fn children_filter_by_slot() {
        let (doc, cache, el) = setup();
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        doc.append_child(el, a).unwrap();
        doc.append_child(el, b).unwrap();
        doc.set_attribute(b, "slot", "footer");
        assert_eq!(cache.children(el, None).unwrap(), vec![a, b]);
        assert_eq!(cache.children(el, Some("footer")).unwrap(), vec![b]);
    }

    #[test]
    fn destroyed_nodes_are_evicted() {
        let (doc, cache, el) = setup();
        cache.dimensions(el);
        cache.memo(el, "k", None, || 1_u8);
        doc.destroy(el);
        let store = cache.shared.store.borrow();
        assert!(store.rects.is_empty());
        assert!(store.memo.is_empty());
    }

    #[test]
    fn viewport_refreshes_on_resize() {
        let (doc, cache, _) = setup();
        assert_eq!(cache.viewport(), Size::new(1024.0, 768.0));
        doc.set_viewport_size(Size::new(400.0, 300.0));
        assert_eq!(cache.viewport(), Size::new(400.0, 300.0));
        cache.detach();
        assert_eq!(doc.listener_count(EventTarget::Window), 0);
    }
}
