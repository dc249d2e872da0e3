//! Concurrent node layer: the bridge between the radix tree and the
//! multi-dimensional router.
//!
//! A [`RadixNode`] guards one dimension's radix tree with a reader-writer
//! lock. Tree values are [`Leaf`] payloads holding handler and middleware
//! batches plus a lazily created child node for the next dimension, which
//! is how the N-level tree nests. Leaves keep a weak back-pointer to their
//! containing node so cleanup can walk upward without creating cycles:
//! ownership always flows downward (tree → leaf → down node).
//!
//! Lock discipline: registration and matching release a node's lock
//! before touching leaf state or descending into a child node, and no
//! code path acquires a node lock while holding a leaf lock. Deletion
//! re-verifies leaf triviality and pointer identity under the node's
//! write lock so a concurrently reused leaf is never unlinked.

use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use crate::router::key::Key;
use crate::router::radix::Tree;

/// One dimension's routing node. The stock implementation is
/// [`RadixNode`]; adapters may decorate it to specialize matching (the
/// DNS adapter's zone node does).
pub trait Node<H, M>: Send + Sync
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    /// Creates every node and leaf needed along the route and returns the
    /// terminal leaf. The route must be non-empty.
    fn make(&self, route: &[Key], breed: &BreedFn<H, M>) -> Arc<Leaf<H, M>>;

    /// Exact lookup of the terminal leaf for a route.
    fn get(&self, route: &[Key]) -> Option<Arc<Leaf<H, M>>>;

    /// Unlinks a trivial leaf from this node's tree. A leaf that turned
    /// non-trivial again, or that is no longer the stored leaf for its
    /// key, is left alone.
    fn delete(&self, leaf: &Arc<Leaf<H, M>>);

    /// All terminal leaves reachable through this node, descending into
    /// child dimensions.
    fn leaves(&self) -> Vec<Arc<Leaf<H, M>>>;

    /// The parent leaf whose child dimension this node represents.
    fn up(&self) -> Option<Arc<Leaf<H, M>>>;

    fn is_empty(&self) -> bool;

    /// Matches a route across this and all deeper dimensions, returning
    /// snapshots ordered most specific first.
    fn match_route(&self, route: &[Key]) -> Vec<MatchedLeaf<H, M>>;
}

/// Factory creating the node for a new dimension below the given leaf
/// (`None` for the root).
pub type BreedFn<H, M> =
    Arc<dyn Fn(Option<Arc<Leaf<H, M>>>) -> Arc<dyn Node<H, M>> + Send + Sync>;

/// A matched leaf snapshot: the handler and middleware vectors are cloned
/// under the leaf lock, so the result stays valid while concurrent
/// deletions proceed.
#[derive(Clone)]
pub struct MatchedLeaf<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    pub leaf: Arc<Leaf<H, M>>,
    pub handlers: Vec<H>,
    pub middleware: Vec<M>,
}

/// The payload hanging off a tree edge: registration batches plus the
/// optional child node for the next dimension.
pub struct Leaf<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    key: Key,
    node: Weak<dyn Node<H, M>>,
    down: OnceLock<Arc<dyn Node<H, M>>>,
    state: Mutex<LeafState<H, M>>,
}

struct LeafState<H, M> {
    handlers: Vec<Batch<H>>,
    middleware: Vec<Batch<M>>,
}

/// One `handle`/`use` call's worth of values; removal is by batch
/// identity, not index.
struct Batch<T> {
    id: u64,
    items: Vec<T>,
}

impl<H, M> Leaf<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    fn embed(key: Key, node: Weak<dyn Node<H, M>>) -> Arc<Self> {
        Arc::new(Self {
            key,
            node,
            down: OnceLock::new(),
            state: Mutex::new(LeafState {
                handlers: Vec::new(),
                middleware: Vec::new(),
            }),
        })
    }

    /// The key this leaf was inserted under within its dimension.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The node containing this leaf.
    pub fn node(&self) -> Option<Arc<dyn Node<H, M>>> {
        self.node.upgrade()
    }

    /// The parent leaf one dimension up.
    pub fn up(&self) -> Option<Arc<Leaf<H, M>>> {
        self.node()?.up()
    }

    /// The child node for the next dimension, if any leaf below it was
    /// ever registered.
    pub fn down(&self) -> Option<&Arc<dyn Node<H, M>>> {
        self.down.get()
    }

    /// Returns the child node, creating it through the breed factory at
    /// most once per leaf.
    pub(crate) fn down_or_breed(self: &Arc<Self>, breed: &BreedFn<H, M>) -> Arc<dyn Node<H, M>> {
        self.down.get_or_init(|| breed(Some(self.clone()))).clone()
    }

    /// Flattened handler snapshot in batch insertion order.
    pub fn handlers(&self) -> Vec<H> {
        let state = self.state.lock().unwrap();
        state
            .handlers
            .iter()
            .flat_map(|b| b.items.iter().cloned())
            .collect()
    }

    /// Flattened middleware snapshot in batch insertion order.
    pub fn middleware(&self) -> Vec<M> {
        let state = self.state.lock().unwrap();
        state
            .middleware
            .iter()
            .flat_map(|b| b.items.iter().cloned())
            .collect()
    }

    /// Appends a handler batch. With `forbid_existing` set the append is
    /// refused (returning false) when any handler is already present; the
    /// check and the append happen under one lock acquisition.
    pub(crate) fn append_handlers(&self, id: u64, items: Vec<H>, forbid_existing: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        if forbid_existing && state.handlers.iter().any(|b| !b.items.is_empty()) {
            return false;
        }
        state.handlers.push(Batch { id, items });
        true
    }

    pub(crate) fn append_middleware(&self, id: u64, items: Vec<M>) {
        self.state
            .lock()
            .unwrap()
            .middleware
            .push(Batch { id, items });
    }

    pub(crate) fn remove_handler_batch(&self, id: u64) {
        self.state.lock().unwrap().handlers.retain(|b| b.id != id);
    }

    pub(crate) fn remove_middleware_batch(&self, id: u64) {
        self.state.lock().unwrap().middleware.retain(|b| b.id != id);
    }

    /// A leaf is trivial when it carries no batches and its child
    /// dimension (if created) holds nothing.
    pub fn is_trivial(&self) -> bool {
        {
            let state = self.state.lock().unwrap();
            if !state.handlers.is_empty() || !state.middleware.is_empty() {
                return false;
            }
        }
        self.down.get().is_none_or(|down| down.is_empty())
    }
}

/// The stock [`Node`]: a radix tree behind a reader-writer lock with a
/// weak back-pointer to the parent leaf.
pub struct RadixNode<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    tree: RwLock<Tree<Arc<Leaf<H, M>>>>,
    up: Weak<Leaf<H, M>>,
    weak_self: Weak<RadixNode<H, M>>,
}

impl<H, M> RadixNode<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    pub fn create(up: Option<Arc<Leaf<H, M>>>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            tree: RwLock::new(Tree::new()),
            up: up.map_or_else(Weak::new, |leaf| Arc::downgrade(&leaf)),
            weak_self: weak_self.clone(),
        })
    }

    /// A breed factory producing stock radix nodes.
    pub fn breed() -> BreedFn<H, M> {
        Arc::new(|up| -> Arc<dyn Node<H, M>> { RadixNode::create(up) })
    }

    /// Cloned leaves matching a single dimension's key, in tree match
    /// order, including leaves with no content of their own.
    pub fn match_leaves(&self, key: &Key) -> Vec<Arc<Leaf<H, M>>> {
        let tree = self.tree.read().unwrap();
        tree.match_key(key)
            .into_iter()
            .map(|(_, leaf)| leaf.clone())
            .collect()
    }

    /// Leaves stored at literal prefixes of the given key, shallowest
    /// first.
    pub fn path_leaves(&self, key: &Key) -> Vec<Arc<Leaf<H, M>>> {
        let tree = self.tree.read().unwrap();
        let mut out = Vec::new();
        tree.walk_path(key, &mut |_, leaf| {
            out.push(leaf.clone());
            false
        });
        out
    }
}

impl<H, M> Node<H, M> for RadixNode<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    fn make(&self, route: &[Key], breed: &BreedFn<H, M>) -> Arc<Leaf<H, M>> {
        let key = &route[0];
        let leaf = {
            let mut tree = self.tree.write().unwrap();
            match tree.get(key) {
                Some(leaf) => leaf.clone(),
                None => {
                    let node: Weak<dyn Node<H, M>> = self.weak_self.clone();
                    let leaf = Leaf::embed(key.clone(), node);
                    tree.insert(key.clone(), leaf.clone());
                    leaf
                }
            }
        };

        if route.len() == 1 {
            return leaf;
        }
        let down = leaf.down_or_breed(breed);
        down.make(&route[1..], breed)
    }

    fn get(&self, route: &[Key]) -> Option<Arc<Leaf<H, M>>> {
        let leaf = self.tree.read().unwrap().get(&route[0]).cloned()?;
        if route.len() == 1 {
            return Some(leaf);
        }
        let down = leaf.down()?.clone();
        down.get(&route[1..])
    }

    fn delete(&self, leaf: &Arc<Leaf<H, M>>) {
        let mut tree = self.tree.write().unwrap();
        let Some(existing) = tree.get(leaf.key()) else {
            return;
        };
        if !Arc::ptr_eq(existing, leaf) {
            return;
        }
        // Re-check under the write lock: a concurrent registration may
        // have appended a batch since the caller decided to collect.
        if !leaf.is_trivial() {
            return;
        }
        tree.remove(leaf.key());
    }

    fn leaves(&self) -> Vec<Arc<Leaf<H, M>>> {
        let mine = {
            let tree = self.tree.read().unwrap();
            let mut out = Vec::new();
            tree.walk(&mut |_, leaf: &Arc<Leaf<H, M>>| {
                out.push(leaf.clone());
                false
            });
            out
        };

        let mut out = Vec::new();
        for leaf in mine {
            match leaf.down() {
                Some(down) if !down.is_empty() => out.extend(down.leaves()),
                _ => out.push(leaf),
            }
        }
        out
    }

    fn up(&self) -> Option<Arc<Leaf<H, M>>> {
        self.up.upgrade()
    }

    fn is_empty(&self) -> bool {
        self.tree.read().unwrap().is_empty()
    }

    fn match_route(&self, route: &[Key]) -> Vec<MatchedLeaf<H, M>> {
        if route.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        for leaf in self.match_leaves(&route[0]) {
            if route.len() > 1 {
                let Some(down) = leaf.down().cloned() else {
                    continue;
                };
                if down.is_empty() {
                    continue;
                }
                let outer = leaf.middleware();
                for mut sub in down.match_route(&route[1..]) {
                    // Middleware at outer dimensions wraps everything
                    // registered deeper down.
                    if !outer.is_empty() {
                        sub.middleware.splice(0..0, outer.iter().cloned());
                    }
                    out.push(sub);
                }
            } else {
                let handlers = leaf.handlers();
                let middleware = leaf.middleware();
                if handlers.is_empty() && middleware.is_empty() {
                    continue;
                }
                out.push(MatchedLeaf {
                    leaf,
                    handlers,
                    middleware,
                });
            }
        }
        out
    }
}

/// Collects a trivial leaf and every ancestor that becomes trivial in
/// turn, stopping as soon as a node keeps other content. Safe to race
/// with concurrent registration: `delete` re-verifies under the node
/// lock.
pub(crate) fn collect<H, M>(leaf: &Arc<Leaf<H, M>>)
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    let mut cur = leaf.clone();
    loop {
        if !cur.is_trivial() {
            break;
        }
        let Some(node) = cur.node() else {
            break;
        };
        node.delete(&cur);
        if !node.is_empty() {
            break;
        }
        let Some(parent) = node.up() else {
            break;
        };
        cur = parent;
    }
}
