//! Generic concurrent router core.
//!
//! A route is an ordered sequence of [`Key`]s, one per routing dimension;
//! the router neither interprets dimensions nor fixes their count. The
//! HTTP adapter routes over four dimensions (scheme, method, host, path),
//! the DNS adapter over three (reversed qname, qtype, qclass).
//!
//! Handlers and middleware are opaque values: the core stores and returns
//! them without inspecting them. Registration returns a [`CloseHandle`]
//! that removes exactly the registered batch and garbage-collects any
//! branch it leaves trivial.

pub mod key;
pub mod label;
pub mod node;
pub mod radix;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::RouterError;

pub use key::Key;
pub use label::Label;
pub use node::{BreedFn, Leaf, MatchedLeaf, Node, RadixNode};

/// An ordered sequence of keys, one per routing dimension.
pub type Route = Vec<Key>;

/// Concurrent multi-dimensional router.
pub struct Router<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    breed: BreedFn<H, M>,
    root: Arc<dyn Node<H, M>>,
    disable_dup_route: AtomicBool,
}

impl<H, M> Router<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    /// Creates a router whose per-dimension nodes come from the given
    /// factory.
    pub fn new(breed: BreedFn<H, M>) -> Self {
        let root = breed(None);
        Self {
            breed,
            root,
            disable_dup_route: AtomicBool::new(false),
        }
    }

    /// Creates a router over stock radix nodes.
    pub fn with_radix_nodes() -> Self {
        Self::new(RadixNode::breed())
    }

    /// When set, registering a handler on a route that already has one
    /// fails with [`RouterError::ExistedRoute`].
    pub fn set_disable_dup_route(&self, disable: bool) {
        self.disable_dup_route.store(disable, Ordering::Relaxed);
    }

    /// The root node. Adapters use this for protocol-specific matching;
    /// tests use it to observe that cleanup emptied the tree.
    pub fn root(&self) -> &Arc<dyn Node<H, M>> {
        &self.root
    }

    /// Associates a route with a batch of handlers. The returned handle
    /// removes exactly this batch.
    pub fn handle(&self, route: &[Key], handlers: Vec<H>) -> Result<CloseHandle<H, M>, RouterError> {
        let forbid = self.disable_dup_route.load(Ordering::Relaxed);
        loop {
            let leaf = self.root.make(route, &self.breed);
            let batch = next_batch_id();
            if !leaf.append_handlers(batch, handlers.clone(), forbid) {
                // Intermediate leaves created by the walk must not linger.
                node::collect(&leaf);
                return Err(RouterError::ExistedRoute);
            }
            if self.attached(route, &leaf) {
                debug!(batch, route = %display_route(route), "handler batch registered");
                return Ok(CloseHandle::new(leaf, batch, BatchKind::Handlers));
            }
            // Lost a race against a concurrent collection that unlinked
            // the leaf between the walk and the append.
            leaf.remove_handler_batch(batch);
        }
    }

    /// Associates a route with a batch of middleware. The returned handle
    /// removes exactly this batch.
    pub fn wrap(&self, route: &[Key], middleware: Vec<M>) -> Result<CloseHandle<H, M>, RouterError> {
        loop {
            let leaf = self.root.make(route, &self.breed);
            let batch = next_batch_id();
            leaf.append_middleware(batch, middleware.clone());
            if self.attached(route, &leaf) {
                debug!(batch, route = %display_route(route), "middleware batch registered");
                return Ok(CloseHandle::new(leaf, batch, BatchKind::Middleware));
            }
            leaf.remove_middleware_batch(batch);
        }
    }

    /// Whether the leaf is still the one reachable under the route.
    fn attached(&self, route: &[Key], leaf: &Arc<Leaf<H, M>>) -> bool {
        self.root
            .get(route)
            .is_some_and(|found| Arc::ptr_eq(&found, leaf))
    }

    /// Matches a route across every dimension, returning leaf snapshots
    /// ordered most specific first. Adapters compose the final handler
    /// chain from this list.
    pub fn match_route(&self, route: &[Key]) -> Vec<MatchedLeaf<H, M>> {
        self.root.match_route(route)
    }

    /// Every route currently carrying at least one handler or middleware,
    /// as full key chains from the first dimension down.
    pub fn routes(&self) -> Vec<Route> {
        let mut out = Vec::new();
        for leaf in self.root.leaves() {
            if leaf.handlers().is_empty() && leaf.middleware().is_empty() {
                continue;
            }
            let mut chain = vec![leaf.key().clone()];
            let mut cur = leaf;
            while let Some(parent) = cur.up() {
                chain.push(parent.key().clone());
                cur = parent;
            }
            chain.reverse();
            out.push(chain);
        }
        out
    }
}

/// Removes the batch registered by one `handle`/`wrap` call. Idempotent:
/// only the first `close` has any effect.
pub struct CloseHandle<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    leaf: Arc<Leaf<H, M>>,
    batch: u64,
    kind: BatchKind,
    closed: AtomicBool,
}

impl<H, M> std::fmt::Debug for CloseHandle<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseHandle")
            .field("batch", &self.batch)
            .field("closed", &self.closed)
            .finish()
    }
}

#[derive(Clone, Copy)]
enum BatchKind {
    Handlers,
    Middleware,
}

impl<H, M> CloseHandle<H, M>
where
    H: Clone + Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    fn new(leaf: Arc<Leaf<H, M>>, batch: u64, kind: BatchKind) -> Self {
        Self {
            leaf,
            batch,
            kind,
            closed: AtomicBool::new(false),
        }
    }

    /// Removes the batch and collects any branch it leaves trivial.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.kind {
            BatchKind::Handlers => self.leaf.remove_handler_batch(self.batch),
            BatchKind::Middleware => self.leaf.remove_middleware_batch(self.batch),
        }
        debug!(batch = self.batch, "batch removed");
        node::collect(&self.leaf);
    }
}

static NEXT_BATCH: AtomicU64 = AtomicU64::new(1);

fn next_batch_id() -> u64 {
    NEXT_BATCH.fetch_add(1, Ordering::Relaxed)
}

fn display_route(route: &[Key]) -> String {
    route
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}
