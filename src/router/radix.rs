//! Compressed radix tree keyed by label sequences.
//!
//! Edges are kept sorted with literal labels before pattern labels, then
//! by text within each group: exact matches are probed with a binary
//! search, patterns are scanned linearly, and the resulting match order
//! is deterministic (literal hits first, then patterns in text order).
//! This order is part of the router's public contract.
//!
//! Pattern-aware matching ([`Tree::match_key`]) accepts compressed edge
//! prefixes that contain glob and wildcards labels: a wildcards label in a
//! prefix may absorb any number of input tokens, so one edge can yield
//! several viable remainders, each of which is explored.

use crate::router::key::Key;
use crate::router::label::Label;

pub struct Tree<V> {
    root: TreeNode<V>,
    size: usize,
}

struct TreeNode<V> {
    /// Labels consumed by the edge leading to this node.
    prefix: Vec<Label>,
    entry: Option<LeafEntry<V>>,
    /// Child nodes, sorted by the first label of their prefix.
    edges: Vec<TreeNode<V>>,
}

struct LeafEntry<V> {
    key: Key,
    value: V,
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Tree<V> {
    pub fn new() -> Self {
        Self {
            root: TreeNode {
                prefix: Vec::new(),
                entry: None,
                edges: Vec::new(),
            },
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Inserts a value, returning the previous one stored under an equal
    /// key (keys compare by label text).
    pub fn insert(&mut self, key: Key, value: V) -> Option<V> {
        let old = Self::insert_at(&mut self.root, &key, 0, value);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    fn insert_at(n: &mut TreeNode<V>, key: &Key, depth: usize, value: V) -> Option<V> {
        let search = &key.labels()[depth..];
        if search.is_empty() {
            return match &mut n.entry {
                Some(e) => Some(std::mem::replace(&mut e.value, value)),
                None => {
                    n.entry = Some(LeafEntry {
                        key: key.clone(),
                        value,
                    });
                    None
                }
            };
        }

        let idx = match n.edge_index(&search[0]) {
            Ok(idx) => idx,
            Err(pos) => {
                n.edges.insert(
                    pos,
                    TreeNode {
                        prefix: search.to_vec(),
                        entry: Some(LeafEntry {
                            key: key.clone(),
                            value,
                        }),
                        edges: Vec::new(),
                    },
                );
                return None;
            }
        };

        let child = &mut n.edges[idx];
        let common = common_prefix_len(search, &child.prefix);
        if common == child.prefix.len() {
            return Self::insert_at(child, key, depth + common, value);
        }

        // Split the edge at the shared prefix.
        let mut detached = std::mem::replace(
            child,
            TreeNode {
                prefix: search[..common].to_vec(),
                entry: None,
                edges: Vec::new(),
            },
        );
        detached.prefix.drain(..common);
        child.edges.push(detached);

        if search.len() == common {
            child.entry = Some(LeafEntry {
                key: key.clone(),
                value,
            });
        } else {
            let pos = match child.edge_index(&search[common]) {
                Ok(_) => unreachable!("split node already contains the new edge"),
                Err(pos) => pos,
            };
            child.edges.insert(
                pos,
                TreeNode {
                    prefix: search[common..].to_vec(),
                    entry: Some(LeafEntry {
                        key: key.clone(),
                        value,
                    }),
                    edges: Vec::new(),
                },
            );
        }
        None
    }

    /// Exact lookup by key text.
    pub fn get(&self, key: &Key) -> Option<&V> {
        let mut n = &self.root;
        let mut search = key.labels();
        loop {
            if search.is_empty() {
                return n.entry.as_ref().map(|e| &e.value);
            }
            let idx = n.edge_index(&search[0]).ok()?;
            let child = &n.edges[idx];
            let common = common_prefix_len(search, &child.prefix);
            if common != child.prefix.len() {
                return None;
            }
            search = &search[common..];
            n = child;
        }
    }

    /// Removes a key, merging single-child nodes back into their parent
    /// where the compression invariant allows it. Only fully literal
    /// prefixes are merged; pattern edges stay split.
    pub fn remove(&mut self, key: &Key) -> Option<V> {
        let removed = Self::remove_at(&mut self.root, key.labels());
        if removed.is_some() {
            self.size -= 1;
        }
        removed
    }

    fn remove_at(n: &mut TreeNode<V>, search: &[Label]) -> Option<V> {
        if search.is_empty() {
            return n.entry.take().map(|e| e.value);
        }

        let idx = n.edge_index(&search[0]).ok()?;
        let common = common_prefix_len(search, &n.edges[idx].prefix);
        if common != n.edges[idx].prefix.len() {
            return None;
        }
        let value = Self::remove_at(&mut n.edges[idx], &search[common..])?;

        let child = &n.edges[idx];
        if child.entry.is_none() && child.edges.is_empty() {
            n.edges.remove(idx);
        } else {
            Self::merge_single_child(&mut n.edges[idx]);
        }
        Some(value)
    }

    fn merge_single_child(n: &mut TreeNode<V>) {
        if n.entry.is_some() || n.edges.len() != 1 {
            return;
        }
        if !n.edges[0].prefix.iter().all(Label::is_literal) {
            return;
        }
        let child = n.edges.remove(0);
        n.prefix.extend(child.prefix);
        n.entry = child.entry;
        n.edges = child.edges;
    }

    /// Pattern-aware search: returns every stored key matching the given
    /// literal key, most specific first.
    pub fn match_key(&self, key: &Key) -> Vec<(&Key, &V)> {
        let mut out = Vec::new();
        Self::match_at(&self.root, key.labels(), &mut out);
        out
    }

    fn match_at<'a>(n: &'a TreeNode<V>, input: &[Label], out: &mut Vec<(&'a Key, &'a V)>) {
        if input.is_empty() {
            if let Some(e) = &n.entry {
                out.push((&e.key, &e.value));
            }
        }

        if let Some(first) = input.first() {
            if let Some(child) = n.literal_edge(first.text()) {
                Self::descend(child, input, out);
            }
        }
        for child in n.pattern_edges() {
            Self::descend(child, input, out);
        }
    }

    fn descend<'a>(child: &'a TreeNode<V>, input: &[Label], out: &mut Vec<(&'a Key, &'a V)>) {
        let mut offsets = Vec::new();
        consume(&child.prefix, input, 0, &mut offsets);
        offsets.sort_unstable();
        offsets.dedup();
        for off in offsets {
            Self::match_at(child, &input[off..], out);
        }
    }

    /// Pre-order walk over every stored entry. The callback returns true
    /// to stop the walk.
    pub fn walk(&self, f: &mut dyn FnMut(&Key, &V) -> bool) {
        Self::walk_node(&self.root, f);
    }

    fn walk_node(n: &TreeNode<V>, f: &mut dyn FnMut(&Key, &V) -> bool) -> bool {
        if let Some(e) = &n.entry {
            if f(&e.key, &e.value) {
                return true;
            }
        }
        n.edges.iter().any(|c| Self::walk_node(c, f))
    }

    /// Walks every entry stored under the given literal prefix.
    pub fn walk_prefix(&self, prefix: &Key, f: &mut dyn FnMut(&Key, &V) -> bool) {
        let mut n = &self.root;
        let mut search = prefix.labels();
        loop {
            if search.is_empty() {
                Self::walk_node(n, f);
                return;
            }
            let Ok(idx) = n.edge_index(&search[0]) else {
                return;
            };
            let child = &n.edges[idx];
            let common = common_prefix_len(search, &child.prefix);
            if common == child.prefix.len() {
                search = &search[common..];
                n = child;
            } else if common == search.len() {
                // The whole search key sits inside this edge.
                Self::walk_node(child, f);
                return;
            } else {
                return;
            }
        }
    }

    /// Walks the entries *above* the given key: every stored key that is
    /// a literal text prefix of it, shallowest first.
    pub fn walk_path(&self, path: &Key, f: &mut dyn FnMut(&Key, &V) -> bool) {
        let mut n = &self.root;
        let mut search = path.labels();
        loop {
            if let Some(e) = &n.entry {
                if f(&e.key, &e.value) {
                    return;
                }
            }
            if search.is_empty() {
                return;
            }
            let Ok(idx) = n.edge_index(&search[0]) else {
                return;
            };
            let child = &n.edges[idx];
            let common = common_prefix_len(search, &child.prefix);
            if common != child.prefix.len() {
                return;
            }
            search = &search[common..];
            n = child;
        }
    }

    /// Returns the deepest stored key that is a literal text prefix of the
    /// given key.
    pub fn longest_prefix(&self, key: &Key) -> Option<(&Key, &V)> {
        let mut last = None;
        let mut n = &self.root;
        let mut search = key.labels();
        loop {
            if let Some(e) = &n.entry {
                last = Some((&e.key, &e.value));
            }
            if search.is_empty() {
                break;
            }
            let Ok(idx) = n.edge_index(&search[0]) else {
                break;
            };
            let child = &n.edges[idx];
            let common = common_prefix_len(search, &child.prefix);
            if common != child.prefix.len() {
                break;
            }
            search = &search[common..];
            n = child;
        }
        last
    }
}

impl<V> TreeNode<V> {
    fn edge_index(&self, label: &Label) -> Result<usize, usize> {
        self.edges.binary_search_by(|e| e.prefix[0].edge_order(label))
    }

    fn literal_edge(&self, text: &str) -> Option<&TreeNode<V>> {
        let literals = &self.edges[..self.literal_count()];
        let idx = literals
            .binary_search_by(|e| e.prefix[0].text().cmp(text))
            .ok()?;
        Some(&literals[idx])
    }

    fn pattern_edges(&self) -> &[TreeNode<V>] {
        &self.edges[self.literal_count()..]
    }

    fn literal_count(&self) -> usize {
        self.edges.partition_point(|e| e.prefix[0].is_literal())
    }
}

fn common_prefix_len(a: &[Label], b: &[Label]) -> usize {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x.text() == y.text())
        .count()
}

/// Appends every input offset reachable by consuming the whole prefix,
/// starting at `at`. Wildcards labels may absorb any number of tokens.
fn consume(prefix: &[Label], input: &[Label], at: usize, out: &mut Vec<usize>) {
    match prefix.first() {
        None => out.push(at),
        Some(l) if l.is_wildcards() => {
            for k in at..=input.len() {
                consume(&prefix[1..], input, k, out);
            }
        }
        Some(l) => {
            if at < input.len() && l.matches(input[at].text()) {
                consume(&prefix[1..], input, at + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Key {
        Key::literal(s, '/')
    }

    fn pat(s: &str) -> Key {
        Key::pattern(s, '/').unwrap()
    }

    fn matched(tree: &Tree<usize>, input: &str) -> Vec<String> {
        tree.match_key(&lit(input))
            .into_iter()
            .map(|(k, _)| k.join("/"))
            .collect()
    }

    #[test]
    fn insert_get_remove() {
        let mut tree = Tree::new();
        let keys = ["", "foo", "foo/bar", "foo/bar/baz", "foo/zip", "zap"];
        for (i, k) in keys.iter().enumerate() {
            assert!(tree.insert(lit(k), i).is_none());
        }
        assert_eq!(tree.len(), keys.len());

        for (i, k) in keys.iter().enumerate() {
            assert_eq!(tree.get(&lit(k)), Some(&i));
        }
        assert_eq!(tree.get(&lit("foo/baz")), None);
        assert_eq!(tree.get(&lit("fo")), None);

        for (i, k) in keys.iter().enumerate() {
            assert_eq!(tree.remove(&lit(k)), Some(i));
            assert_eq!(tree.remove(&lit(k)), None);
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut tree = Tree::new();
        assert_eq!(tree.insert(lit("a/b"), 1), None);
        assert_eq!(tree.insert(lit("a/b"), 2), Some(1));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&lit("a/b")), Some(&2));
    }

    #[test]
    fn match_prefers_literals_then_patterns_in_text_order() {
        let mut tree = Tree::new();
        for (i, k) in ["v1/x", "v1/*", "v[2-3]", "v4/**/x", "v4/*/**/x"]
            .iter()
            .enumerate()
        {
            tree.insert(pat(k), i);
        }

        assert_eq!(matched(&tree, "v1/x"), ["v1/x", "v1/*"]);
        assert_eq!(matched(&tree, "v1/y"), ["v1/*"]);
        assert_eq!(matched(&tree, "v2"), ["v[2-3]"]);
        assert_eq!(matched(&tree, "v4/x"), ["v4/**/x"]);
        assert_eq!(matched(&tree, "v4/1/x"), ["v4/*/**/x", "v4/**/x"]);
        assert_eq!(matched(&tree, "v4/1/2/x"), ["v4/*/**/x", "v4/**/x"]);
        assert!(matched(&tree, "hello").is_empty());
    }

    #[test]
    fn wildcards_edge_matches_terminally() {
        let mut tree = Tree::new();
        tree.insert(pat("**"), 0);
        tree.insert(pat("a/**"), 1);

        assert_eq!(matched(&tree, "anything"), ["**"]);
        assert_eq!(matched(&tree, "x/y/z"), ["**"]);
        assert_eq!(matched(&tree, "a"), ["a/**", "**"]);
        assert_eq!(matched(&tree, "a/b/c"), ["a/**", "**"]);
    }

    #[test]
    fn remove_merges_literal_chains_only() {
        let mut tree = Tree::new();
        tree.insert(lit("a/b/c"), 0);
        tree.insert(lit("a/b/d"), 1);
        tree.insert(lit("a/x"), 2);
        tree.remove(&lit("a/b/c"));
        assert_eq!(tree.get(&lit("a/b/d")), Some(&1));
        assert_eq!(tree.get(&lit("a/x")), Some(&2));

        // Pattern edges survive a sibling delete unmerged and keep matching.
        let mut tree = Tree::new();
        tree.insert(pat("a/*/c"), 0);
        tree.insert(pat("a/b"), 1);
        tree.remove(&pat("a/b"));
        assert_eq!(matched(&tree, "a/q/c"), ["a/*/c"]);
    }

    #[test]
    fn walk_yields_every_entry() {
        let mut tree = Tree::new();
        let keys = ["foo", "foo/bar", "zap"];
        for k in keys {
            tree.insert(lit(k), 0);
        }
        let mut seen = Vec::new();
        tree.walk(&mut |k, _| {
            seen.push(k.join("/"));
            false
        });
        seen.sort();
        assert_eq!(seen, ["foo", "foo/bar", "zap"]);
    }

    #[test]
    fn walk_prefix_scopes_to_subtree() {
        let mut tree = Tree::new();
        for k in ["foo/bar/baz", "foo/baz/bar", "foo/zip/zap", "zipzap"] {
            tree.insert(lit(k), 0);
        }

        let collect = |prefix: &str| {
            let mut seen = Vec::new();
            tree.walk_prefix(&lit(prefix), &mut |k, _| {
                seen.push(k.join("/"));
                false
            });
            seen.sort();
            seen
        };

        assert_eq!(
            collect("foo"),
            ["foo/bar/baz", "foo/baz/bar", "foo/zip/zap"]
        );
        assert_eq!(collect("foo/bar"), ["foo/bar/baz"]);
        assert_eq!(collect("foo/bar/baz"), ["foo/bar/baz"]);
        assert!(collect("foo/bar/bazoo").is_empty());
        assert_eq!(collect("zipzap"), ["zipzap"]);
    }

    #[test]
    fn walk_path_visits_ancestors() {
        let mut tree = Tree::new();
        for k in ["foo", "foo/bar", "foo/bar/baz", "zipzap"] {
            tree.insert(lit(k), 0);
        }

        let collect = |path: &str| {
            let mut seen = Vec::new();
            tree.walk_path(&lit(path), &mut |k, _| {
                seen.push(k.join("/"));
                false
            });
            seen
        };

        assert_eq!(collect("foo"), ["foo"]);
        assert_eq!(collect("foo/bar"), ["foo", "foo/bar"]);
        assert_eq!(collect("foo/bar/baz"), ["foo", "foo/bar", "foo/bar/baz"]);
        assert_eq!(collect("foo/bar/other"), ["foo", "foo/bar"]);
        assert!(collect("f").is_empty());
    }

    #[test]
    fn longest_prefix_returns_deepest_ancestor() {
        let mut tree = Tree::new();
        for k in ["foo", "foo/bar", "foo/bar/baz"] {
            tree.insert(lit(k), 0);
        }
        let deepest = |path: &str| tree.longest_prefix(&lit(path)).map(|(k, _)| k.join("/"));

        assert_eq!(deepest("foo/bar/baz/zip"), Some("foo/bar/baz".into()));
        assert_eq!(deepest("foo/bar/other"), Some("foo/bar".into()));
        assert_eq!(deepest("foo"), Some("foo".into()));
        assert_eq!(deepest("other"), None);
    }
}
