use std::collections::HashSet;
use std::hash::BuildHasherDefault;

// used to keep the one-to-one mapping between node names and their interned ids
use bimap::BiMap;
// node ids are plain integers, so bitsets can track visited nodes during traversal
use roaring::RoaringTreemap;

use seahash::SeaHasher;

// ------------- Node -------------
// A node is an opaque identity (a simple `u64`) standing in for a subject,
// predicate or object string. Interning keeps the triple list compact and
// makes membership checks cheap during traversal.
pub type Node = u64;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// An RDF-style triple of node ids, in (subject, predicate, object) order.
type TripleId = (Node, Node, Node);

// ------------- Graph -------------
/// An append-only, deduplicated collection of `(subject, predicate, object)`
/// triples supporting pattern matching and multi-path depth-first traversal.
///
/// Insertion order is preserved and observable: [`Graph::matches`] yields
/// triples in the order they were first appended, and [`Graph::path`] breaks
/// ties between equally valid paths by edge insertion order.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BiMap<String, Node>,
    next_node: Node,
    triples: Vec<TripleId>,
    kept: HashSet<TripleId, OtherHasher>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: BiMap::new(),
            next_node: 0,
            triples: Vec::new(),
            kept: HashSet::default(),
        }
    }

    /// Build a graph from a sequence of string triples.
    pub fn from_triples<S, I>(triples: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, S, S)>,
    {
        let mut graph = Self::new();
        for (s, p, o) in triples {
            graph.append(s.as_ref(), p.as_ref(), o.as_ref());
        }
        graph
    }

    fn intern(&mut self, name: &str) -> Node {
        if let Some(node) = self.nodes.get_by_left(name) {
            return *node;
        }
        let node = self.next_node;
        self.next_node += 1;
        self.nodes.insert(name.to_owned(), node);
        node
    }

    fn node_id(&self, name: &str) -> Option<Node> {
        self.nodes.get_by_left(name).copied()
    }

    fn node_name(&self, node: Node) -> &str {
        self.nodes
            .get_by_right(&node)
            .expect("node id is interned")
            .as_str()
    }

    /// Add a triple unless an equal one is already kept.
    /// Returns whether the triple was previously kept.
    pub fn append(&mut self, s: &str, p: &str, o: &str) -> bool {
        let triple = (self.intern(s), self.intern(p), self.intern(o));
        let previously_kept = !self.kept.insert(triple);
        if !previously_kept {
            self.triples.push(triple);
        }
        previously_kept
    }

    /// Append every triple of `other` into this graph.
    pub fn extend_from(&mut self, other: &Graph) {
        for (s, p, o) in other.triples() {
            self.append(s, p, o);
        }
    }

    pub fn clear(&mut self) {
        self.nodes = BiMap::new();
        self.next_node = 0;
        self.triples.clear();
        self.kept.clear();
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Iterate over all kept triples in insertion order.
    pub fn triples(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.triples
            .iter()
            .map(|(s, p, o)| (self.node_name(*s), self.node_name(*p), self.node_name(*o)))
    }

    /// Yield all triples matching the given fields exactly; `None` fields act
    /// as wildcards. The sequence is lazy, in insertion order, and restartable
    /// (each call produces a fresh iterator).
    pub fn matches<'a>(
        &'a self,
        s: Option<&str>,
        p: Option<&str>,
        o: Option<&str>,
    ) -> impl Iterator<Item = (&'a str, &'a str, &'a str)> + 'a {
        // A named node that was never interned cannot match any triple.
        let s = s.map(|name| self.node_id(name));
        let p = p.map(|name| self.node_id(name));
        let o = o.map(|name| self.node_id(name));
        let impossible = matches!(s, Some(None)) || matches!(p, Some(None)) || matches!(o, Some(None));
        self.triples
            .iter()
            .filter(move |(ts, tp, to)| {
                !impossible
                    && s.map_or(true, |id| id == Some(*ts))
                    && p.map_or(true, |id| id == Some(*tp))
                    && o.map_or(true, |id| id == Some(*to))
            })
            .map(|(s, p, o)| (self.node_name(*s), self.node_name(*p), self.node_name(*o)))
    }

    /// Return all simple traversal paths between `origin` and `destination`.
    ///
    /// The search is an exhaustive depth-first walk that follows both outgoing
    /// and incoming edges (reachability is undirected), keeping a path-local
    /// visited set so a node never repeats within one path but may appear on
    /// independent paths. `predicate_filter` restricts which edges may be
    /// walked; `node_avoidance_filter` excludes nodes from consideration.
    ///
    /// Worst case is exponential in the number of redundant edges; the graphs
    /// handled here stay in the tens to low hundreds of triples.
    pub fn path(
        &self,
        origin: &str,
        destination: &str,
        predicate_filter: Option<&[&str]>,
        node_avoidance_filter: Option<&[&str]>,
    ) -> Vec<Vec<String>> {
        let (Some(origin), Some(destination)) = (self.node_id(origin), self.node_id(destination))
        else {
            return Vec::new();
        };
        // Filter names that were never interned cannot pass (or block) anything.
        let predicates: Option<RoaringTreemap> = predicate_filter.map(|names| {
            names.iter().filter_map(|name| self.node_id(name)).collect()
        });
        let avoided: RoaringTreemap = node_avoidance_filter
            .map(|names| names.iter().filter_map(|name| self.node_id(name)).collect())
            .unwrap_or_default();

        let mut found: Vec<Vec<Node>> = Vec::new();
        self.recur_find(
            origin,
            destination,
            predicates.as_ref(),
            &avoided,
            Vec::new(),
            RoaringTreemap::new(),
            &mut found,
        );
        found
            .into_iter()
            .map(|path| path.into_iter().map(|node| self.node_name(node).to_owned()).collect())
            .collect()
    }

    /// Recursively find paths from `origin` to `destination`. The visited set
    /// is copied on each branch so sibling branches do not see each other's
    /// progress. An empty visited set means we are at the search root, where
    /// `origin == destination` does not yet count as an arrival.
    #[allow(clippy::too_many_arguments)]
    fn recur_find(
        &self,
        origin: Node,
        destination: Node,
        predicates: Option<&RoaringTreemap>,
        avoided: &RoaringTreemap,
        mut visited_order: Vec<Node>,
        mut visited: RoaringTreemap,
        found: &mut Vec<Vec<Node>>,
    ) {
        if !visited_order.is_empty() && origin == destination {
            visited_order.push(origin);
            found.push(visited_order);
            return;
        }
        visited.insert(origin);
        visited_order.push(origin);

        let passes = |p: Node| predicates.map_or(true, |filter| filter.contains(p));
        let mut to_visit: Vec<Node> = Vec::new();
        for (s, p, o) in &self.triples {
            if *s == origin && passes(*p) && !avoided.contains(*o) && !visited.contains(*o) {
                to_visit.push(*o);
            }
        }
        for (s, p, o) in &self.triples {
            if *o == origin && passes(*p) && !avoided.contains(*s) && !visited.contains(*s) {
                to_visit.push(*s);
            }
        }

        for next in to_visit {
            self.recur_find(
                next,
                destination,
                predicates,
                avoided,
                visited_order.clone(),
                visited.clone(),
                found,
            );
        }
    }

    /// Find the first node reachable from every node in `origins` by following
    /// `predicate` edges transitively (each node counts as its own ancestor).
    ///
    /// Completing the search without a match is not an error: the result is
    /// simply `None`.
    pub fn common_parent(&self, origins: &[&str], predicate: &str) -> Option<String> {
        if origins.is_empty() {
            return None;
        }
        let predicate = self.node_id(predicate)?;
        let mut ancestor_sets: Vec<RoaringTreemap> = Vec::with_capacity(origins.len());
        let mut first_order: Vec<Node> = Vec::new();
        for (index, origin) in origins.iter().enumerate() {
            let origin = self.node_id(origin)?;
            let (set, order) = self.ancestors(origin, predicate);
            if index == 0 {
                first_order = order;
            }
            ancestor_sets.push(set);
        }
        first_order
            .into_iter()
            .find(|candidate| ancestor_sets.iter().all(|set| set.contains(*candidate)))
            .map(|node| self.node_name(node).to_owned())
    }

    /// Breadth-first transitive closure over `predicate` edges, including the
    /// starting node itself.
    fn ancestors(&self, origin: Node, predicate: Node) -> (RoaringTreemap, Vec<Node>) {
        let mut seen = RoaringTreemap::new();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        seen.insert(origin);
        order.push(origin);
        queue.push_back(origin);
        while let Some(current) = queue.pop_front() {
            for (s, p, o) in &self.triples {
                if *s == current && *p == predicate && !seen.contains(*o) {
                    seen.insert(*o);
                    order.push(*o);
                    queue.push_back(*o);
                }
            }
        }
        (seen, order)
    }
}
