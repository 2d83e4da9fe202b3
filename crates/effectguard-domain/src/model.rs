use effectguard_types::Location;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Dense index of a callable inside one [`CallGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallableId(pub u32);

impl CallableId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Dense index of a call edge inside one [`CallGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallableKind {
    Function,
    Closure,
    Opaque,
}

impl CallableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CallableKind::Function => "function",
            CallableKind::Closure => "closure",
            CallableKind::Opaque => "opaque",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indirection {
    #[default]
    Direct,
    AddressTaken,
    ClosureInvocation,
}

impl Indirection {
    /// Whether the call site transfers control to the callee at this point.
    ///
    /// Taking a function's address does not run it.
    pub fn invokes(self) -> bool {
        !matches!(self, Indirection::AddressTaken)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Indirection::Direct => "direct",
            Indirection::AddressTaken => "address_taken",
            Indirection::ClosureInvocation => "closure_invocation",
        }
    }
}

/// A `(namespace, value)` pair attached to a callable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub namespace: String,
    pub value: String,
}

impl Tag {
    pub fn new(namespace: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.value)
    }
}

#[derive(Clone, Debug)]
pub struct Callable {
    pub id: CallableId,
    /// Identifier assigned by the extractor (stable across runs).
    pub key: String,
    /// Human-readable name, or a synthetic one for anonymous closures.
    pub name: String,
    pub kind: CallableKind,
    /// Enclosing callable, for closures and nested functions.
    pub parent: Option<CallableId>,
    /// Explicit tags keyed by namespace. At most one per namespace.
    pub tags: BTreeMap<String, String>,
    /// Namespaces where two different explicit tags were declared.
    pub conflicting: BTreeSet<String>,
    pub location: Option<Location>,
}

impl Callable {
    pub fn explicit_tag(&self, namespace: &str) -> Option<&str> {
        if self.conflicting.contains(namespace) {
            return None;
        }
        self.tags.get(namespace).map(String::as_str)
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == CallableKind::Opaque
    }
}

#[derive(Clone, Debug)]
pub struct CallEdge {
    pub id: EdgeId,
    pub caller: CallableId,
    pub callee: CallableId,
    pub location: Option<Location>,
    pub indirection: Indirection,
    /// The call sits on a branch and may not execute on every path through the caller.
    pub conditional: bool,
}

/// Immutable call graph: callables as nodes, call sites as edges.
///
/// Edges leaving a callable are kept in body order. The graph may be cyclic.
#[derive(Clone, Debug)]
pub struct CallGraph {
    callables: Vec<Callable>,
    edges: Vec<CallEdge>,
    outgoing: Vec<Vec<EdgeId>>,
    opaque: CallableId,
    graph: DiGraph<CallableId, EdgeId>,
}

impl CallGraph {
    /// Assemble a graph from already-validated parts.
    ///
    /// Callable ids must be dense and in order; every edge endpoint must exist.
    pub(crate) fn from_parts(
        callables: Vec<Callable>,
        edges: Vec<CallEdge>,
        opaque: CallableId,
    ) -> Self {
        let mut graph = DiGraph::with_capacity(callables.len(), edges.len());
        for c in &callables {
            graph.add_node(c.id);
        }
        let mut outgoing = vec![Vec::new(); callables.len()];
        for e in &edges {
            graph.add_edge(
                NodeIndex::new(e.caller.index()),
                NodeIndex::new(e.callee.index()),
                e.id,
            );
            outgoing[e.caller.index()].push(e.id);
        }
        Self {
            callables,
            edges,
            outgoing,
            opaque,
            graph,
        }
    }

    pub fn len(&self) -> usize {
        self.callables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }

    pub fn callables(&self) -> &[Callable] {
        &self.callables
    }

    pub fn callable(&self, id: CallableId) -> &Callable {
        &self.callables[id.index()]
    }

    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> &CallEdge {
        &self.edges[id.index()]
    }

    /// Call sites inside `caller`, in body order.
    pub fn outgoing(&self, caller: CallableId) -> impl Iterator<Item = &CallEdge> + '_ {
        self.outgoing[caller.index()]
            .iter()
            .map(move |id| &self.edges[id.index()])
    }

    /// The designated sentinel for statically unresolvable call targets.
    pub fn opaque_sentinel(&self) -> CallableId {
        self.opaque
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Callable> {
        self.callables.iter().find(|c| c.name == name)
    }

    pub fn find_by_key(&self, key: &str) -> Option<&Callable> {
        self.callables.iter().find(|c| c.key == key)
    }

    /// Callables that some call site actually invokes (address-taken uses excluded).
    pub fn invoked(&self) -> BTreeSet<CallableId> {
        self.edges
            .iter()
            .filter(|e| e.indirection.invokes() && e.caller != e.callee)
            .map(|e| e.callee)
            .collect()
    }

    /// Strongly connected components with callees before callers.
    ///
    /// Members of each component are sorted by id so the order is stable. The
    /// traversal is iterative, so call depth is not bounded by the thread stack.
    pub fn callees_first(&self) -> Vec<Vec<CallableId>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                let mut ids: Vec<CallableId> = scc.into_iter().map(|n| self.graph[n]).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    /// Recursive cycles (two or more callables) that no call site outside the cycle invokes.
    pub fn closed_cycles(&self) -> Vec<Vec<CallableId>> {
        let sccs: Vec<Vec<CallableId>> = self
            .callees_first()
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .collect();
        let mut scc_of: BTreeMap<CallableId, usize> = BTreeMap::new();
        for (i, scc) in sccs.iter().enumerate() {
            for id in scc {
                scc_of.insert(*id, i);
            }
        }
        let mut entered = vec![false; sccs.len()];
        for e in self.edges.iter().filter(|e| e.indirection.invokes()) {
            if let Some(&target) = scc_of.get(&e.callee)
                && scc_of.get(&e.caller) != Some(&target)
            {
                entered[target] = true;
            }
        }
        let mut out: Vec<Vec<CallableId>> = sccs
            .into_iter()
            .zip(entered)
            .filter(|(_, entered)| !entered)
            .map(|(scc, _)| scc)
            .collect();
        out.sort();
        out
    }

    /// Groups of callables with no edges between groups, ordered by smallest member id.
    pub fn components(&self) -> Vec<Vec<CallableId>> {
        let mut uf = UnionFind::<usize>::new(self.callables.len());
        for e in &self.edges {
            uf.union(e.caller.index(), e.callee.index());
        }
        let mut groups: BTreeMap<usize, Vec<CallableId>> = BTreeMap::new();
        let mut first_member: BTreeMap<usize, usize> = BTreeMap::new();
        for c in &self.callables {
            let root = uf.find(c.id.index());
            first_member.entry(root).or_insert(c.id.index());
            groups.entry(root).or_default().push(c.id);
        }
        let mut out: Vec<(usize, Vec<CallableId>)> = groups
            .into_iter()
            .map(|(root, members)| (first_member[&root], members))
            .collect();
        out.sort_by_key(|(first, _)| *first);
        out.into_iter().map(|(_, members)| members).collect()
    }
}
