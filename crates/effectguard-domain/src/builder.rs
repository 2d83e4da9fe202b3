//! Call Graph Builder: extractor output into an immutable [`CallGraph`].

use crate::annotation::AnnotationResolver;
use crate::extract::{CalleeRef, Extractor};
use crate::model::{CallEdge, CallGraph, Callable, CallableId, CallableKind, EdgeId};
use crate::report::Diagnostic;
use effectguard_types::{Severity, ids};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info};

/// Name and key of the shared sentinel for statically unresolvable targets.
pub const OPAQUE_SENTINEL: &str = "<opaque>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("extractor reported {count} parse error(s); first: {first}")]
    ExtractorFailed { count: usize, first: String },
    #[error("callable id '{0}' is declared more than once")]
    DuplicateCallable(String),
    #[error("callable '{callable}' names unknown parent '{parent}'")]
    UnknownParent { callable: String, parent: String },
    #[error("callable '{0}' is nested inside itself")]
    ParentCycle(String),
    #[error("call edge references unknown caller '{0}'")]
    UnknownCaller(String),
}

#[derive(Debug)]
pub struct BuiltGraph {
    pub graph: CallGraph,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn build_graph(
    extractor: &dyn Extractor,
    resolver: &AnnotationResolver<'_>,
) -> Result<BuiltGraph, BuildError> {
    if let Some(first) = extractor.parse_errors().first() {
        return Err(BuildError::ExtractorFailed {
            count: extractor.parse_errors().len(),
            first: first.clone(),
        });
    }

    let extracted = extractor.callables();
    let mut diagnostics = Vec::new();

    let mut by_key: HashMap<&str, CallableId> = HashMap::with_capacity(extracted.len());
    for (i, c) in extracted.iter().enumerate() {
        if by_key.insert(c.id.as_str(), CallableId(i as u32)).is_some() {
            return Err(BuildError::DuplicateCallable(c.id.clone()));
        }
    }

    let mut callables: Vec<Callable> = Vec::with_capacity(extracted.len() + 1);
    let mut anonymous = 0usize;
    for (i, c) in extracted.iter().enumerate() {
        let parent = match &c.parent {
            Some(p) => Some(*by_key.get(p.as_str()).ok_or_else(|| {
                BuildError::UnknownParent {
                    callable: c.id.clone(),
                    parent: p.clone(),
                }
            })?),
            None => None,
        };
        let name = match (&c.name, c.kind) {
            (Some(n), _) => n.clone(),
            (None, CallableKind::Closure) => {
                anonymous += 1;
                format!("<closure#{anonymous}>")
            }
            (None, _) => c.id.clone(),
        };
        let resolved =
            resolver.resolve_callable(&name, &c.annotations, c.location.as_ref(), &mut diagnostics);
        callables.push(Callable {
            id: CallableId(i as u32),
            key: c.id.clone(),
            name,
            kind: c.kind,
            parent,
            tags: resolved.tags,
            conflicting: resolved.conflicting,
            location: c.location.clone(),
        });
    }
    check_parent_chains(&callables)?;

    let scopes = Scopes::new(&callables);
    let sentinel = CallableId(callables.len() as u32);
    callables.push(opaque_callable(sentinel, OPAQUE_SENTINEL, OPAQUE_SENTINEL));

    let mut unresolved: BTreeMap<String, CallableId> = BTreeMap::new();
    let mut edges: Vec<CallEdge> = Vec::with_capacity(extractor.call_edges().len());
    for e in extractor.call_edges() {
        let caller = *by_key
            .get(e.caller.as_str())
            .ok_or_else(|| BuildError::UnknownCaller(e.caller.clone()))?;

        let target = match &e.callee {
            CalleeRef::Id(key) => by_key.get(key.as_str()).copied().ok_or(key),
            CalleeRef::Symbol(name) => scopes.resolve(&callables, caller, name).ok_or(name),
            CalleeRef::Opaque => Ok(sentinel),
        };
        let callee = match target {
            Ok(id) => id,
            Err(name) => {
                let id = match unresolved.get(name) {
                    Some(id) => *id,
                    None => {
                        let id = CallableId(callables.len() as u32);
                        callables.push(opaque_callable(id, &format!("<unresolved:{name}>"), name));
                        unresolved.insert(name.clone(), id);
                        id
                    }
                };
                let caller_name = &callables[caller.index()].name;
                debug!(caller = %caller_name, callee = %name, "unresolved call target");
                diagnostics.push(Diagnostic {
                    severity: Severity::Info,
                    check_id: ids::CHECK_CALLS.to_string(),
                    code: ids::CODE_UNRESOLVED_CALL,
                    message: format!(
                        "call from '{caller_name}' to '{name}' could not be resolved; treated as opaque"
                    ),
                    location: e
                        .location
                        .clone()
                        .or_else(|| callables[caller.index()].location.clone()),
                    subject: caller_name.clone(),
                    namespace: None,
                    data: json!({ "callee": name }),
                });
                id
            }
        };

        edges.push(CallEdge {
            id: EdgeId(edges.len() as u32),
            caller,
            callee,
            location: e.location.clone(),
            indirection: e.indirection,
            conditional: e.conditional,
        });
    }

    for decl in extractor.declarations() {
        resolver.resolve_declaration(decl, &mut diagnostics);
    }

    info!(
        callables = callables.len(),
        edges = edges.len(),
        unresolved = unresolved.len(),
        "call graph built"
    );
    Ok(BuiltGraph {
        graph: CallGraph::from_parts(callables, edges, sentinel),
        diagnostics,
    })
}

fn opaque_callable(id: CallableId, key: &str, name: &str) -> Callable {
    Callable {
        id,
        key: key.to_string(),
        name: name.to_string(),
        kind: CallableKind::Opaque,
        parent: None,
        tags: BTreeMap::new(),
        conflicting: Default::default(),
        location: None,
    }
}

fn check_parent_chains(callables: &[Callable]) -> Result<(), BuildError> {
    for c in callables {
        let mut steps = 0usize;
        let mut cur = c.parent;
        while let Some(p) = cur {
            steps += 1;
            if p == c.id || steps > callables.len() {
                return Err(BuildError::ParentCycle(c.key.clone()));
            }
            cur = callables[p.index()].parent;
        }
    }
    Ok(())
}

/// Named callables grouped by name, in declaration order.
struct Scopes {
    by_name: HashMap<String, Vec<CallableId>>,
}

impl Scopes {
    fn new(callables: &[Callable]) -> Self {
        let mut by_name: HashMap<String, Vec<CallableId>> = HashMap::new();
        for c in callables {
            by_name.entry(c.name.clone()).or_default().push(c.id);
        }
        Self { by_name }
    }

    /// Resolve `name` as seen from inside `caller`.
    ///
    /// Searches the callables declared directly in `caller`, then in each enclosing
    /// callable, then at top level. The first declaration in a scope wins.
    fn resolve(&self, callables: &[Callable], caller: CallableId, name: &str) -> Option<CallableId> {
        let candidates = self.by_name.get(name)?;
        let mut scope = Some(caller);
        loop {
            let found = candidates
                .iter()
                .copied()
                .find(|id| callables[id.index()].parent == scope);
            if found.is_some() {
                return found;
            }
            match scope {
                Some(s) => scope = callables[s.index()].parent,
                None => return None,
            }
        }
    }
}
