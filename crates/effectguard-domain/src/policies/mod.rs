//! Pluggable per-namespace policies.
//!
//! Each registered namespace owns one [`Policy`] object. The propagator calls
//! `combine` while inferring tags; the engine calls `verify`, which by default
//! runs `check` over every invoking call edge.

mod color;
mod locking;

pub use color::ColorPolicy;
pub use locking::{LockState, LockingPolicy, Transition};

use crate::effect::{EffectTable, Effective};
use crate::model::{CallEdge, CallGraph};
use crate::policy::{EffectiveConfig, PolicyKind};
use crate::report::Violation;
use effectguard_types::ids;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagValidity {
    Valid,
    Unknown,
    /// In the vocabulary, but not allowed on callables.
    Reserved,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { code: &'static str, rule: String },
}

/// `combine` found no single consistent tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ambiguity {
    pub reason: String,
}

impl Ambiguity {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// One resolved callee, as seen by `combine`.
#[derive(Clone, Copy, Debug)]
pub struct CalleeEffect<'a> {
    pub edge: &'a CallEdge,
    pub effective: &'a Effective,
    /// Opaque target carrying the namespace default rather than an explicit tag.
    pub defaulted: bool,
}

pub trait Policy: Send + Sync {
    fn namespace(&self) -> &str;

    fn kind(&self) -> PolicyKind;

    fn check_id(&self) -> String {
        ids::policy_check_id(self.namespace())
    }

    fn validate_tag(&self, value: &str) -> TagValidity;

    /// Effective tag of an opaque node with no explicit tag.
    fn opaque_default(&self) -> Effective;

    /// Join the effective tags of a callable's invoked callees, in body order.
    fn combine(&self, callees: &[CalleeEffect<'_>]) -> Result<Effective, Ambiguity>;

    fn check(&self, caller: &Effective, callee: &Effective, edge: &CallEdge) -> Decision;

    fn verify(&self, graph: &CallGraph, table: &EffectTable, out: &mut Vec<Violation>) {
        verify_edges(self, graph, table, out);
    }
}

/// Pairwise verification: `check` on every invoking edge.
///
/// Edges whose caller is undefined are skipped; that ambiguity is already reported.
pub fn verify_edges<P: Policy + ?Sized>(
    policy: &P,
    graph: &CallGraph,
    table: &EffectTable,
    out: &mut Vec<Violation>,
) {
    for edge in graph.edges() {
        if !edge.indirection.invokes() {
            continue;
        }
        let caller = table.get(edge.caller);
        if caller.is_undefined() {
            continue;
        }
        let callee = table.get(edge.callee);
        if let Decision::Deny { code, rule } = policy.check(caller, callee, edge) {
            out.push(Violation {
                edge: edge.id,
                namespace: policy.namespace().to_string(),
                code,
                rule,
            });
        }
    }
}

/// Denial shared by every policy when the callee's tag could not be inferred.
pub(crate) fn deny_undefined_callee() -> Decision {
    Decision::Deny {
        code: ids::CODE_UNDEFINED_CALLEE_EFFECT,
        rule: "callee effect is undefined".to_string(),
    }
}

/// Static table of policies keyed by namespace, immutable for a run.
#[derive(Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Box<dyn Policy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One policy per enabled namespace in `cfg`.
    pub fn from_config(cfg: &EffectiveConfig) -> Self {
        let mut registry = Self::new();
        for (namespace, ns) in cfg.enabled_namespaces() {
            let policy: Box<dyn Policy> = match ns.kind {
                PolicyKind::Color => Box::new(ColorPolicy::new(
                    namespace,
                    &ns.values,
                    ns.opaque_default.clone(),
                )),
                PolicyKind::Locking => Box::new(LockingPolicy::new(
                    namespace,
                    &ns.values,
                    ns.opaque_default.clone(),
                )),
            };
            registry.register(policy);
        }
        debug!(namespaces = registry.len(), "policy registry built");
        registry
    }

    /// Add a policy, replacing any earlier one for the same namespace.
    pub fn register(&mut self, policy: Box<dyn Policy>) {
        self.policies
            .insert(policy.namespace().to_string(), policy);
    }

    pub fn get(&self, namespace: &str) -> Option<&dyn Policy> {
        self.policies.get(namespace).map(|p| p.as_ref())
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.policies.contains_key(namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Policy> + '_ {
        self.policies.values().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.policies.keys()).finish()
    }
}
