use super::{Ambiguity, CalleeEffect, Decision, Policy, TagValidity, deny_undefined_callee};
use crate::effect::{EffectTable, Effective};
use crate::model::{CallEdge, CallGraph, CallableId};
use crate::policy::PolicyKind;
use crate::report::Violation;
use effectguard_types::ids;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::debug;

/// Must be entered with the lock held; does not change it.
pub const REQUIRED: &str = "REQUIRED";
/// Must be entered unlocked; exits locked.
pub const TAKES: &str = "TAKES";
/// Must be entered locked; exits unlocked.
pub const RELEASES: &str = "RELEASES";
/// Independent unit of concurrency. Starts unlocked; nothing flows back to the spawn site.
pub const SPAWNER: &str = "SPAWNER";
/// Inferred only: must be entered unlocked and leaves the lock as it found it.
pub const BALANCED: &str = "BALANCED";

const BUILTIN: &[&str] = &[REQUIRED, TAKES, RELEASES, SPAWNER];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockState {
    Unlocked,
    Locked,
}

impl LockState {
    pub fn as_str(self) -> &'static str {
        match self {
            LockState::Unlocked => "UNLOCKED",
            LockState::Locked => "LOCKED",
        }
    }
}

/// Net effect of a callable on one lock: required entry state and resulting exit state.
///
/// `exit == None` leaves the state as it was. `entry == None` accepts any state and
/// implies `exit == None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transition {
    pub entry: Option<LockState>,
    pub exit: Option<LockState>,
}

impl Transition {
    pub const IDENTITY: Transition = Transition {
        entry: None,
        exit: None,
    };

    pub fn new(entry: Option<LockState>, exit: Option<LockState>) -> Self {
        let exit = if exit == entry { None } else { exit };
        Self { entry, exit }
    }

    /// Transition denoted by a tag value. Values without lock semantics are identity.
    pub fn from_tag(value: &str) -> Self {
        use LockState::*;
        match value {
            REQUIRED => Self::new(Some(Locked), None),
            TAKES => Self::new(Some(Unlocked), Some(Locked)),
            RELEASES => Self::new(Some(Locked), Some(Unlocked)),
            BALANCED => Self::new(Some(Unlocked), None),
            _ => Self::IDENTITY,
        }
    }

    pub fn from_effective(effective: &Effective) -> Self {
        match effective {
            Effective::Tag(v) => Self::from_tag(v),
            Effective::Neutral | Effective::Undefined => Self::IDENTITY,
        }
    }

    pub fn to_effective(self) -> Effective {
        use LockState::*;
        match (self.entry, self.exit) {
            (Some(Locked), None) => Effective::tag(REQUIRED),
            (Some(Unlocked), Some(Locked)) => Effective::tag(TAKES),
            (Some(Locked), Some(Unlocked)) => Effective::tag(RELEASES),
            (Some(Unlocked), None) => Effective::tag(BALANCED),
            _ => Effective::Neutral,
        }
    }

    /// State after running this transition from `state`.
    pub fn after(self, state: LockState) -> LockState {
        self.exit.unwrap_or(state)
    }

    /// Sequential composition: `self` followed by `next`.
    ///
    /// A mismatched entry requirement is a violation reported during verification;
    /// here the state simply carries on.
    pub fn then(self, next: Transition) -> Transition {
        let state = self.exit.or(self.entry);
        match (state, next.entry) {
            (_, None) => Transition::new(self.entry, next.exit.or(self.exit)),
            (None, Some(required)) => Transition::new(Some(required), next.exit),
            (Some(s), Some(_)) => Transition::new(self.entry, next.exit.or(Some(s))),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_effective() {
            Effective::Tag(v) => f.write_str(&v),
            _ => f.write_str("no-op"),
        }
    }
}

/// Merge the net transitions of alternative call paths.
///
/// Paths agree when they never require different entry states and leave the lock
/// in the same state from the merged entry.
fn merge_paths(paths: &BTreeSet<Transition>) -> Result<Transition, Ambiguity> {
    let mut entry: Option<LockState> = None;
    for p in paths {
        match (entry, p.entry) {
            (Some(a), Some(b)) if a != b => return Err(disagreement(paths)),
            (None, Some(b)) => entry = Some(b),
            _ => {}
        }
    }
    let Some(entry) = entry else {
        return Ok(Transition::IDENTITY);
    };
    let exits: BTreeSet<LockState> = paths.iter().map(|p| p.after(entry)).collect();
    match exits.iter().next() {
        Some(exit) if exits.len() == 1 => Ok(Transition::new(Some(entry), Some(*exit))),
        _ => Err(disagreement(paths)),
    }
}

fn disagreement(paths: &BTreeSet<Transition>) -> Ambiguity {
    let nets: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    Ambiguity::new(format!(
        "call paths disagree on the net lock transition ({})",
        nets.join(", ")
    ))
}

/// Lock-state automaton for one abstract lock resource.
///
/// Several namespaces may use this policy, each tracking its own lock.
#[derive(Debug)]
pub struct LockingPolicy {
    namespace: String,
    vocabulary: BTreeSet<String>,
    opaque_default: Option<String>,
}

impl LockingPolicy {
    pub fn new(namespace: &str, extra_values: &[String], opaque_default: Option<String>) -> Self {
        let mut vocabulary: BTreeSet<String> = BUILTIN.iter().map(|s| s.to_string()).collect();
        vocabulary.extend(extra_values.iter().cloned());
        Self {
            namespace: namespace.to_string(),
            vocabulary,
            opaque_default,
        }
    }

    /// Code and rule for a call whose required entry state `expected` was not met.
    fn mismatch(&self, expected: LockState, t: Transition) -> (&'static str, String) {
        match expected {
            LockState::Unlocked => (
                ids::CODE_DOUBLE_LOCK,
                "lock acquired while already held".to_string(),
            ),
            LockState::Locked if t.exit == Some(LockState::Unlocked) => (
                ids::CODE_DOUBLE_RELEASE,
                "lock released while not held".to_string(),
            ),
            LockState::Locked => (
                ids::CODE_LOCK_NOT_HELD,
                "lock required but not held".to_string(),
            ),
        }
    }
}

impl Policy for LockingPolicy {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Locking
    }

    fn validate_tag(&self, value: &str) -> TagValidity {
        if self.vocabulary.contains(value) {
            TagValidity::Valid
        } else {
            TagValidity::Unknown
        }
    }

    fn opaque_default(&self) -> Effective {
        match &self.opaque_default {
            Some(v) => Effective::tag(v.clone()),
            None => Effective::Neutral,
        }
    }

    fn combine(&self, callees: &[CalleeEffect<'_>]) -> Result<Effective, Ambiguity> {
        let mut paths: BTreeSet<Transition> = BTreeSet::from([Transition::IDENTITY]);
        for c in callees {
            if c.effective.is_undefined() {
                return Err(Ambiguity::new("a callee's lock effect is undefined"));
            }
            let step = Transition::from_effective(c.effective);
            let mut next: BTreeSet<Transition> = paths.iter().map(|p| p.then(step)).collect();
            if c.edge.conditional {
                next.extend(paths.iter().copied());
            }
            paths = next;
        }
        merge_paths(&paths).map(Transition::to_effective)
    }

    fn check(&self, _caller: &Effective, callee: &Effective, _edge: &CallEdge) -> Decision {
        if callee.is_undefined() {
            deny_undefined_callee()
        } else {
            Decision::Allow
        }
    }

    /// Walk every call path from every entry point, tracking the set of possible lock states.
    ///
    /// Entry points are explicitly tagged callables (entered in their declared state,
    /// SPAWNER bodies unlocked), untagged callables nothing invokes, and the smallest
    /// member of each untagged recursive cycle nothing outside it invokes (entered unlocked).
    fn verify(&self, graph: &CallGraph, table: &EffectTable, out: &mut Vec<Violation>) {
        let invoked = graph.invoked();
        let mut walker = Walker {
            policy: self,
            graph,
            table,
            visited: HashSet::new(),
            pending: Vec::new(),
            out,
        };
        let mut roots = 0usize;
        for c in graph.callables() {
            if c.is_opaque() {
                continue;
            }
            let entry = match c.explicit_tag(&self.namespace) {
                Some(tag) => Transition::from_tag(tag).entry.unwrap_or(LockState::Unlocked),
                None if !invoked.contains(&c.id) => LockState::Unlocked,
                None => continue,
            };
            roots += 1;
            walker.run(c.id, entry);
        }
        for cycle in graph.closed_cycles() {
            let tagged = cycle.iter().any(|id| {
                let c = graph.callable(*id);
                c.is_opaque() || c.explicit_tag(&self.namespace).is_some()
            });
            if tagged {
                continue;
            }
            if let Some(first) = cycle.first() {
                roots += 1;
                walker.run(*first, LockState::Unlocked);
            }
        }
        debug!(namespace = %self.namespace, roots, "lock paths walked");
    }
}

struct Walker<'a> {
    policy: &'a LockingPolicy,
    graph: &'a CallGraph,
    table: &'a EffectTable,
    visited: HashSet<(CallableId, LockState)>,
    /// Callable bodies still to walk, with their entry state.
    pending: Vec<(CallableId, LockState)>,
    out: &'a mut Vec<Violation>,
}

impl Walker<'_> {
    fn run(&mut self, root: CallableId, entry: LockState) {
        self.pending.push((root, entry));
        while let Some((callable, entry)) = self.pending.pop() {
            if self.visited.insert((callable, entry)) {
                self.walk_body(callable, entry);
            }
        }
    }

    /// Follow one body in call order; descended callees are queued, not recursed into.
    fn walk_body(&mut self, callable: CallableId, entry: LockState) {
        let policy = self.policy;
        let ns = policy.namespace.as_str();
        let graph = self.graph;
        let table = self.table;
        let mut states: BTreeSet<LockState> = BTreeSet::from([entry]);

        for edge in graph.outgoing(callable) {
            if !edge.indirection.invokes() {
                continue;
            }
            let callee = graph.callable(edge.callee);
            let effective = table.get(edge.callee);
            let descend = !callee.is_opaque() && callee.explicit_tag(ns).is_none();
            let mut next: BTreeSet<LockState> = BTreeSet::new();

            if let Decision::Deny { code, rule } =
                policy.check(table.get(callable), effective, edge)
            {
                self.report(edge, code, rule);
                next.extend(states.iter().copied());
                if descend {
                    for s in &states {
                        self.pending.push((edge.callee, *s));
                    }
                }
            } else if callee.explicit_tag(ns) == Some(SPAWNER) {
                next.extend(states.iter().copied());
            } else {
                let t = Transition::from_effective(effective);
                let mut mismatch: Option<LockState> = None;
                for s in &states {
                    if let Some(required) = t.entry
                        && required != *s
                    {
                        mismatch.get_or_insert(required);
                    }
                    next.insert(t.after(*s));
                    if descend {
                        self.pending.push((edge.callee, t.entry.unwrap_or(*s)));
                    }
                }
                if let Some(expected) = mismatch {
                    let (code, rule) = policy.mismatch(expected, t);
                    self.report(edge, code, rule);
                }
            }

            if edge.conditional {
                next.extend(states.iter().copied());
            }
            states = next;
        }
    }

    fn report(&mut self, edge: &CallEdge, code: &'static str, rule: String) {
        self.out.push(Violation {
            edge: edge.id,
            namespace: self.policy.namespace.clone(),
            code,
            rule,
        });
    }
}
