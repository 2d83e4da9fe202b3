//! Propagator: fixed-point inference of effective tags, per namespace.
//!
//! Explicit tags are seeds and always win. Untagged callables take
//! `policy.combine` of their invoked callees, iterated callees-first until a
//! full pass changes nothing. Independent graph components are solved in
//! parallel; each writes only its own slots of the write-once table.

use crate::effect::{EffectTable, EffectTableBuilder, Effective, Origin};
use crate::model::{CallGraph, CallableId};
use crate::policies::{Ambiguity, CalleeEffect, Policy, PolicyRegistry};
use crate::report::Diagnostic;
use effectguard_types::{Severity, ids};
use rayon::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct Propagation {
    pub table: EffectTable,
    pub diagnostics: Vec<Diagnostic>,
    /// Largest number of changing passes any component needed.
    pub iterations: u32,
}

/// Why an untagged callable ended up undefined.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Failure {
    Inconsistent(Ambiguity),
    /// A callee is undefined; already reported at its source.
    Inherited,
    NoFixedPoint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Inferred {
    value: Effective,
    failure: Option<Failure>,
}

struct Solved {
    values: Vec<(CallableId, Inferred)>,
    iterations: u32,
}

/// Run inference for every registered namespace.
pub fn propagate_all(
    graph: &CallGraph,
    registry: &PolicyRegistry,
    max_iterations: u32,
) -> BTreeMap<String, Propagation> {
    let policies: Vec<&dyn Policy> = registry.iter().collect();
    policies
        .par_iter()
        .map(|p| (p.namespace().to_string(), propagate(graph, *p, max_iterations)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

pub fn propagate(graph: &CallGraph, policy: &dyn Policy, max_iterations: u32) -> Propagation {
    let namespace = policy.namespace();
    let mut table = EffectTableBuilder::new(namespace, graph.len());

    for c in graph.callables() {
        if c.conflicting.contains(namespace) {
            table.set(c.id, Effective::Undefined, Origin::Ambiguous);
        } else if let Some(tag) = c.explicit_tag(namespace) {
            table.set(c.id, Effective::tag(tag), Origin::Explicit);
        } else if c.is_opaque() {
            table.set(c.id, policy.opaque_default(), Origin::Opaque);
        }
    }

    let order = graph.callees_first();
    let components = graph.components();
    let mut component_of = vec![0usize; graph.len()];
    for (i, members) in components.iter().enumerate() {
        for id in members {
            component_of[id.index()] = i;
        }
    }
    let mut pending: Vec<Vec<CallableId>> = vec![Vec::new(); components.len()];
    for scc in &order {
        for id in scc {
            if table.get(*id).is_none() {
                pending[component_of[id.index()]].push(*id);
            }
        }
    }

    let seeds = &table;
    let solved: Vec<Solved> = pending
        .par_iter()
        .filter(|ids| !ids.is_empty())
        .map(|ids| solve_component(graph, policy, seeds, ids, max_iterations))
        .collect();

    let mut diagnostics = Vec::new();
    let mut iterations = 0u32;
    for s in solved {
        iterations = iterations.max(s.iterations);
        for (id, inferred) in s.values {
            let origin = if inferred.value.is_undefined() {
                Origin::Ambiguous
            } else {
                Origin::Inferred
            };
            if let Some(d) = failure_diagnostic(graph, namespace, id, &inferred, max_iterations) {
                diagnostics.push(d);
            }
            table.set(id, inferred.value, origin);
        }
    }

    let table = table.finish();
    debug!(
        namespace,
        iterations,
        explicit = table.count(Origin::Explicit),
        ambiguous = table.count(Origin::Ambiguous),
        "inference settled"
    );
    Propagation {
        table,
        diagnostics,
        iterations,
    }
}

fn solve_component(
    graph: &CallGraph,
    policy: &dyn Policy,
    seeds: &EffectTableBuilder,
    pending: &[CallableId],
    max_iterations: u32,
) -> Solved {
    let mut current: BTreeMap<CallableId, Inferred> = BTreeMap::new();
    // Passes that changed something; the final confirming pass is not counted.
    let mut iterations = 0u32;
    let mut last_changed: BTreeSet<CallableId> = BTreeSet::new();
    let mut converged = false;

    loop {
        let mut changed = BTreeSet::new();
        for id in pending {
            // A callable that is inconsistent on its own keeps that failure, so a
            // cycle cannot overwrite the source of its ambiguity with `Inherited`.
            if current
                .get(id)
                .is_some_and(|prev| matches!(prev.failure, Some(Failure::Inconsistent(_))))
            {
                continue;
            }
            let next = infer(graph, policy, seeds, &current, *id);
            if current.get(id) != Some(&next) {
                current.insert(*id, next);
                changed.insert(*id);
            }
        }
        if changed.is_empty() {
            converged = true;
            break;
        }
        last_changed = changed;
        if iterations == max_iterations {
            break;
        }
        iterations += 1;
    }

    if !converged {
        warn!(
            namespace = policy.namespace(),
            max_iterations,
            unsettled = last_changed.len(),
            "inference did not reach a fixed point"
        );
        for id in &last_changed {
            current.insert(
                *id,
                Inferred {
                    value: Effective::Undefined,
                    failure: Some(Failure::NoFixedPoint),
                },
            );
        }
    }

    Solved {
        values: current.into_iter().collect(),
        iterations,
    }
}

fn infer(
    graph: &CallGraph,
    policy: &dyn Policy,
    seeds: &EffectTableBuilder,
    current: &BTreeMap<CallableId, Inferred>,
    id: CallableId,
) -> Inferred {
    let mut effects = Vec::new();
    for edge in graph.outgoing(id) {
        if !edge.indirection.invokes() {
            continue;
        }
        let effective = match seeds.get(edge.callee) {
            Some(v) => v,
            None => match current.get(&edge.callee) {
                Some(inferred) => &inferred.value,
                None => continue,
            },
        };
        if effective.is_undefined() {
            return Inferred {
                value: Effective::Undefined,
                failure: Some(Failure::Inherited),
            };
        }
        let callee = graph.callable(edge.callee);
        effects.push(CalleeEffect {
            edge,
            effective,
            defaulted: callee.is_opaque() && callee.explicit_tag(policy.namespace()).is_none(),
        });
    }
    match policy.combine(&effects) {
        Ok(value) => Inferred {
            value,
            failure: None,
        },
        Err(ambiguity) => Inferred {
            value: Effective::Undefined,
            failure: Some(Failure::Inconsistent(ambiguity)),
        },
    }
}

fn failure_diagnostic(
    graph: &CallGraph,
    namespace: &str,
    id: CallableId,
    inferred: &Inferred,
    max_iterations: u32,
) -> Option<Diagnostic> {
    let callable = graph.callable(id);
    let (code, message) = match inferred.failure.as_ref()? {
        Failure::Inherited => return None,
        Failure::Inconsistent(a) => (
            ids::CODE_INCONSISTENT_INFERENCE,
            format!(
                "{namespace}: cannot infer a tag for '{}': {a}",
                callable.name
            ),
        ),
        Failure::NoFixedPoint => (
            ids::CODE_NO_FIXED_POINT,
            format!(
                "{namespace}: inference for '{}' did not converge within {max_iterations} iterations",
                callable.name
            ),
        ),
    };
    Some(Diagnostic {
        severity: Severity::Error,
        check_id: ids::CHECK_INFERENCE.to_string(),
        code,
        message,
        location: callable.location.clone(),
        subject: callable.name.clone(),
        namespace: Some(namespace.to_string()),
        data: json!({ "callable": callable.key }),
    })
}
