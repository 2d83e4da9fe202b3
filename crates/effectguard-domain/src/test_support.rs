use crate::annotation::AnnotationResolver;
use crate::builder::build_graph;
use crate::extract::{CalleeRef, ExtractedCallable, ExtractedEdge, ExtractedProgram};
use crate::model::{CallGraph, CallableKind, Indirection};
use crate::policies::PolicyRegistry;
use crate::policy::{EffectiveConfig, FailOn, NamespacePolicy, PolicyKind};
use effectguard_types::{Location, Severity};
use std::collections::BTreeMap;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Top-level named function whose id and name are both `id`.
pub fn callable(id: &str, annotations: &[&str]) -> ExtractedCallable {
    ExtractedCallable {
        id: id.to_string(),
        name: Some(id.to_string()),
        kind: CallableKind::Function,
        parent: None,
        annotations: strings(annotations),
        location: Some(Location::at("test.cpp", 1)),
    }
}

pub fn closure(
    id: &str,
    name: Option<&str>,
    parent: Option<&str>,
    annotations: &[&str],
) -> ExtractedCallable {
    ExtractedCallable {
        id: id.to_string(),
        name: name.map(str::to_string),
        kind: CallableKind::Closure,
        parent: parent.map(str::to_string),
        annotations: strings(annotations),
        location: None,
    }
}

/// Annotated function parameter or external prototype: callable, but not analyzable.
pub fn opaque_param(id: &str, parent: Option<&str>, annotations: &[&str]) -> ExtractedCallable {
    ExtractedCallable {
        id: id.to_string(),
        name: Some(id.to_string()),
        kind: CallableKind::Opaque,
        parent: parent.map(str::to_string),
        annotations: strings(annotations),
        location: None,
    }
}

pub fn edge_symbol(caller: &str, name: &str) -> ExtractedEdge {
    ExtractedEdge {
        caller: caller.to_string(),
        callee: CalleeRef::Symbol(name.to_string()),
        location: None,
        indirection: Indirection::Direct,
        conditional: false,
    }
}

pub fn edge_id(caller: &str, id: &str) -> ExtractedEdge {
    ExtractedEdge {
        callee: CalleeRef::Id(id.to_string()),
        ..edge_symbol(caller, id)
    }
}

pub fn address_of(caller: &str, name: &str) -> ExtractedEdge {
    ExtractedEdge {
        indirection: Indirection::AddressTaken,
        ..edge_symbol(caller, name)
    }
}

pub fn conditional(edge: ExtractedEdge) -> ExtractedEdge {
    ExtractedEdge {
        conditional: true,
        ..edge
    }
}

pub fn program(callables: Vec<ExtractedCallable>, edges: Vec<ExtractedEdge>) -> ExtractedProgram {
    ExtractedProgram {
        callables,
        edges,
        declarations: Vec::new(),
        parse_errors: Vec::new(),
    }
}

/// COLOR and LOCKING enabled at error severity.
pub fn config() -> EffectiveConfig {
    let mut namespaces = BTreeMap::new();
    namespaces.insert(
        "COLOR".to_string(),
        NamespacePolicy::enabled(PolicyKind::Color, Severity::Error),
    );
    namespaces.insert(
        "LOCKING".to_string(),
        NamespacePolicy::enabled(PolicyKind::Locking, Severity::Error),
    );
    EffectiveConfig {
        profile: "test".to_string(),
        fail_on: FailOn::Error,
        max_findings: 200,
        max_iterations: 64,
        namespaces,
    }
}

pub fn registry() -> PolicyRegistry {
    PolicyRegistry::from_config(&config())
}

pub fn built(program: ExtractedProgram) -> CallGraph {
    let registry = registry();
    let resolver = AnnotationResolver::new(&registry);
    build_graph(&program, &resolver)
        .expect("test program builds")
        .graph
}
