//! Property-based tests for the domain crate.
//!
//! These tests use proptest to verify invariants around:
//! - Explicit tags always winning over inference
//! - Run-to-run determinism of violations and findings
//! - Color compatibility rules on arbitrary graphs
//! - Annotation parsing never panicking

use crate::annotation::parse_annotation;
use crate::effect::Effective;
use crate::engine::evaluate;
use crate::extract::{ExtractedCallable, ExtractedEdge, ExtractedProgram};
use crate::test_support::{callable, config, conditional, edge_symbol, program};
use effectguard_types::ids;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_color() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        3 => Just(None),
        1 => Just(Some("RED")),
        1 => Just(Some("BLUE")),
        1 => Just(Some("YELLOW")),
        1 => Just(Some("PURPLE")),
    ]
}

fn arb_lock() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![
        4 => Just(None),
        1 => Just(Some("REQUIRED")),
        1 => Just(Some("TAKES")),
        1 => Just(Some("RELEASES")),
        1 => Just(Some("SPAWNER")),
    ]
}

/// A program over `f0..fn` with random colors, lock tags, and call edges (cycles allowed).
fn arb_program() -> impl Strategy<Value = ExtractedProgram> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec((arb_color(), arb_lock()), n),
            prop::collection::vec((0..n, 0..n, any::<bool>()), 0..16),
        )
            .prop_map(|(tags, edges)| {
                let callables: Vec<ExtractedCallable> = tags
                    .iter()
                    .enumerate()
                    .map(|(i, (color, lock))| {
                        let mut annotations = Vec::new();
                        if let Some(c) = color {
                            annotations.push(format!("COLOR::{c}"));
                        }
                        if let Some(l) = lock {
                            annotations.push(format!("LOCKING::{l}"));
                        }
                        let mut c = callable(&format!("f{i}"), &[]);
                        c.annotations = annotations;
                        c
                    })
                    .collect();
                let edges: Vec<ExtractedEdge> = edges
                    .into_iter()
                    .map(|(a, b, cond)| {
                        let e = edge_symbol(&format!("f{a}"), &format!("f{b}"));
                        if cond { conditional(e) } else { e }
                    })
                    .collect();
                program(callables, edges)
            })
    })
}

fn explicit_color(p: &ExtractedProgram, name: &str) -> Option<String> {
    p.callables
        .iter()
        .find(|c| c.id == name)?
        .annotations
        .iter()
        .find_map(|a| a.strip_prefix("COLOR::").map(str::to_string))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn explicit_tags_always_win(p in arb_program()) {
        let report = evaluate(&p, &config()).expect("evaluate");
        for c in &p.callables {
            if let Some(color) = explicit_color(&p, &c.id) {
                prop_assert_eq!(
                    report.effective_tag("COLOR", &c.id),
                    Some(&Effective::tag(color))
                );
            }
        }
    }

    #[test]
    fn evaluation_is_deterministic(p in arb_program()) {
        let a = evaluate(&p, &config()).expect("evaluate");
        let b = evaluate(&p, &config()).expect("evaluate");
        prop_assert_eq!(a.violations(), b.violations());
        prop_assert_eq!(&a.findings, &b.findings);
        prop_assert_eq!(a.succeeded(), b.succeeded());
    }

    #[test]
    fn color_violations_respect_the_lattice(p in arb_program()) {
        let report = evaluate(&p, &config()).expect("evaluate");
        for v in report.violations().iter().filter(|v| v.namespace == "COLOR") {
            let edge = report.graph.edge(v.edge);
            let caller = &report.graph.callable(edge.caller).name;
            let callee = &report.graph.callable(edge.callee).name;
            let caller_color = explicit_color(&p, caller);
            let callee_color = explicit_color(&p, callee);

            prop_assert_ne!(caller_color.as_deref(), Some("PURPLE"));
            prop_assert_ne!(callee_color.as_deref(), Some("PURPLE"));
            if caller_color.is_some() && callee_color.is_some() {
                prop_assert_ne!(caller_color, callee_color);
                prop_assert_eq!(v.code, ids::CODE_INCOMPATIBLE_COLOR);
            }
        }
    }

    #[test]
    fn violations_are_unique_per_edge_and_namespace(p in arb_program()) {
        let report = evaluate(&p, &config()).expect("evaluate");
        let mut keys: Vec<(u32, &str)> = report
            .violations()
            .iter()
            .map(|v| (v.edge.0, v.namespace.as_str()))
            .collect();
        let before = keys.len();
        keys.dedup();
        prop_assert_eq!(before, keys.len());
    }

    #[test]
    fn success_flag_matches_violations(p in arb_program()) {
        let report = evaluate(&p, &config()).expect("evaluate");
        if !report.violations().is_empty() {
            prop_assert!(!report.succeeded());
        }
    }

    #[test]
    fn parse_annotation_never_panics(text in ".{0,40}") {
        let _ = parse_annotation(&text);
    }

    #[test]
    fn well_formed_annotations_parse(ns in "[A-Z][A-Z_]{0,10}", value in "[A-Z][A-Z0-9_]{0,10}") {
        let tag = parse_annotation(&format!("{ns}::{value}")).expect("well formed");
        prop_assert_eq!(tag.namespace, ns);
        prop_assert_eq!(tag.value, value);
    }
}
