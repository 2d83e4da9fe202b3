use crate::annotation::AnnotationResolver;
use crate::builder::{BuildError, build_graph};
use crate::effect::{EffectTable, Origin};
use crate::extract::Extractor;
use crate::fingerprint::fingerprint_for;
use crate::model::{CallGraph, CallableId};
use crate::policies::{Policy, PolicyRegistry};
use crate::policy::{EffectiveConfig, FailOn};
use crate::propagate::propagate_all;
use crate::report::{Diagnostic, DomainReport, Violation};
use effectguard_types::{
    EffectguardData, Finding, Location, NamespaceSummary, Severity, Verdict, ids,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// One analysis run: registered policies plus the config they were built from.
pub struct Engine {
    registry: PolicyRegistry,
    config: EffectiveConfig,
}

impl Engine {
    pub fn new(registry: PolicyRegistry, config: EffectiveConfig) -> Self {
        Self { registry, config }
    }

    pub fn from_config(config: EffectiveConfig) -> Self {
        Self::new(PolicyRegistry::from_config(&config), config)
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn run(&self, extractor: &dyn Extractor) -> Result<DomainReport, BuildError> {
        let cfg = &self.config;
        let resolver = AnnotationResolver::new(&self.registry);
        let built = build_graph(extractor, &resolver)?;
        let graph = built.graph;
        let mut diagnostics = built.diagnostics;

        let propagations = propagate_all(&graph, &self.registry, cfg.max_iterations);
        let mut iterations: BTreeMap<String, u32> = BTreeMap::new();
        let mut effects: BTreeMap<String, EffectTable> = BTreeMap::new();
        for (namespace, p) in propagations {
            diagnostics.extend(p.diagnostics);
            iterations.insert(namespace.clone(), p.iterations);
            effects.insert(namespace, p.table);
        }

        let policies: Vec<&dyn Policy> = self.registry.iter().collect();
        let verified: Vec<Vec<Violation>> = policies
            .par_iter()
            .map(|p| {
                let mut out = Vec::new();
                if let Some(table) = effects.get(p.namespace()) {
                    p.verify(&graph, table, &mut out);
                }
                out
            })
            .collect();
        let violations = self.settle_violations(&graph, verified.into_iter().flatten());

        let ambiguous = diagnostics.iter().any(is_ambiguity)
            || effects.values().any(|t| t.count(Origin::Ambiguous) > 0);
        let succeeded = violations.is_empty() && !ambiguous;

        let mut findings: Vec<Finding> = diagnostics.iter().map(diagnostic_finding).collect();
        findings.extend(
            violations
                .iter()
                .map(|v| self.violation_finding(&graph, &effects, v)),
        );

        // Deterministic ordering before truncation.
        findings.sort_by(compare_findings);

        let total = findings.len() as u32;

        let mut emitted = findings;
        let mut truncated_reason: Option<String> = None;
        if emitted.len() > cfg.max_findings {
            emitted.truncate(cfg.max_findings);
            truncated_reason = Some(format!(
                "findings truncated to max_findings={}",
                cfg.max_findings
            ));
        }

        let verdict = compute_verdict(&emitted, cfg.fail_on);

        let namespaces = self
            .registry
            .iter()
            .map(|p| {
                let ns = p.namespace();
                let table = effects.get(ns);
                let count = |o: Origin| table.map(|t| t.count(o)).unwrap_or(0);
                NamespaceSummary {
                    namespace: ns.to_string(),
                    kind: p.kind().as_str().to_string(),
                    explicit: count(Origin::Explicit),
                    inferred: count(Origin::Inferred),
                    ambiguous: count(Origin::Ambiguous),
                    iterations: iterations.get(ns).copied().unwrap_or(0),
                    violations: violations.iter().filter(|v| v.namespace == ns).count() as u32,
                }
            })
            .collect();

        let data = EffectguardData {
            profile: cfg.profile.clone(),
            callables_analyzed: graph.len() as u32,
            edges_analyzed: graph.edges().len() as u32,
            namespaces,
            findings_total: total,
            findings_emitted: emitted.len() as u32,
            succeeded,
            truncated_reason,
        };

        info!(
            callables = data.callables_analyzed,
            violations = violations.len(),
            succeeded,
            "analysis finished"
        );
        Ok(DomainReport::new(
            verdict, emitted, data, graph, effects, violations,
        ))
    }

    /// Drop allowlisted callers, keep the first violation per `(edge, namespace)`, order by edge.
    fn settle_violations(
        &self,
        graph: &CallGraph,
        raw: impl Iterator<Item = Violation>,
    ) -> Vec<Violation> {
        let allowlists: BTreeMap<&str, GlobSet> = self
            .config
            .enabled_namespaces()
            .filter_map(|(ns, p)| build_allowlist(&p.allow).map(|set| (ns, set)))
            .collect();

        let mut seen: BTreeSet<(u32, String)> = BTreeSet::new();
        let mut out: Vec<Violation> = Vec::new();
        for v in raw {
            let caller = graph.callable(graph.edge(v.edge).caller);
            if is_allowed(allowlists.get(v.namespace.as_str()), &caller.name) {
                debug!(namespace = %v.namespace, caller = %caller.name, "violation allowlisted");
                continue;
            }
            if seen.insert((v.edge.0, v.namespace.clone())) {
                out.push(v);
            }
        }
        out.sort_by(|a, b| a.edge.cmp(&b.edge).then(a.namespace.cmp(&b.namespace)));
        out
    }

    fn violation_finding(
        &self,
        graph: &CallGraph,
        effects: &BTreeMap<String, EffectTable>,
        v: &Violation,
    ) -> Finding {
        let edge = graph.edge(v.edge);
        let caller = graph.callable(edge.caller);
        let callee = graph.callable(edge.callee);
        let severity = self
            .config
            .namespace_policy(&v.namespace)
            .map(|p| p.severity)
            .unwrap_or(Severity::Error);
        let check_id = self
            .registry
            .get(&v.namespace)
            .map(|p| p.check_id())
            .unwrap_or_else(|| ids::policy_check_id(&v.namespace));
        let table = effects.get(&v.namespace);
        let tag_of = |id: CallableId| table.map(|t| t.get(id).to_string());
        let location = edge.location.clone().or_else(|| caller.location.clone());
        let fingerprint = fingerprint_for(
            &check_id,
            v.code,
            &v.namespace,
            &caller.name,
            &callee.name,
            location.as_ref().map(location_key).as_deref(),
        );

        Finding {
            severity,
            check_id,
            code: v.code.to_string(),
            message: format!(
                "{}: call from '{}' to '{}' denied: {}",
                v.namespace, caller.name, callee.name, v.rule
            ),
            location,
            help: help_for(v.code).map(str::to_string),
            url: None,
            fingerprint: Some(fingerprint),
            data: json!({
                "namespace": v.namespace,
                "caller": caller.name,
                "callee": callee.name,
                "caller_tag": tag_of(edge.caller),
                "callee_tag": tag_of(edge.callee),
                "indirection": edge.indirection.as_str(),
            }),
        }
    }
}

/// Build a policy registry from `cfg` and run one analysis over `program`.
pub fn evaluate(
    program: &dyn Extractor,
    cfg: &EffectiveConfig,
) -> Result<DomainReport, BuildError> {
    Engine::from_config(cfg.clone()).run(program)
}

fn is_ambiguity(d: &Diagnostic) -> bool {
    matches!(
        d.code,
        ids::CODE_CONFLICTING_EXPLICIT_TAGS
            | ids::CODE_INCONSISTENT_INFERENCE
            | ids::CODE_NO_FIXED_POINT
    )
}

fn diagnostic_finding(d: &Diagnostic) -> Finding {
    let object = d
        .data
        .get("annotation")
        .or_else(|| d.data.get("callee"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let fingerprint = fingerprint_for(
        &d.check_id,
        d.code,
        d.namespace.as_deref().unwrap_or(""),
        &d.subject,
        object,
        d.location.as_ref().map(location_key).as_deref(),
    );
    Finding {
        severity: d.severity,
        check_id: d.check_id.clone(),
        code: d.code.to_string(),
        message: d.message.clone(),
        location: d.location.clone(),
        help: help_for(d.code).map(str::to_string),
        url: None,
        fingerprint: Some(fingerprint),
        data: d.data.clone(),
    }
}

fn location_key(l: &Location) -> String {
    match l.line {
        Some(line) => format!("{}:{line}", l.path.as_str()),
        None => l.path.as_str().to_string(),
    }
}

fn help_for(code: &str) -> Option<&'static str> {
    let help = match code {
        ids::CODE_MALFORMED_ANNOTATION => "Write annotations as <Namespace>::<TAG>.",
        ids::CODE_UNKNOWN_TAG => "Use a tag from the namespace vocabulary or add it to `values`.",
        ids::CODE_RESERVED_TAG => "Remove the reserved tag from the callable.",
        ids::CODE_INERT_ANNOTATION => "Move the annotation to a function or closure binding.",
        ids::CODE_CONFLICTING_EXPLICIT_TAGS => "Keep exactly one tag per namespace on the callable.",
        ids::CODE_INCONSISTENT_INFERENCE => "Tag the callable explicitly or split it by effect.",
        ids::CODE_NO_FIXED_POINT => "Tag a callable on the recursive cycle explicitly.",
        ids::CODE_UNRESOLVED_CALL => "Provide the callee to the extractor or annotate its prototype.",
        ids::CODE_INCOMPATIBLE_COLOR => "Call through a PURPLE function or match the caller's color.",
        ids::CODE_DOUBLE_LOCK => "Release the lock before acquiring it again.",
        ids::CODE_DOUBLE_RELEASE => "Only release a lock acquired on the same path.",
        ids::CODE_LOCK_NOT_HELD => "Acquire the lock before this call.",
        ids::CODE_UNDEFINED_CALLEE_EFFECT => "Resolve the callee's ambiguity by tagging it explicitly.",
        _ => return None,
    };
    Some(help)
}

fn build_allowlist(allow: &[String]) -> Option<GlobSet> {
    if allow.is_empty() {
        return None;
    }

    let mut builder = GlobSetBuilder::new();
    // Patterns are validated by effectguard-settings; invalid ones match nothing.
    for glob in allow.iter().filter_map(|p| Glob::new(p).ok()) {
        builder.add(glob);
    }
    builder.build().ok()
}

fn is_allowed(allow: Option<&GlobSet>, value: &str) -> bool {
    allow.map(|set| set.is_match(value)).unwrap_or(false)
}

fn compute_verdict(findings: &[Finding], fail_on: FailOn) -> Verdict {
    let has_error = findings.iter().any(|f| f.severity == Severity::Error);
    if has_error {
        return Verdict::Fail;
    }

    let has_warn = findings.iter().any(|f| f.severity == Severity::Warning);
    if has_warn {
        return match fail_on {
            FailOn::Warning => Verdict::Fail,
            FailOn::Error => Verdict::Warn,
        };
    }

    Verdict::Pass
}

pub(crate) fn compare_findings(a: &Finding, b: &Finding) -> std::cmp::Ordering {
    // Ordering priority:
    // 1) severity (error -> warning -> info)
    // 2) location.path (missing last)
    // 3) location.line (missing last)
    // 4) check_id
    // 5) code
    // 6) message
    let severity_rank = |sev: Severity| match sev {
        Severity::Error => 0,
        Severity::Warning => 1,
        Severity::Info => 2,
    };
    let (ap, al) = match &a.location {
        Some(l) => (l.path.as_str(), l.line.unwrap_or(u32::MAX)),
        None => ("~", u32::MAX),
    };
    let (bp, bl) = match &b.location {
        Some(l) => (l.path.as_str(), l.line.unwrap_or(u32::MAX)),
        None => ("~", u32::MAX),
    };

    severity_rank(a.severity)
        .cmp(&severity_rank(b.severity))
        .then(ap.cmp(bp))
        .then(al.cmp(&bl))
        .then(a.check_id.cmp(&b.check_id))
        .then(a.code.cmp(&b.code))
        .then(a.message.cmp(&b.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Effective;
    use crate::extract::ExtractedProgram;
    use crate::model::Indirection;
    use crate::policy::{NamespacePolicy, PolicyKind};
    use crate::test_support::{
        address_of, callable, closure, conditional, config, edge_id, edge_symbol, opaque_param,
        program,
    };

    fn violation_summary(report: &DomainReport) -> Vec<(String, String, &'static str)> {
        report
            .violations()
            .iter()
            .map(|v| {
                let e = report.graph.edge(v.edge);
                (
                    report.graph.callable(e.caller).name.clone(),
                    report.graph.callable(e.callee).name.clone(),
                    v.code,
                )
            })
            .collect()
    }

    fn run(p: &ExtractedProgram) -> DomainReport {
        evaluate(p, &config()).expect("evaluate")
    }

    // --- COLOR ---

    fn scenario_a() -> ExtractedProgram {
        program(
            vec![
                callable("ret0", &["COLOR::BLUE"]),
                callable("ret_wrapper", &["COLOR::PURPLE"]),
                callable("helper", &[]),
                callable("main", &["COLOR::RED"]),
            ],
            vec![
                edge_symbol("ret_wrapper", "ret0"),
                edge_symbol("helper", "ret0"),
                edge_symbol("main", "ret_wrapper"),
                edge_symbol("main", "helper"),
            ],
        )
    }

    #[test]
    fn scenario_a_purple_boundary_and_inferred_blue() {
        let report = run(&scenario_a());
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "helper".to_string(),
                ids::CODE_INCOMPATIBLE_COLOR
            )]
        );
        assert_eq!(
            report.effective_tag("COLOR", "helper"),
            Some(&Effective::tag("BLUE"))
        );
        assert!(!report.succeeded());
        assert_eq!(report.verdict, Verdict::Fail);

        let finding = report
            .findings
            .iter()
            .find(|f| f.code == ids::CODE_INCOMPATIBLE_COLOR)
            .expect("finding");
        assert_eq!(
            finding.message,
            "COLOR: call from 'main' to 'helper' denied: RED may not call BLUE"
        );
        assert_eq!(finding.check_id, ids::CHECK_POLICY_COLOR);
        assert!(finding.fingerprint.is_some());
    }

    #[test]
    fn scenario_b_yellow_closure() {
        let bad = program(
            vec![
                callable("ret0", &["COLOR::BLUE"]),
                callable("main", &[]),
                closure("wrapper", Some("WrapperFn1"), Some("main"), &["COLOR::YELLOW"]),
            ],
            vec![edge_symbol("wrapper", "ret0")],
        );
        let report = run(&bad);
        assert_eq!(
            violation_summary(&report),
            vec![(
                "WrapperFn1".to_string(),
                "ret0".to_string(),
                ids::CODE_INCOMPATIBLE_COLOR
            )]
        );

        let good = program(
            vec![
                callable("yellow_fn", &["COLOR::YELLOW"]),
                callable("main", &[]),
                closure("wrapper", Some("WrapperFn1"), Some("main"), &["COLOR::YELLOW"]),
            ],
            vec![edge_symbol("wrapper", "yellow_fn")],
        );
        let report = run(&good);
        assert!(report.violations().is_empty());
        assert!(report.succeeded());
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[test]
    fn same_color_and_purple_calls_pass() {
        let p = program(
            vec![
                callable("blue_a", &["COLOR::BLUE"]),
                callable("blue_b", &["COLOR::BLUE"]),
                callable("purple", &["COLOR::PURPLE"]),
                callable("red", &["COLOR::RED"]),
            ],
            vec![
                edge_symbol("blue_a", "blue_b"),
                edge_symbol("purple", "red"),
                edge_symbol("purple", "blue_a"),
                edge_symbol("red", "purple"),
            ],
        );
        let report = run(&p);
        assert!(report.violations().is_empty());
    }

    #[test]
    fn ambiguous_callee_fails_closed() {
        let p = program(
            vec![
                callable("red", &["COLOR::RED"]),
                callable("blue", &["COLOR::BLUE"]),
                callable("mixed", &[]),
                callable("main", &["COLOR::RED"]),
            ],
            vec![
                edge_symbol("mixed", "red"),
                edge_symbol("mixed", "blue"),
                edge_symbol("main", "mixed"),
            ],
        );
        let report = run(&p);
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "mixed".to_string(),
                ids::CODE_UNDEFINED_CALLEE_EFFECT
            )]
        );
        assert!(
            report
                .findings
                .iter()
                .any(|f| f.code == ids::CODE_INCONSISTENT_INFERENCE)
        );
    }

    #[test]
    fn ambiguity_alone_fails_the_run() {
        let p = program(
            vec![callable("f", &["COLOR::RED", "COLOR::BLUE"])],
            vec![],
        );
        let report = run(&p);
        assert!(report.violations().is_empty());
        assert!(!report.succeeded());
    }

    #[test]
    fn ambiguity_inside_a_recursive_cycle_fails_the_run() {
        let p = program(
            vec![
                callable("red", &["COLOR::RED"]),
                callable("blue", &["COLOR::BLUE"]),
                callable("a", &[]),
                callable("b", &[]),
                callable("main", &[]),
            ],
            vec![
                edge_symbol("a", "b"),
                edge_symbol("a", "red"),
                edge_symbol("b", "a"),
                edge_symbol("b", "blue"),
                edge_symbol("main", "a"),
            ],
        );
        let report = run(&p);
        for name in ["a", "b", "main"] {
            assert_eq!(
                report.effective_tag("COLOR", name),
                Some(&Effective::Undefined),
                "{name}"
            );
        }
        let inconsistent: Vec<&Finding> = report
            .findings
            .iter()
            .filter(|f| f.code == ids::CODE_INCONSISTENT_INFERENCE)
            .collect();
        assert_eq!(inconsistent.len(), 1);
        assert!(inconsistent[0].message.contains("'b'"));
        assert!(!report.succeeded());
    }

    #[test]
    fn address_taken_uses_are_not_calls() {
        let p = program(
            vec![
                callable("blue", &["COLOR::BLUE"]),
                callable("main", &["COLOR::RED"]),
            ],
            vec![address_of("main", "blue")],
        );
        let report = run(&p);
        assert!(report.violations().is_empty());
    }

    #[test]
    fn tagged_parameter_is_checked_at_call() {
        let p = program(
            vec![
                callable("main", &["COLOR::RED"]),
                opaque_param("cb", Some("main"), &["COLOR::BLUE"]),
            ],
            vec![edge_id("main", "cb")],
        );
        let report = run(&p);
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "cb".to_string(),
                ids::CODE_INCOMPATIBLE_COLOR
            )]
        );
    }

    #[test]
    fn opaque_default_is_used_for_unresolved_targets() {
        let p = program(
            vec![callable("main", &["COLOR::RED"])],
            vec![edge_symbol("main", "external")],
        );
        let mut cfg = config();
        if let Some(ns) = cfg.namespaces.get_mut("COLOR") {
            ns.opaque_default = Some("BLUE".to_string());
        }
        let report = evaluate(&p, &cfg).expect("evaluate");
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "external".to_string(),
                ids::CODE_INCOMPATIBLE_COLOR
            )]
        );
        assert!(
            report
                .findings
                .iter()
                .any(|f| f.code == ids::CODE_UNRESOLVED_CALL && f.severity == Severity::Info)
        );
    }

    #[test]
    fn allowlisted_callers_are_exempt() {
        let mut cfg = config();
        if let Some(ns) = cfg.namespaces.get_mut("COLOR") {
            ns.allow = vec!["ma*".to_string()];
        }
        let report = evaluate(&scenario_a(), &cfg).expect("evaluate");
        assert!(report.violations().is_empty());
        assert!(report.succeeded());
    }

    #[test]
    fn namespace_severity_drives_verdict() {
        let mut cfg = config();
        if let Some(ns) = cfg.namespaces.get_mut("COLOR") {
            ns.severity = Severity::Warning;
        }
        let report = evaluate(&scenario_a(), &cfg).expect("evaluate");
        assert_eq!(report.verdict, Verdict::Warn);
        assert!(!report.succeeded());

        cfg.fail_on = FailOn::Warning;
        let report = evaluate(&scenario_a(), &cfg).expect("evaluate");
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn truncation_keeps_totals_and_success_flag() {
        let mut cfg = config();
        cfg.max_findings = 0;
        let report = evaluate(&scenario_a(), &cfg).expect("evaluate");
        assert!(report.findings.is_empty());
        assert_eq!(report.data.findings_total, 1);
        assert_eq!(report.violations().len(), 1);
        assert!(!report.succeeded());
        assert_eq!(
            report.data.truncated_reason.as_deref(),
            Some("findings truncated to max_findings=0")
        );
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[test]
    fn disabled_namespace_is_not_checked() {
        let mut cfg = config();
        cfg.namespaces
            .insert("COLOR".to_string(), NamespacePolicy::disabled(PolicyKind::Color));
        let report = evaluate(&scenario_a(), &cfg).expect("evaluate");
        assert!(report.violations().is_empty());
        assert!(report.effective_tag("COLOR", "main").is_none());
    }

    #[test]
    fn parse_errors_abort_without_report() {
        let mut p = scenario_a();
        p.parse_errors.push("test.cpp:4: error".to_string());
        assert!(matches!(
            evaluate(&p, &config()),
            Err(BuildError::ExtractorFailed { .. })
        ));
    }

    #[test]
    fn running_twice_is_identical() {
        let p = scenario_a();
        let a = run(&p);
        let b = run(&p);
        assert_eq!(a.violations(), b.violations());
        assert_eq!(a.findings, b.findings);
    }

    // --- LOCKING ---

    fn lock_api() -> Vec<crate::extract::ExtractedCallable> {
        vec![
            callable("increment_counter", &["LOCKING::REQUIRED"]),
            callable("get_lock", &["LOCKING::TAKES"]),
            callable("release_lock", &["LOCKING::RELEASES"]),
        ]
    }

    #[test]
    fn scenario_c_double_lock() {
        let mut callables = lock_api();
        callables.push(callable("nested", &[]));
        let bad = program(
            callables.clone(),
            vec![
                edge_symbol("nested", "get_lock"),
                edge_symbol("nested", "get_lock"),
                edge_symbol("nested", "increment_counter"),
                edge_symbol("nested", "release_lock"),
            ],
        );
        let report = run(&bad);
        assert_eq!(
            violation_summary(&report),
            vec![(
                "nested".to_string(),
                "get_lock".to_string(),
                ids::CODE_DOUBLE_LOCK
            )]
        );
        assert_eq!(report.violations()[0].edge.0, 1, "the second acquisition");

        let good = program(
            callables,
            vec![
                edge_symbol("nested", "get_lock"),
                edge_symbol("nested", "release_lock"),
                edge_symbol("nested", "get_lock"),
                edge_symbol("nested", "increment_counter"),
                edge_symbol("nested", "release_lock"),
            ],
        );
        let report = run(&good);
        assert!(report.violations().is_empty());
        assert!(report.succeeded());
    }

    #[test]
    fn double_lock_through_an_inferred_helper() {
        let mut callables = lock_api();
        callables.push(callable("acquire", &[]));
        callables.push(callable("main", &[]));
        let p = program(
            callables,
            vec![
                edge_symbol("acquire", "get_lock"),
                edge_symbol("main", "get_lock"),
                edge_symbol("main", "acquire"),
                edge_symbol("main", "release_lock"),
            ],
        );
        let report = run(&p);
        assert_eq!(
            report.effective_tag("LOCKING", "acquire"),
            Some(&Effective::tag("TAKES"))
        );
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "acquire".to_string(),
                ids::CODE_DOUBLE_LOCK
            )]
        );
    }

    #[test]
    fn release_without_lock_and_missing_lock() {
        let mut callables = lock_api();
        callables.push(callable("main", &[]));
        let p = program(
            callables,
            vec![
                edge_symbol("main", "increment_counter"),
                edge_symbol("main", "release_lock"),
            ],
        );
        let report = run(&p);
        assert_eq!(
            violation_summary(&report),
            vec![
                (
                    "main".to_string(),
                    "increment_counter".to_string(),
                    ids::CODE_LOCK_NOT_HELD
                ),
                (
                    "main".to_string(),
                    "release_lock".to_string(),
                    ids::CODE_DOUBLE_RELEASE
                ),
            ]
        );
    }

    #[test]
    fn scenario_d_spawner_body_starts_unlocked() {
        let mut callables = lock_api();
        callables.push(callable("worker", &["LOCKING::SPAWNER"]));
        callables.push(callable("main", &[]));
        let bad = program(
            callables.clone(),
            vec![
                edge_symbol("main", "get_lock"),
                edge_symbol("main", "worker"),
                edge_symbol("main", "release_lock"),
                edge_symbol("worker", "increment_counter"),
            ],
        );
        let report = run(&bad);
        assert_eq!(
            violation_summary(&report),
            vec![(
                "worker".to_string(),
                "increment_counter".to_string(),
                ids::CODE_LOCK_NOT_HELD
            )]
        );

        // The spawned body ends locked; the spawn site must not see that.
        let good = program(
            callables,
            vec![
                edge_symbol("main", "get_lock"),
                edge_symbol("main", "worker"),
                edge_symbol("main", "release_lock"),
                edge_symbol("worker", "get_lock"),
                edge_symbol("worker", "increment_counter"),
            ],
        );
        let report = run(&good);
        assert!(report.violations().is_empty());
    }

    #[test]
    fn conditional_acquire_is_ambiguous() {
        let mut callables = lock_api();
        callables.push(callable("maybe", &[]));
        callables.push(callable("main", &[]));
        let p = program(
            callables,
            vec![
                conditional(edge_symbol("maybe", "get_lock")),
                edge_symbol("main", "maybe"),
            ],
        );
        let report = run(&p);
        assert_eq!(report.effective_tag("LOCKING", "maybe"), Some(&Effective::Undefined));
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "maybe".to_string(),
                ids::CODE_UNDEFINED_CALLEE_EFFECT
            )]
        );
        assert!(!report.succeeded());
    }

    #[test]
    fn conditional_release_path_reports_double_release_later() {
        let mut callables = lock_api();
        callables.push(callable("main", &[]));
        let p = program(
            callables,
            vec![
                edge_symbol("main", "get_lock"),
                conditional(edge_symbol("main", "release_lock")),
                edge_symbol("main", "release_lock"),
            ],
        );
        let report = run(&p);
        assert_eq!(
            violation_summary(&report),
            vec![(
                "main".to_string(),
                "release_lock".to_string(),
                ids::CODE_DOUBLE_RELEASE
            )]
        );
        assert_eq!(report.violations()[0].edge.0, 2);
    }

    #[test]
    fn independent_lock_namespaces_do_not_interfere() {
        let mut cfg = config();
        cfg.namespaces.insert(
            "DB_LOCK".to_string(),
            NamespacePolicy::enabled(PolicyKind::Locking, Severity::Error),
        );
        let p = program(
            vec![
                callable("get_lock", &["LOCKING::TAKES"]),
                callable("db_begin", &["DB_LOCK::TAKES"]),
                callable("main", &[]),
            ],
            vec![
                edge_symbol("main", "get_lock"),
                edge_symbol("main", "db_begin"),
                edge_symbol("main", "db_begin"),
            ],
        );
        let report = evaluate(&p, &cfg).expect("evaluate");
        assert_eq!(report.violations().len(), 1);
        assert_eq!(report.violations()[0].namespace, "DB_LOCK");
        let finding = report
            .findings
            .iter()
            .find(|f| f.code == ids::CODE_DOUBLE_LOCK)
            .expect("double lock finding");
        assert_eq!(finding.check_id, "policy.db_lock");
    }

    #[test]
    fn locking_example_program_is_clean() {
        let mut callables = lock_api();
        callables.extend([
            callable("with_lock", &[]),
            opaque_param("critical_fn", Some("with_lock"), &["LOCKING::REQUIRED"]),
            closure("do_with_lock", Some("do_with_lock"), Some("with_lock"), &["LOCKING::TAKES"]),
            callable("worker", &[]),
            closure("critical_section", Some("critical_section"), Some("worker"), &["LOCKING::REQUIRED"]),
            callable("main", &["LOCKING::SPAWNER"]),
        ]);
        let mut invoke = edge_symbol("with_lock", "do_with_lock");
        invoke.indirection = Indirection::ClosureInvocation;
        let p = program(
            callables,
            vec![
                edge_symbol("do_with_lock", "get_lock"),
                edge_symbol("do_with_lock", "critical_fn"),
                invoke,
                edge_symbol("with_lock", "release_lock"),
                edge_symbol("critical_section", "increment_counter"),
                edge_symbol("critical_section", "usleep"),
                address_of("worker", "critical_section"),
                conditional(edge_symbol("worker", "with_lock")),
                edge_symbol("worker", "usleep"),
                edge_symbol("main", "pthread_create"),
                address_of("main", "worker"),
                edge_symbol("main", "printf"),
            ],
        );
        let report = run(&p);
        assert!(report.violations().is_empty(), "{:?}", violation_summary(&report));
        assert!(report.succeeded(), "{:?}", report.findings);
        assert_eq!(
            report.effective_tag("LOCKING", "with_lock"),
            Some(&Effective::tag("BALANCED"))
        );
    }

    #[test]
    fn closed_recursive_cycle_is_walked() {
        let p = program(
            vec![
                callable("get_lock", &["LOCKING::TAKES"]),
                callable("a", &[]),
                callable("b", &[]),
            ],
            vec![
                edge_symbol("a", "get_lock"),
                edge_symbol("a", "get_lock"),
                edge_symbol("a", "b"),
                edge_symbol("b", "a"),
            ],
        );
        let report = run(&p);
        let summary = violation_summary(&report);
        assert!(
            summary.contains(&(
                "a".to_string(),
                "get_lock".to_string(),
                ids::CODE_DOUBLE_LOCK
            )),
            "{summary:?}"
        );
        assert!(!report.succeeded());
    }

    #[test]
    fn deep_call_chain_is_analyzed() {
        let depth = 10_000;
        let mut callables = lock_api();
        let mut edges = Vec::new();
        for i in 0..depth {
            callables.push(callable(&format!("f{i}"), &[]));
            edges.push(edge_symbol(&format!("f{i}"), &format!("f{}", i + 1)));
        }
        callables.push(callable(&format!("f{depth}"), &[]));
        edges.push(edge_symbol(&format!("f{depth}"), "get_lock"));
        edges.push(edge_symbol("f0", "get_lock"));

        let report = run(&program(callables, edges));
        for name in ["f0", "f1"] {
            assert_eq!(
                report.effective_tag("LOCKING", name),
                Some(&Effective::tag("TAKES")),
                "{name}"
            );
        }
        assert_eq!(
            violation_summary(&report),
            vec![("f0".to_string(), "get_lock".to_string(), ids::CODE_DOUBLE_LOCK)]
        );
    }

    #[test]
    fn summary_counts_per_namespace() {
        let report = run(&scenario_a());
        let color = report
            .data
            .namespaces
            .iter()
            .find(|n| n.namespace == "COLOR")
            .expect("color summary");
        assert_eq!(color.kind, "color");
        assert_eq!(color.explicit, 3);
        assert_eq!(color.violations, 1);
        assert!(color.iterations >= 1);
        assert_eq!(report.data.callables_analyzed, 5);
        assert_eq!(report.data.edges_analyzed, 4);
    }
}
