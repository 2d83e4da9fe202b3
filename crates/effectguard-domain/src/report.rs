use crate::effect::{EffectTable, Effective};
use crate::model::{CallGraph, EdgeId};
use effectguard_types::{EffectguardData, Finding, Location, Severity, Verdict};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct SeverityCounts {
    pub info: u32,
    pub warning: u32,
    pub error: u32,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = SeverityCounts::default();
        for f in findings {
            match f.severity {
                Severity::Info => counts.info += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Error => counts.error += 1,
            }
        }
        counts
    }
}

/// A problem found before verification: annotation issues, unresolved calls, ambiguity.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub check_id: String,
    pub code: &'static str,
    pub message: String,
    pub location: Option<Location>,
    /// Name of the callable or declaration the diagnostic is about.
    pub subject: String,
    pub namespace: Option<String>,
    pub data: JsonValue,
}

/// A denied call edge in one namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub edge: EdgeId,
    pub namespace: String,
    pub code: &'static str,
    /// Human-readable reason the edge was denied.
    pub rule: String,
}

#[derive(Clone, Debug)]
pub struct DomainReport {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub data: EffectguardData,
    pub counts: SeverityCounts,
    pub graph: CallGraph,
    pub effects: BTreeMap<String, EffectTable>,
    violations: Vec<Violation>,
}

impl DomainReport {
    pub(crate) fn new(
        verdict: Verdict,
        findings: Vec<Finding>,
        data: EffectguardData,
        graph: CallGraph,
        effects: BTreeMap<String, EffectTable>,
        violations: Vec<Violation>,
    ) -> Self {
        let counts = SeverityCounts::from_findings(&findings);
        Self {
            verdict,
            findings,
            data,
            counts,
            graph,
            effects,
            violations,
        }
    }

    /// Every policy violation, deduplicated by `(edge, namespace)`, in stable order.
    ///
    /// Not affected by `max_findings` truncation.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// False iff any violation or ambiguity error exists.
    pub fn succeeded(&self) -> bool {
        self.data.succeeded
    }

    /// Effective tag of the first callable named `name` in `namespace`.
    pub fn effective_tag(&self, namespace: &str, name: &str) -> Option<&Effective> {
        let table = self.effects.get(namespace)?;
        let callable = self.graph.find_by_name(name)?;
        Some(table.get(callable.id))
    }
}
