//! Report (de)serialization and mapping onto the renderable model.

use anyhow::Context;
use effectguard_render::{
    RenderableData, RenderableFinding, RenderableLocation, RenderableNamespace, RenderableReport,
    RenderableSeverity, RenderableVerdictStatus,
};
use effectguard_types::{
    EffectguardData, EffectguardReport, Finding, SCHEMA_REPORT_V1, Severity, ToolMeta, Verdict,
    ids,
};
use time::OffsetDateTime;

pub fn parse_report_json(text: &str) -> anyhow::Result<EffectguardReport> {
    let value: serde_json::Value = serde_json::from_str(text).context("parse report json")?;

    let schema = value
        .get("schema")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if schema != SCHEMA_REPORT_V1 {
        anyhow::bail!("unknown report schema: {schema:?} (expected {SCHEMA_REPORT_V1})");
    }

    serde_json::from_value(value).context("parse effectguard report")
}

pub fn serialize_report(report: &EffectguardReport) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(report).context("serialize report")
}

pub fn to_renderable(report: &EffectguardReport) -> RenderableReport {
    let d = &report.data;
    RenderableReport {
        verdict: match report.verdict {
            Verdict::Pass => RenderableVerdictStatus::Pass,
            Verdict::Warn => RenderableVerdictStatus::Warn,
            Verdict::Fail => RenderableVerdictStatus::Fail,
        },
        findings: report.findings.iter().map(renderable_finding).collect(),
        data: RenderableData {
            profile: d.profile.clone(),
            callables_analyzed: d.callables_analyzed,
            edges_analyzed: d.edges_analyzed,
            namespaces: d
                .namespaces
                .iter()
                .map(|n| RenderableNamespace {
                    namespace: n.namespace.clone(),
                    kind: n.kind.clone(),
                    explicit: n.explicit,
                    inferred: n.inferred,
                    ambiguous: n.ambiguous,
                    violations: n.violations,
                })
                .collect(),
            findings_emitted: d.findings_emitted,
            findings_total: d.findings_total,
            succeeded: d.succeeded,
            truncated_reason: d.truncated_reason.clone(),
        },
    }
}

fn renderable_finding(f: &Finding) -> RenderableFinding {
    RenderableFinding {
        severity: match f.severity {
            Severity::Info => RenderableSeverity::Info,
            Severity::Warning => RenderableSeverity::Warning,
            Severity::Error => RenderableSeverity::Error,
        },
        check_id: f.check_id.clone(),
        code: f.code.clone(),
        message: f.message.clone(),
        location: f.location.as_ref().map(|loc| RenderableLocation {
            path: loc.path.as_str().to_string(),
            line: loc.line,
            col: loc.col,
        }),
        help: f.help.clone(),
    }
}

/// A failing report carrying a single `tool.runtime` finding, written when the run aborts.
pub fn runtime_error_report(profile: &str, message: &str) -> EffectguardReport {
    let now = OffsetDateTime::now_utc();
    EffectguardReport {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: "effectguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        started_at: now,
        finished_at: now,
        verdict: Verdict::Fail,
        findings: vec![Finding {
            severity: Severity::Error,
            check_id: ids::CHECK_TOOL_RUNTIME.to_string(),
            code: ids::CODE_RUNTIME_ERROR.to_string(),
            message: message.to_string(),
            location: None,
            help: Some("Fix the tool error and re-run effectguard.".to_string()),
            url: None,
            fingerprint: None,
            data: serde_json::Value::Null,
        }],
        data: EffectguardData {
            profile: profile.to_string(),
            findings_total: 1,
            findings_emitted: 1,
            succeeded: false,
            ..EffectguardData::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_error_report_round_trips() {
        let report = runtime_error_report("strict", "boom");
        let bytes = serialize_report(&report).expect("serialize");
        let text = String::from_utf8(bytes).expect("utf8");
        let parsed = parse_report_json(&text).expect("parse");
        assert_eq!(parsed.verdict, Verdict::Fail);
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].code, ids::CODE_RUNTIME_ERROR);
        assert!(!parsed.data.succeeded);
    }

    #[test]
    fn rejects_foreign_schema() {
        let err = parse_report_json(r#"{"schema": "other.report.v1"}"#).expect_err("must fail");
        assert!(err.to_string().contains("unknown report schema"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_report_json("not json").is_err());
    }

    #[test]
    fn renderable_carries_summary_and_findings() {
        let report = runtime_error_report("warn", "snapshot missing");
        let r = to_renderable(&report);
        assert_eq!(r.verdict, RenderableVerdictStatus::Fail);
        assert_eq!(r.data.profile, "warn");
        assert!(!r.data.succeeded);
        assert_eq!(r.findings[0].check_id, ids::CHECK_TOOL_RUNTIME);
        assert_eq!(r.findings[0].severity, RenderableSeverity::Error);
    }
}
