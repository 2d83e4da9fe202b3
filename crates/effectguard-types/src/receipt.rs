use crate::SourcePath;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

/// Stable schema identifier for effectguard reports.
pub const SCHEMA_REPORT_V1: &str = "effectguard.report.v1";

/// Severity is intentionally small: it maps cleanly to CI signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub path: SourcePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
}

impl Location {
    pub fn at(path: &str, line: u32) -> Self {
        Self {
            path: SourcePath::new(path),
            line: Some(line),
            col: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    pub severity: Severity,
    pub check_id: String,
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Stable identifier intended for dedup and trending. A hash of
    /// `check_id + code + namespace + caller + callee + location`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Check-specific structured payload (kept open-ended for forward compatibility).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: JsonValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

/// Per-namespace summary of a propagation and verification pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct NamespaceSummary {
    pub namespace: String,
    pub kind: String,
    pub explicit: u32,
    pub inferred: u32,
    pub ambiguous: u32,
    pub iterations: u32,
    pub violations: u32,
}

/// Effectguard-specific summary payload for the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct EffectguardData {
    pub profile: String,

    pub callables_analyzed: u32,
    pub edges_analyzed: u32,

    #[serde(default)]
    pub namespaces: Vec<NamespaceSummary>,

    pub findings_total: u32,
    pub findings_emitted: u32,

    /// False iff any policy violation or ambiguity error exists, independent of severity.
    pub succeeded: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_reason: Option<String>,
}

/// A generic report envelope.
///
/// Keeping this generic allows tool-specific data while still enforcing a stable outer shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportEnvelope<TData = EffectguardData> {
    /// Versioned schema identifier for the envelope shape.
    pub schema: String,
    pub tool: ToolMeta,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[schemars(with = "String")]
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub data: TData,
}

pub type EffectguardReport = ReportEnvelope<EffectguardData>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finding_omits_empty_optional_fields() {
        let finding = Finding {
            severity: Severity::Warning,
            check_id: "annotations".to_string(),
            code: "inert_annotation".to_string(),
            message: "ignored".to_string(),
            location: None,
            help: None,
            url: None,
            fingerprint: None,
            data: JsonValue::Null,
        };
        let value = serde_json::to_value(&finding).expect("serialize");
        assert_eq!(
            value,
            json!({
                "severity": "warning",
                "check_id": "annotations",
                "code": "inert_annotation",
                "message": "ignored",
            })
        );
    }

    #[test]
    fn location_line_is_optional_on_input() {
        let loc: Location = serde_json::from_value(json!({"path": "./a.cpp"})).expect("parse");
        assert_eq!(loc.path.as_str(), "a.cpp");
        assert_eq!(loc.line, None);
    }
}
