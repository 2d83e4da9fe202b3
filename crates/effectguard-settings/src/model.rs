use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `effectguard.toml` schema v1.
///
/// This is a *user-facing* config model: it is intentionally permissive so forward-compat is easy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectguardConfigV1 {
    /// Optional schema string for tooling (`effectguard.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// When to fail the check: `error` (default) or `warning`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on: Option<String>,

    /// How many findings to emit before truncating the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_findings: Option<u32>,

    /// Upper bound on inference passes per call-graph component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Map of annotation namespace -> policy config.
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceConfig {
    /// Policy implementation: `color` or `locking`. Required for namespaces the preset does not define.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Override preset enable/disable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Override preset severity: `info`, `warning`, `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Extra tag values accepted beyond the kind's built-in vocabulary.
    #[serde(default)]
    pub values: Vec<String>,

    /// Effective tag of opaque call targets that carry no explicit tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque_default: Option<String>,

    /// Glob patterns on caller names whose violations are suppressed.
    #[serde(default)]
    pub allow: Vec<String>,
}
