use crate::{model::EffectguardConfigV1, presets};
use anyhow::Context;
use effectguard_domain::policies::{ColorPolicy, LockingPolicy, Policy, TagValidity};
use effectguard_domain::policy::{EffectiveConfig, FailOn, NamespacePolicy, PolicyKind};
use effectguard_types::Severity;
use globset::Glob;

#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub max_findings: Option<u32>,
    pub max_iterations: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub effective: EffectiveConfig,
}

pub fn resolve_config(
    cfg: EffectguardConfigV1,
    overrides: Overrides,
) -> anyhow::Result<ResolvedConfig> {
    let profile = overrides
        .profile
        .clone()
        .or(cfg.profile.clone())
        .unwrap_or_else(|| "strict".to_string());

    let mut effective = presets::preset(&profile);

    // max findings
    if let Some(mf) = overrides.max_findings.or(cfg.max_findings) {
        effective.max_findings = mf as usize;
    }

    // fixed-point bound
    if let Some(mi) = overrides.max_iterations.or(cfg.max_iterations) {
        if mi == 0 {
            anyhow::bail!("max_iterations must be at least 1");
        }
        effective.max_iterations = mi;
    }

    // per-namespace overrides
    for (namespace, nc) in cfg.namespaces.iter() {
        validate_namespace_name(namespace)?;

        let kind = match nc.kind.as_deref() {
            Some(k) => Some(
                parse_kind(k).with_context(|| format!("invalid kind for namespace {namespace}"))?,
            ),
            None => None,
        };
        let entry = match effective.namespaces.get_mut(namespace) {
            Some(existing) => existing,
            None => {
                let kind = kind.with_context(|| {
                    format!("namespace {namespace} is not predefined and needs a `kind`")
                })?;
                let default_severity = if effective.fail_on == FailOn::Warning {
                    Severity::Warning
                } else {
                    Severity::Error
                };
                effective
                    .namespaces
                    .entry(namespace.clone())
                    .or_insert_with(|| NamespacePolicy::enabled(kind, default_severity))
            }
        };

        if let Some(kind) = kind {
            entry.kind = kind;
        }
        if let Some(enabled) = nc.enabled {
            entry.enabled = enabled;
        }
        if let Some(sev) = nc.severity.as_deref() {
            entry.severity = parse_severity(sev)
                .with_context(|| format!("invalid severity for namespace {namespace}"))?;
        }
        if !nc.values.is_empty() {
            for v in &nc.values {
                validate_tag_name(namespace, v)?;
            }
            entry.values = nc.values.clone();
        }
        if !nc.allow.is_empty() {
            validate_allowlist(namespace, &nc.allow)?;
            entry.allow = nc.allow.clone();
        }
        if let Some(default) = nc.opaque_default.as_deref() {
            validate_opaque_default(namespace, entry, default)?;
            entry.opaque_default = Some(default.to_string());
        }
    }

    // fail_on override from config
    if let Some(fail_on_s) = cfg.fail_on.as_deref() {
        effective.fail_on = parse_fail_on(fail_on_s)?;
    }

    Ok(ResolvedConfig { effective })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_namespace_name(namespace: &str) -> anyhow::Result<()> {
    if !is_identifier(namespace) {
        anyhow::bail!("invalid namespace name: {namespace:?} (expected an identifier)");
    }
    Ok(())
}

fn validate_tag_name(namespace: &str, value: &str) -> anyhow::Result<()> {
    if !is_identifier(value) {
        anyhow::bail!("invalid tag value for namespace {namespace}: {value:?}");
    }
    Ok(())
}

fn validate_allowlist(namespace: &str, patterns: &[String]) -> anyhow::Result<()> {
    for pattern in patterns {
        Glob::new(pattern)
            .with_context(|| format!("invalid allow glob for {namespace}: {pattern}"))?;
    }
    Ok(())
}

fn validate_opaque_default(
    namespace: &str,
    policy: &NamespacePolicy,
    value: &str,
) -> anyhow::Result<()> {
    let validity = match policy.kind {
        PolicyKind::Color => ColorPolicy::new(namespace, &policy.values, None).validate_tag(value),
        PolicyKind::Locking => {
            LockingPolicy::new(namespace, &policy.values, None).validate_tag(value)
        }
    };
    match validity {
        TagValidity::Valid => Ok(()),
        TagValidity::Reserved => {
            anyhow::bail!("opaque_default for {namespace} uses reserved tag {value}")
        }
        TagValidity::Unknown => {
            anyhow::bail!("opaque_default for {namespace} is not a known tag: {value}")
        }
    }
}

fn parse_kind(v: &str) -> anyhow::Result<PolicyKind> {
    match v {
        "color" => Ok(PolicyKind::Color),
        "locking" => Ok(PolicyKind::Locking),
        other => anyhow::bail!("unknown kind: {other} (expected color|locking)"),
    }
}

fn parse_severity(v: &str) -> anyhow::Result<Severity> {
    match v {
        "info" => Ok(Severity::Info),
        "warning" | "warn" => Ok(Severity::Warning),
        "error" => Ok(Severity::Error),
        other => anyhow::bail!("unknown severity: {other} (expected info|warning|error)"),
    }
}

fn parse_fail_on(v: &str) -> anyhow::Result<FailOn> {
    match v {
        "error" => Ok(FailOn::Error),
        "warning" | "warn" => Ok(FailOn::Warning),
        other => anyhow::bail!("unknown fail_on: {other} (expected error|warning)"),
    }
}
