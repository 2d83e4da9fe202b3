use effectguard_domain::policy::{EffectiveConfig, FailOn, NamespacePolicy, PolicyKind};
use effectguard_types::Severity;
use std::collections::BTreeMap;

pub const DEFAULT_MAX_FINDINGS: usize = 200;
pub const DEFAULT_MAX_ITERATIONS: u32 = 64;

/// Preset profiles are opinionated defaults.
///
/// Keep these small and readable. Anything complex should go into repo config.
pub fn preset(profile: &str) -> EffectiveConfig {
    match profile {
        "warn" => warn_profile(),
        // default
        _ => strict_profile(),
    }
}

fn strict_profile() -> EffectiveConfig {
    EffectiveConfig {
        profile: "strict".to_string(),
        fail_on: FailOn::Error,
        max_findings: DEFAULT_MAX_FINDINGS,
        max_iterations: DEFAULT_MAX_ITERATIONS,
        namespaces: default_namespaces(Severity::Error),
    }
}

fn warn_profile() -> EffectiveConfig {
    EffectiveConfig {
        profile: "warn".to_string(),
        fail_on: FailOn::Warning,
        max_findings: DEFAULT_MAX_FINDINGS,
        max_iterations: DEFAULT_MAX_ITERATIONS,
        namespaces: default_namespaces(Severity::Warning),
    }
}

fn default_namespaces(default_severity: Severity) -> BTreeMap<String, NamespacePolicy> {
    let mut m = BTreeMap::new();

    m.insert(
        "COLOR".to_string(),
        NamespacePolicy::enabled(PolicyKind::Color, default_severity),
    );
    m.insert(
        "LOCKING".to_string(),
        NamespacePolicy::enabled(PolicyKind::Locking, default_severity),
    );

    m
}
