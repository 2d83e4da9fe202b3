use effectguard_types::Severity;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    Error,
    Warning,
}

/// Which built-in policy implementation verifies a namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    Color,
    Locking,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Color => "color",
            PolicyKind::Locking => "locking",
        }
    }
}

#[derive(Clone, Debug)]
pub struct NamespacePolicy {
    pub enabled: bool,
    pub kind: PolicyKind,
    /// Severity of policy violations in this namespace.
    pub severity: Severity,
    /// Tag values accepted in addition to the kind's built-in vocabulary.
    pub values: Vec<String>,
    /// Effective tag of opaque nodes that carry no explicit tag. `None` means neutral.
    pub opaque_default: Option<String>,
    /// Globs on caller names whose violations are suppressed.
    pub allow: Vec<String>,
}

impl NamespacePolicy {
    pub fn enabled(kind: PolicyKind, severity: Severity) -> Self {
        Self {
            enabled: true,
            kind,
            severity,
            values: Vec::new(),
            opaque_default: None,
            allow: Vec::new(),
        }
    }

    pub fn disabled(kind: PolicyKind) -> Self {
        Self {
            enabled: false,
            kind,
            severity: Severity::Info,
            values: Vec::new(),
            opaque_default: None,
            allow: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EffectiveConfig {
    pub profile: String,
    pub fail_on: FailOn,
    pub max_findings: usize,
    /// Upper bound on full passes per component during inference.
    pub max_iterations: u32,
    pub namespaces: BTreeMap<String, NamespacePolicy>,
}

impl EffectiveConfig {
    pub fn namespace_policy(&self, namespace: &str) -> Option<&NamespacePolicy> {
        self.namespaces.get(namespace).filter(|p| p.enabled)
    }

    pub fn enabled_namespaces(&self) -> impl Iterator<Item = (&str, &NamespacePolicy)> + '_ {
        self.namespaces
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(ns, p)| (ns.as_str(), p))
    }
}
