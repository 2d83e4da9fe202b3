use super::{Ambiguity, CalleeEffect, Decision, Policy, TagValidity, deny_undefined_callee};
use crate::effect::Effective;
use crate::model::CallEdge;
use crate::policy::PolicyKind;
use effectguard_types::ids;
use std::collections::BTreeSet;

pub const RED: &str = "RED";
pub const BLUE: &str = "BLUE";
pub const YELLOW: &str = "YELLOW";
/// Sanctioned boundary between colors.
pub const PURPLE: &str = "PURPLE";
/// In the vocabulary but invalid on callables.
pub const GREEN: &str = "GREEN";

const BUILTIN: &[&str] = &[RED, BLUE, YELLOW, PURPLE, GREEN];

/// Color-compatibility lattice.
///
/// Same colors may call each other. PURPLE may call anything and be called by
/// anything. In inference PURPLE never outvotes a real color, so it cannot leak
/// the colors it touches; a callable that calls only PURPLE is itself PURPLE.
#[derive(Debug)]
pub struct ColorPolicy {
    namespace: String,
    vocabulary: BTreeSet<String>,
    opaque_default: Option<String>,
}

impl ColorPolicy {
    pub fn new(namespace: &str, extra_values: &[String], opaque_default: Option<String>) -> Self {
        let mut vocabulary: BTreeSet<String> = BUILTIN.iter().map(|s| s.to_string()).collect();
        vocabulary.extend(extra_values.iter().cloned());
        Self {
            namespace: namespace.to_string(),
            vocabulary,
            opaque_default,
        }
    }
}

impl Policy for ColorPolicy {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Color
    }

    fn validate_tag(&self, value: &str) -> TagValidity {
        if value == GREEN {
            TagValidity::Reserved
        } else if self.vocabulary.contains(value) {
            TagValidity::Valid
        } else {
            TagValidity::Unknown
        }
    }

    fn opaque_default(&self) -> Effective {
        match &self.opaque_default {
            Some(v) => Effective::tag(v.clone()),
            None => Effective::Neutral,
        }
    }

    fn combine(&self, callees: &[CalleeEffect<'_>]) -> Result<Effective, Ambiguity> {
        let mut colors: BTreeSet<&str> = BTreeSet::new();
        let mut purple = false;
        for c in callees {
            if c.defaulted {
                continue;
            }
            match c.effective {
                Effective::Tag(v) if v == PURPLE => purple = true,
                Effective::Tag(v) => {
                    colors.insert(v.as_str());
                }
                Effective::Neutral => {}
                Effective::Undefined => {
                    return Err(Ambiguity::new("a callee's color is undefined"));
                }
            }
        }
        let mut iter = colors.iter();
        match (iter.next(), iter.next()) {
            (None, _) if purple => Ok(Effective::tag(PURPLE)),
            (None, _) => Ok(Effective::Neutral),
            (Some(only), None) => Ok(Effective::tag(*only)),
            (Some(_), Some(_)) => Err(Ambiguity::new(format!(
                "callees have different colors ({})",
                colors.iter().copied().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    fn check(&self, caller: &Effective, callee: &Effective, _edge: &CallEdge) -> Decision {
        let caller = match caller {
            Effective::Tag(c) => c,
            Effective::Neutral => return Decision::Allow,
            Effective::Undefined => return Decision::Allow,
        };
        let callee = match callee {
            Effective::Tag(c) => c,
            Effective::Neutral => return Decision::Allow,
            Effective::Undefined => return deny_undefined_callee(),
        };
        if caller == callee || caller == PURPLE || callee == PURPLE {
            return Decision::Allow;
        }
        Decision::Deny {
            code: ids::CODE_INCOMPATIBLE_COLOR,
            rule: format!("{caller} may not call {callee}"),
        }
    }
}
