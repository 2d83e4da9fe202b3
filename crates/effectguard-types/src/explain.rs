//! Explain registry for checks and codes.
//!
//! Maps check IDs and codes to human-readable explanations with remediation guidance.

use crate::ids;

/// Explanation entry for a check or code.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Short description of the check/code.
    pub title: &'static str,
    /// What the check does and why it exists.
    pub description: &'static str,
    /// How to fix violations.
    pub remediation: &'static str,
    /// Before/after code examples.
    pub examples: ExamplePair,
    /// Tag vocabulary of the namespace the check belongs to, if it is namespace-specific.
    pub vocabulary: Option<Vocabulary>,
}

/// Built-in tags of one namespace, as written in `<Namespace>::<TAG>` annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    pub namespace: &'static str,
    pub tags: &'static [&'static str],
    /// Part of the vocabulary but rejected on callables.
    pub reserved: &'static [&'static str],
}

pub const COLOR_VOCABULARY: Vocabulary = Vocabulary {
    namespace: "COLOR",
    tags: &["RED", "BLUE", "YELLOW", "PURPLE"],
    reserved: &["GREEN"],
};

pub const LOCKING_VOCABULARY: Vocabulary = Vocabulary {
    namespace: "LOCKING",
    tags: &["REQUIRED", "TAKES", "RELEASES", "SPAWNER"],
    reserved: &[],
};

/// Before and after code examples.
#[derive(Debug, Clone)]
pub struct ExamplePair {
    /// Code that would trigger a finding.
    pub before: &'static str,
    /// Code that passes the check.
    pub after: &'static str,
}

/// Look up an explanation by check_id or code.
///
/// Returns `None` if the identifier is not recognized.
pub fn lookup_explanation(identifier: &str) -> Option<Explanation> {
    match identifier {
        // Check IDs
        ids::CHECK_ANNOTATIONS => Some(explain_annotations()),
        ids::CHECK_INFERENCE => Some(explain_inference()),
        ids::CHECK_CALLS => Some(explain_calls()),
        ids::CHECK_POLICY_COLOR => Some(explain_color()),
        ids::CHECK_POLICY_LOCKING => Some(explain_locking()),

        // Codes
        ids::CODE_MALFORMED_ANNOTATION => Some(explain_malformed_annotation()),
        ids::CODE_UNKNOWN_TAG => Some(explain_unknown_tag()),
        ids::CODE_RESERVED_TAG => Some(explain_reserved_tag()),
        ids::CODE_INERT_ANNOTATION => Some(explain_inert_annotation()),
        ids::CODE_CONFLICTING_EXPLICIT_TAGS => Some(explain_conflicting_explicit_tags()),
        ids::CODE_INCONSISTENT_INFERENCE => Some(explain_inconsistent_inference()),
        ids::CODE_NO_FIXED_POINT => Some(explain_no_fixed_point()),
        ids::CODE_UNRESOLVED_CALL => Some(explain_unresolved_call()),
        ids::CODE_INCOMPATIBLE_COLOR => Some(explain_incompatible_color()),
        ids::CODE_DOUBLE_LOCK => Some(explain_double_lock()),
        ids::CODE_DOUBLE_RELEASE => Some(explain_double_release()),
        ids::CODE_LOCK_NOT_HELD => Some(explain_lock_not_held()),
        ids::CODE_UNDEFINED_CALLEE_EFFECT => Some(explain_undefined_callee_effect()),

        _ => None,
    }
}

/// List all known check IDs.
pub fn all_check_ids() -> &'static [&'static str] {
    &[
        ids::CHECK_ANNOTATIONS,
        ids::CHECK_INFERENCE,
        ids::CHECK_CALLS,
        ids::CHECK_POLICY_COLOR,
        ids::CHECK_POLICY_LOCKING,
    ]
}

/// List all known codes.
pub fn all_codes() -> &'static [&'static str] {
    &[
        ids::CODE_MALFORMED_ANNOTATION,
        ids::CODE_UNKNOWN_TAG,
        ids::CODE_RESERVED_TAG,
        ids::CODE_INERT_ANNOTATION,
        ids::CODE_CONFLICTING_EXPLICIT_TAGS,
        ids::CODE_INCONSISTENT_INFERENCE,
        ids::CODE_NO_FIXED_POINT,
        ids::CODE_UNRESOLVED_CALL,
        ids::CODE_INCOMPATIBLE_COLOR,
        ids::CODE_DOUBLE_LOCK,
        ids::CODE_DOUBLE_RELEASE,
        ids::CODE_LOCK_NOT_HELD,
        ids::CODE_UNDEFINED_CALLEE_EFFECT,
    ]
}

// --- Check-level explanations ---

fn explain_annotations() -> Explanation {
    Explanation {
        title: "Annotation Resolution",
        description: "\
Parses annotation text of the form `<Namespace>::<TAG>` attached to declarations.

Problems found here are never fatal. The offending annotation is dropped and the
declaration is analyzed as if it were untagged:
- text that is not `<Namespace>::<TAG>` is malformed
- a tag outside the namespace's vocabulary is unknown
- a reserved tag (COLOR::GREEN) is rejected on callables
- annotations on variables or statements are inert",
        remediation: "\
Attach annotations only to functions, closure bindings, or function parameters,
and spell them exactly as `<Namespace>::<TAG>` using a tag declared for that
namespace (extend the vocabulary with `values = [...]` in effectguard.toml).",
        examples: ExamplePair {
            before: r#"[[clang::annotate("COLOR:RED")]] int main();
[[clang::annotate("COLOR::GREEN")]] int r = 0;"#,
            after: r#"[[clang::annotate("COLOR::RED")]] int main();
int r = 0;"#,
        },
        vocabulary: None,
    }
}

fn explain_inference() -> Explanation {
    Explanation {
        title: "Tag Inference",
        description: "\
Untagged callables receive an effective tag by combining the effective tags of
their callees. When no single consistent tag exists the callable's tag is
undefined, and every check against it fails closed.

Ambiguity arises when:
- two different explicit tags share one namespace on the same callable
- callees disagree and the policy has no dominant value
- recursion prevents the fixed point from converging within the iteration bound",
        remediation: "\
Tag the callable explicitly, or split it so each part calls callees of a single
tag. For COLOR, route the mixed calls through a PURPLE boundary function.",
        examples: ExamplePair {
            before: r#"int helper() { return red_fn() + blue_fn(); }"#,
            after: r#"COLOR(PURPLE) int helper() { return red_fn() + blue_fn(); }"#,
        },
        vocabulary: None,
    }
}

fn explain_calls() -> Explanation {
    Explanation {
        title: "Call Resolution",
        description: "\
Call sites whose target cannot be resolved are attached to an opaque node. Opaque
nodes carry the namespace's configured default tag (neutral when unset) and are
not analyzed further.",
        remediation: "\
Provide the callee to the extractor, annotate the external prototype, or set
`opaque_default` for the namespace in effectguard.toml.",
        examples: ExamplePair {
            before: r#"int main() { return external_fn(); }"#,
            after: r#"COLOR(PURPLE) int external_fn();
int main() { return external_fn(); }"#,
        },
        vocabulary: None,
    }
}

fn explain_color() -> Explanation {
    Explanation {
        title: "Color Compatibility",
        description: "\
Each callable may be colored. A call is allowed when caller and callee share a
color, or when either side is PURPLE. PURPLE is a sanctioned boundary: it may
call any color, any color may call it, and its callees' colors are not
propagated through it.",
        remediation: "\
Call only same-colored functions, or wrap the call in a PURPLE function.",
        examples: ExamplePair {
            before: r#"COLOR(BLUE) int ret0();
COLOR(RED) int main() { return ret0(); }"#,
            after: r#"COLOR(BLUE) int ret0();
COLOR(PURPLE) int ret_wrapper() { return ret0(); }
COLOR(RED) int main() { return ret_wrapper(); }"#,
        },
        vocabulary: Some(COLOR_VOCABULARY),
    }
}

fn explain_locking() -> Explanation {
    Explanation {
        title: "Lock State Discipline",
        description: "\
Tracks an abstract lock (UNLOCKED / LOCKED) along every call path.
- REQUIRED callables must be entered LOCKED
- TAKES callables must be entered UNLOCKED and exit LOCKED
- RELEASES callables must be entered LOCKED and exit UNLOCKED
- SPAWNER bodies start UNLOCKED and never affect their spawn site",
        remediation: "\
Acquire the lock before calling REQUIRED functions, and pair every TAKES with
exactly one RELEASES on each path.",
        examples: ExamplePair {
            before: r#"get_lock();
get_lock();
increment_counter();"#,
            after: r#"get_lock();
increment_counter();
release_lock();"#,
        },
        vocabulary: Some(LOCKING_VOCABULARY),
    }
}

// --- Code-level explanations ---

fn explain_malformed_annotation() -> Explanation {
    let mut exp = explain_annotations();
    exp.title = "Malformed Annotation";
    exp
}

fn explain_unknown_tag() -> Explanation {
    let mut exp = explain_annotations();
    exp.title = "Unknown Tag";
    exp
}

fn explain_reserved_tag() -> Explanation {
    let mut exp = explain_annotations();
    exp.title = "Reserved Tag On Callable";
    exp.vocabulary = Some(COLOR_VOCABULARY);
    exp
}

fn explain_inert_annotation() -> Explanation {
    let mut exp = explain_annotations();
    exp.title = "Inert Annotation";
    exp
}

fn explain_conflicting_explicit_tags() -> Explanation {
    Explanation {
        title: "Conflicting Explicit Tags",
        description: "\
A callable carries two different explicit tags in the same namespace, for
example a declaration and a definition that disagree. Its tag is undefined.",
        remediation: "Keep exactly one tag per namespace on each callable.",
        examples: ExamplePair {
            before: r#"COLOR(RED) int f();
COLOR(BLUE) int f() { return 0; }"#,
            after: r#"COLOR(RED) int f();
COLOR(RED) int f() { return 0; }"#,
        },
        vocabulary: None,
    }
}

fn explain_inconsistent_inference() -> Explanation {
    let mut exp = explain_inference();
    exp.title = "Inconsistent Inference";
    exp
}

fn explain_no_fixed_point() -> Explanation {
    let mut exp = explain_inference();
    exp.title = "No Fixed Point";
    exp
}

fn explain_unresolved_call() -> Explanation {
    let mut exp = explain_calls();
    exp.title = "Unresolved Call";
    exp
}

fn explain_incompatible_color() -> Explanation {
    let mut exp = explain_color();
    exp.title = "Incompatible Color";
    exp
}

fn explain_double_lock() -> Explanation {
    Explanation {
        title: "Double Lock",
        description: "\
A TAKES callable (or a callable that internally acquires the lock) is invoked
while the lock is already held on this path.",
        remediation: "Release the lock before acquiring it again.",
        examples: ExamplePair {
            before: r#"get_lock();
get_lock();"#,
            after: r#"get_lock();
release_lock();
get_lock();"#,
        },
        vocabulary: Some(LOCKING_VOCABULARY),
    }
}

fn explain_double_release() -> Explanation {
    Explanation {
        title: "Double Release",
        description: "A RELEASES callable is invoked while the lock is not held on this path.",
        remediation: "Only release a lock that was acquired on the same path.",
        examples: ExamplePair {
            before: r#"release_lock();"#,
            after: r#"get_lock();
release_lock();"#,
        },
        vocabulary: Some(LOCKING_VOCABULARY),
    }
}

fn explain_lock_not_held() -> Explanation {
    Explanation {
        title: "Lock Not Held",
        description: "A REQUIRED callable is invoked while the lock is not held on this path.",
        remediation: "Acquire the lock (a TAKES call) before the REQUIRED call.",
        examples: ExamplePair {
            before: r#"increment_counter();"#,
            after: r#"get_lock();
increment_counter();
release_lock();"#,
        },
        vocabulary: Some(LOCKING_VOCABULARY),
    }
}

fn explain_undefined_callee_effect() -> Explanation {
    Explanation {
        title: "Undefined Callee Effect",
        description: "\
The callee's effective tag could not be inferred (see `inference`). Checks
against an undefined tag are denied so that unsound inference never passes.",
        remediation: "Resolve the callee's ambiguity by tagging it explicitly.",
        examples: ExamplePair {
            before: r#"COLOR(RED) int main() { return helper(); } // helper is ambiguous"#,
            after: r#"COLOR(RED) int main() { return red_helper(); }"#,
        },
        vocabulary: None,
    }
}
