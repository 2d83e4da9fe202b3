//! Stable identifiers for checks and finding codes.
//!
//! `check_id` is a dotted namespace. `code` is a short snake_case discriminator.

// Checks
pub const CHECK_ANNOTATIONS: &str = "annotations";
pub const CHECK_INFERENCE: &str = "inference";
pub const CHECK_CALLS: &str = "calls";
pub const CHECK_POLICY_COLOR: &str = "policy.color";
pub const CHECK_POLICY_LOCKING: &str = "policy.locking";

/// Prefix for policy checks registered under a custom namespace.
pub const CHECK_POLICY_PREFIX: &str = "policy.";

// Codes: annotations
pub const CODE_MALFORMED_ANNOTATION: &str = "malformed_annotation";
pub const CODE_UNKNOWN_TAG: &str = "unknown_tag";
pub const CODE_RESERVED_TAG: &str = "reserved_tag";
pub const CODE_INERT_ANNOTATION: &str = "inert_annotation";

// Codes: inference
pub const CODE_CONFLICTING_EXPLICIT_TAGS: &str = "conflicting_explicit_tags";
pub const CODE_INCONSISTENT_INFERENCE: &str = "inconsistent_inference";
pub const CODE_NO_FIXED_POINT: &str = "no_fixed_point";

// Codes: calls
pub const CODE_UNRESOLVED_CALL: &str = "unresolved_call";

// Codes: policy.color
pub const CODE_INCOMPATIBLE_COLOR: &str = "incompatible_color";

// Codes: policy.locking
pub const CODE_DOUBLE_LOCK: &str = "double_lock";
pub const CODE_DOUBLE_RELEASE: &str = "double_release";
pub const CODE_LOCK_NOT_HELD: &str = "lock_not_held";

// Codes: shared by all policies
pub const CODE_UNDEFINED_CALLEE_EFFECT: &str = "undefined_callee_effect";

// Tool-level
pub const CHECK_TOOL_RUNTIME: &str = "tool.runtime";
pub const CODE_RUNTIME_ERROR: &str = "runtime_error";

/// Check id used for findings of the policy registered under `namespace`.
pub fn policy_check_id(namespace: &str) -> String {
    format!("{CHECK_POLICY_PREFIX}{}", namespace.to_ascii_lowercase())
}
