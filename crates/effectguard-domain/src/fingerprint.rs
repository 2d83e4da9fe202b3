use sha2::{Digest, Sha256};

/// Compute a stable SHA-256 fingerprint for a finding.
///
/// Identity fields:
/// - check_id
/// - code
/// - namespace (empty when the finding is not namespaced)
/// - subject (caller name, callable name, or declaration name)
/// - object (callee name for edge findings, annotation text otherwise)
/// - location as `path:line` when present
pub fn fingerprint_for(
    check_id: &str,
    code: &str,
    namespace: &str,
    subject: &str,
    object: &str,
    location: Option<&str>,
) -> String {
    let mut parts = vec![check_id, code, namespace, subject, object];
    if let Some(l) = location {
        parts.push(l);
    }
    let canonical = parts.join("|");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = fingerprint_for("policy.color", "incompatible_color", "COLOR", "main", "f", None);
        let b = fingerprint_for("policy.color", "incompatible_color", "COLOR", "main", "f", None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn location_changes_fingerprint() {
        let a = fingerprint_for("calls", "unresolved_call", "", "main", "ext", Some("a.cpp:3"));
        let b = fingerprint_for("calls", "unresolved_call", "", "main", "ext", Some("a.cpp:4"));
        assert_ne!(a, b);
    }
}
