//! Annotation Resolver: raw `<Namespace>::<TAG>` text into structured tags.
//!
//! Every problem here is local and non-fatal. The offending annotation is
//! dropped with a warning and analysis continues.

use crate::extract::ExtractedDeclaration;
use crate::model::Tag;
use crate::policies::{PolicyRegistry, TagValidity};
use crate::report::Diagnostic;
use effectguard_types::{Location, Severity, ids};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotation '{text}' is not of the form <Namespace>::<TAG>")]
    Malformed { text: String },
    #[error("'{value}' is not a known {namespace} tag")]
    UnknownTag { namespace: String, value: String },
    #[error("{namespace}::{value} is reserved and cannot be attached to a callable")]
    ReservedTag { namespace: String, value: String },
}

impl AnnotationError {
    pub fn code(&self) -> &'static str {
        match self {
            AnnotationError::Malformed { .. } => ids::CODE_MALFORMED_ANNOTATION,
            AnnotationError::UnknownTag { .. } => ids::CODE_UNKNOWN_TAG,
            AnnotationError::ReservedTag { .. } => ids::CODE_RESERVED_TAG,
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse `<Namespace>::<TAG>`. Surrounding whitespace is ignored.
pub fn parse_annotation(text: &str) -> Result<Tag, AnnotationError> {
    let malformed = || AnnotationError::Malformed {
        text: text.to_string(),
    };
    let (namespace, value) = text.trim().split_once("::").ok_or_else(malformed)?;
    if !is_identifier(namespace) || !is_identifier(value) {
        return Err(malformed());
    }
    Ok(Tag::new(namespace, value))
}

/// Explicit tags resolved for one callable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedTags {
    pub tags: BTreeMap<String, String>,
    /// Namespaces where different explicit values were declared.
    pub conflicting: BTreeSet<String>,
}

pub struct AnnotationResolver<'r> {
    registry: &'r PolicyRegistry,
}

impl<'r> AnnotationResolver<'r> {
    pub fn new(registry: &'r PolicyRegistry) -> Self {
        Self { registry }
    }

    /// Parse and validate one annotation on a callable.
    ///
    /// `Ok(None)` means the namespace has no registered policy and the annotation is ignored.
    pub fn resolve(&self, text: &str) -> Result<Option<Tag>, AnnotationError> {
        let tag = parse_annotation(text)?;
        let Some(policy) = self.registry.get(&tag.namespace) else {
            return Ok(None);
        };
        match policy.validate_tag(&tag.value) {
            TagValidity::Valid => Ok(Some(tag)),
            TagValidity::Unknown => Err(AnnotationError::UnknownTag {
                namespace: tag.namespace,
                value: tag.value,
            }),
            TagValidity::Reserved => Err(AnnotationError::ReservedTag {
                namespace: tag.namespace,
                value: tag.value,
            }),
        }
    }

    /// Resolve every annotation attached to a callable.
    ///
    /// The same value repeated in a namespace is accepted once; a different value
    /// marks the namespace as conflicting.
    pub fn resolve_callable(
        &self,
        subject: &str,
        annotations: &[String],
        location: Option<&Location>,
        diags: &mut Vec<Diagnostic>,
    ) -> ResolvedTags {
        let mut out = ResolvedTags::default();
        let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for text in annotations {
            match self.resolve(text) {
                Ok(Some(tag)) => {
                    seen.entry(tag.namespace.clone())
                        .or_default()
                        .insert(tag.value.clone());
                    out.tags.entry(tag.namespace).or_insert(tag.value);
                }
                Ok(None) => {
                    debug!(callable = subject, annotation = %text, "foreign annotation ignored");
                }
                Err(err) => {
                    debug!(callable = subject, annotation = %text, error = %err, "annotation dropped");
                    diags.push(annotation_diagnostic(subject, text, &err, location));
                }
            }
        }

        for (namespace, values) in seen {
            if values.len() < 2 {
                continue;
            }
            let listed: Vec<&str> = values.iter().map(String::as_str).collect();
            diags.push(Diagnostic {
                severity: Severity::Error,
                check_id: ids::CHECK_INFERENCE.to_string(),
                code: ids::CODE_CONFLICTING_EXPLICIT_TAGS,
                message: format!(
                    "{namespace}: '{subject}' carries conflicting explicit tags ({})",
                    listed.join(", ")
                ),
                location: location.cloned(),
                subject: subject.to_string(),
                namespace: Some(namespace.clone()),
                data: json!({ "tags": listed }),
            });
            out.conflicting.insert(namespace);
        }
        out
    }

    /// Annotations on variables and statements never become tags.
    ///
    /// Those in a registered namespace are reported as inert; malformed text is
    /// reported as malformed.
    pub fn resolve_declaration(&self, decl: &ExtractedDeclaration, diags: &mut Vec<Diagnostic>) {
        for text in &decl.annotations {
            match parse_annotation(text) {
                Ok(tag) if self.registry.contains(&tag.namespace) => {
                    diags.push(Diagnostic {
                        severity: Severity::Warning,
                        check_id: ids::CHECK_ANNOTATIONS.to_string(),
                        code: ids::CODE_INERT_ANNOTATION,
                        message: format!(
                            "annotation '{tag}' on {} '{}' has no effect",
                            decl.kind, decl.name
                        ),
                        location: decl.location.clone(),
                        subject: decl.name.clone(),
                        namespace: Some(tag.namespace.clone()),
                        data: json!({ "annotation": text, "declaration_kind": decl.kind }),
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    diags.push(annotation_diagnostic(
                        &decl.name,
                        text,
                        &err,
                        decl.location.as_ref(),
                    ));
                }
            }
        }
    }
}

fn annotation_diagnostic(
    subject: &str,
    text: &str,
    err: &AnnotationError,
    location: Option<&Location>,
) -> Diagnostic {
    let namespace = match err {
        AnnotationError::Malformed { .. } => None,
        AnnotationError::UnknownTag { namespace, .. }
        | AnnotationError::ReservedTag { namespace, .. } => Some(namespace.clone()),
    };
    Diagnostic {
        severity: Severity::Warning,
        check_id: ids::CHECK_ANNOTATIONS.to_string(),
        code: err.code(),
        message: format!("{err} (on '{subject}'); annotation ignored"),
        location: location.cloned(),
        subject: subject.to_string(),
        namespace,
        data: json!({ "annotation": text }),
    }
}
