//! Extractor boundary: what the external AST collaborator hands to the builder.
//!
//! The domain never parses source. It consumes these plain records, either
//! constructed in memory or deserialized from a snapshot file by the IO layer.

use crate::model::{CallableKind, Indirection};
use effectguard_types::Location;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCallable {
    /// Extractor-assigned identifier, unique within one program.
    pub id: String,
    /// Absent for anonymous closures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: CallableKind,
    /// Identifier of the enclosing callable, if nested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Raw annotation text in declaration order. For a closure this is the
    /// annotation on its binding.
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// How a call site names its target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalleeRef {
    /// Exact extractor id of the target.
    Id(String),
    /// Name as written at the call site, resolved lexically by the builder.
    Symbol(String),
    /// Statically unresolvable target.
    Opaque,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEdge {
    pub caller: String,
    pub callee: CalleeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub indirection: Indirection,
    #[serde(default)]
    pub conditional: bool,
}

/// A non-callable declaration that carries annotations (variables, statements).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDeclaration {
    pub name: String,
    #[serde(default = "default_declaration_kind")]
    pub kind: String,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

fn default_declaration_kind() -> String {
    "variable".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProgram {
    #[serde(default)]
    pub callables: Vec<ExtractedCallable>,
    #[serde(default)]
    pub edges: Vec<ExtractedEdge>,
    #[serde(default)]
    pub declarations: Vec<ExtractedDeclaration>,
    /// Hard parse failures reported by the extractor. Any entry aborts the run.
    #[serde(default)]
    pub parse_errors: Vec<String>,
}

/// Read-only view of one extracted program.
///
/// Edges must be listed in body order per caller.
pub trait Extractor {
    fn callables(&self) -> &[ExtractedCallable];
    fn call_edges(&self) -> &[ExtractedEdge];
    fn declarations(&self) -> &[ExtractedDeclaration];
    fn parse_errors(&self) -> &[String];
}

impl Extractor for ExtractedProgram {
    fn callables(&self) -> &[ExtractedCallable] {
        &self.callables
    }

    fn call_edges(&self) -> &[ExtractedEdge] {
        &self.edges
    }

    fn declarations(&self) -> &[ExtractedDeclaration] {
        &self.declarations
    }

    fn parse_errors(&self) -> &[String] {
        &self.parse_errors
    }
}
