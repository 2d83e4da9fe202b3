//! Stable DTOs and IDs used across the effectguard workspace.
//!
//! This crate is intentionally boring:
//! - data types for the emitted report
//! - stable string IDs and codes
//! - canonical source path handling
//! - explain registry for remediation guidance

#![forbid(unsafe_code)]

pub mod explain;
pub mod ids;
pub mod path;
pub mod receipt;

pub use explain::{ExamplePair, Explanation, Vocabulary, lookup_explanation};
pub use path::SourcePath;
pub use receipt::{
    EffectguardData, EffectguardReport, Finding, Location, NamespaceSummary, ReportEnvelope,
    SCHEMA_REPORT_V1, Severity, ToolMeta, Verdict,
};
