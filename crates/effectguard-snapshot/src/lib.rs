//! Snapshot adapter: reads the call-graph snapshot an external source extractor writes.
//!
//! This crate is allowed to do filesystem IO. It never parses source code itself;
//! the snapshot is the extractor's complete view of one program.

#![forbid(unsafe_code)]

use anyhow::Context;
use camino::Utf8Path;
use effectguard_domain::extract::ExtractedProgram;
use serde_json::Value;

/// Optional `schema` marker a snapshot may carry.
pub const SCHEMA_SNAPSHOT_V1: &str = "effectguard.snapshot.v1";

/// Read and parse a snapshot file.
pub fn load_snapshot(path: &Utf8Path) -> anyhow::Result<ExtractedProgram> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    parse_snapshot_json(&text).with_context(|| format!("parse snapshot {path}"))
}

/// Parse snapshot JSON text. **Never panics** on any input.
pub fn parse_snapshot_json(text: &str) -> anyhow::Result<ExtractedProgram> {
    let value: Value = serde_json::from_str(text).context("snapshot is not valid JSON")?;

    if let Some(schema) = value.get("schema") {
        match schema.as_str() {
            Some(SCHEMA_SNAPSHOT_V1) => {}
            Some(other) => anyhow::bail!(
                "unsupported snapshot schema: {other} (expected {SCHEMA_SNAPSHOT_V1})"
            ),
            None => anyhow::bail!("snapshot `schema` must be a string"),
        }
    }

    serde_json::from_value(value).context("snapshot does not match the expected shape")
}
