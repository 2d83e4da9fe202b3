//! The `check` use case: load a call-graph snapshot, evaluate policies, produce a report.

use anyhow::Context;
use camino::Utf8Path;
use effectguard_settings::{EffectguardConfigV1, Overrides, ResolvedConfig};
use effectguard_types::{EffectguardReport, ReportEnvelope, SCHEMA_REPORT_V1, ToolMeta, Verdict};
use time::OffsetDateTime;
use tracing::info;

/// Input for the check use case.
#[derive(Clone, Debug)]
pub struct CheckInput<'a> {
    /// Snapshot written by the source extractor.
    pub graph_path: &'a Utf8Path,
    /// Config file contents (empty string if not found).
    pub config_text: &'a str,
    /// CLI overrides.
    pub overrides: Overrides,
}

/// Output from the check use case.
#[derive(Clone, Debug)]
pub struct CheckOutput {
    pub report: EffectguardReport,
    pub resolved_config: ResolvedConfig,
}

/// Run the check use case: parse config, load the snapshot, evaluate, produce a report.
pub fn run_check(input: CheckInput<'_>) -> anyhow::Result<CheckOutput> {
    let started_at = OffsetDateTime::now_utc();

    // Parse config (empty is allowed, defaults apply).
    let cfg = if input.config_text.trim().is_empty() {
        EffectguardConfigV1::default()
    } else {
        effectguard_settings::parse_config_toml(input.config_text).context("parse config")?
    };

    let resolved = effectguard_settings::resolve_config(cfg, input.overrides.clone())
        .context("resolve config")?;

    let program =
        effectguard_snapshot::load_snapshot(input.graph_path).context("load call graph")?;

    let domain_report = effectguard_domain::evaluate(&program, &resolved.effective)
        .context("build call graph")?;

    info!(
        verdict = ?domain_report.verdict,
        callables = domain_report.data.callables_analyzed,
        edges = domain_report.data.edges_analyzed,
        findings = domain_report.data.findings_total,
        succeeded = domain_report.data.succeeded,
        "check finished"
    );

    let report = ReportEnvelope {
        schema: SCHEMA_REPORT_V1.to_string(),
        tool: ToolMeta {
            name: "effectguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        started_at,
        finished_at: OffsetDateTime::now_utc(),
        verdict: domain_report.verdict,
        findings: domain_report.findings,
        data: domain_report.data,
    };

    Ok(CheckOutput {
        report,
        resolved_config: resolved,
    })
}

/// Map verdict to exit code: 0 = pass/warn, 2 = fail.
pub fn verdict_exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Pass => 0,
        Verdict::Warn => 0,
        Verdict::Fail => 2,
    }
}
