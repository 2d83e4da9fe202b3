use crate::{RenderableReport, RenderableSeverity, RenderableVerdictStatus};

pub fn render_markdown(report: &RenderableReport) -> String {
    let mut out = String::new();

    out.push_str("# Effectguard report\n\n");
    let verdict = match report.verdict {
        RenderableVerdictStatus::Pass => "PASS",
        RenderableVerdictStatus::Warn => "WARN",
        RenderableVerdictStatus::Fail => "FAIL",
    };
    let d = &report.data;
    out.push_str(&format!(
        "- Verdict: **{}**\n- Profile: `{}`\n- Analyzed: {} callables, {} call edges\n- Findings: {} (emitted) / {} (total)\n",
        verdict,
        d.profile,
        d.callables_analyzed,
        d.edges_analyzed,
        d.findings_emitted,
        d.findings_total
    ));
    if !d.succeeded {
        out.push_str("- Analysis found policy violations or unresolvable tags\n");
    }
    out.push('\n');

    if let Some(r) = &d.truncated_reason {
        out.push_str(&format!("> Note: {}\n\n", r));
    }

    if !d.namespaces.is_empty() {
        out.push_str("| Namespace | Kind | Explicit | Inferred | Ambiguous | Violations |\n");
        out.push_str("|---|---|---:|---:|---:|---:|\n");
        for n in &d.namespaces {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                n.namespace, n.kind, n.explicit, n.inferred, n.ambiguous, n.violations
            ));
        }
        out.push('\n');
    }

    if report.findings.is_empty() {
        out.push_str("No findings.\n");
        return out;
    }

    out.push_str("## Findings\n\n");

    for f in &report.findings {
        let sev = match f.severity {
            RenderableSeverity::Info => "INFO",
            RenderableSeverity::Warning => "WARN",
            RenderableSeverity::Error => "ERROR",
        };

        out.push_str(&format!(
            "- [{}] `{}` / `{}`: {}",
            sev, f.check_id, f.code, f.message
        ));
        if let Some(loc) = &f.location {
            match loc.line {
                Some(line) => out.push_str(&format!(" (`{}`:{})", loc.path, line)),
                None => out.push_str(&format!(" (`{}`)", loc.path)),
            }
        }
        out.push('\n');

        if let Some(help) = &f.help {
            out.push_str(&format!("  - help: {}\n", help));
        }
    }

    out
}
