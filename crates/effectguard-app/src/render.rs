//! Render use cases: markdown and GitHub annotations from in-memory reports.

use effectguard_render::RenderableReport;

pub fn render_markdown(report: &RenderableReport) -> String {
    effectguard_render::render_markdown(report)
}

pub fn render_annotations(report: &RenderableReport, max: usize) -> Vec<String> {
    effectguard_render::render_github_annotations(report)
        .into_iter()
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use effectguard_render::{
        RenderableData, RenderableFinding, RenderableReport, RenderableSeverity,
        RenderableVerdictStatus,
    };

    fn sample_report() -> RenderableReport {
        let finding = |code: &str| RenderableFinding {
            severity: RenderableSeverity::Warning,
            check_id: "annotations".to_string(),
            code: code.to_string(),
            message: "dropped".to_string(),
            location: None,
            help: None,
        };
        RenderableReport {
            verdict: RenderableVerdictStatus::Warn,
            findings: vec![finding("unknown_tag"), finding("malformed_annotation")],
            data: RenderableData {
                profile: "strict".to_string(),
                callables_analyzed: 1,
                edges_analyzed: 0,
                namespaces: Vec::new(),
                findings_emitted: 2,
                findings_total: 2,
                succeeded: true,
                truncated_reason: None,
            },
        }
    }

    #[test]
    fn render_annotations_respects_max() {
        let annotations = render_annotations(&sample_report(), 1);
        assert_eq!(annotations.len(), 1);
        assert!(annotations[0].contains("unknown_tag"));
    }

    #[test]
    fn render_markdown_smoke() {
        let markdown = render_markdown(&sample_report());
        assert!(markdown.contains("Verdict: **WARN**"));
    }
}
