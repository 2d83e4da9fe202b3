//! The `explain` use case: look up check/code documentation.

use effectguard_types::explain::{self, Explanation};

/// Output from the explain use case.
#[derive(Clone, Debug)]
pub enum ExplainOutput {
    Found(Explanation),
    /// Unknown identifier; includes available check_ids and codes.
    NotFound {
        identifier: String,
        available_check_ids: &'static [&'static str],
        available_codes: &'static [&'static str],
    },
}

/// Look up an explanation for a check_id or code.
pub fn run_explain(identifier: &str) -> ExplainOutput {
    match explain::lookup_explanation(identifier) {
        Some(exp) => ExplainOutput::Found(exp),
        None => ExplainOutput::NotFound {
            identifier: identifier.to_string(),
            available_check_ids: explain::all_check_ids(),
            available_codes: explain::all_codes(),
        },
    }
}

/// Format an explanation for terminal display.
///
/// Namespace checks also list the annotation vocabulary and where to extend it.
pub fn format_explanation(exp: &Explanation) -> String {
    let mut out = String::new();

    section(&mut out, exp.title, '=');
    out.push_str(exp.description);
    out.push_str("\n\n");

    if let Some(vocab) = &exp.vocabulary {
        section(&mut out, &format!("Namespace {}", vocab.namespace), '-');
        out.push_str(&format!(
            "Annotate callables with {}::<TAG>, where TAG is one of:\n",
            vocab.namespace
        ));
        for tag in vocab.tags {
            out.push_str(&format!("  {}::{}\n", vocab.namespace, tag));
        }
        if !vocab.reserved.is_empty() {
            out.push_str(&format!(
                "Reserved (rejected on callables): {}\n",
                vocab.reserved.join(", ")
            ));
        }
        out.push_str(&format!(
            "Extend the vocabulary with `values = [...]` under [namespaces.{}] in effectguard.toml.\n\n",
            vocab.namespace
        ));
    }

    section(&mut out, "How to fix", '-');
    out.push_str(exp.remediation);
    out.push_str("\n\n");

    section(&mut out, "Flagged", '-');
    fenced_cpp(&mut out, exp.examples.before);
    section(&mut out, "Accepted", '-');
    fenced_cpp(&mut out, exp.examples.after);

    out
}

fn section(out: &mut String, title: &str, underline: char) {
    out.push_str(title);
    out.push('\n');
    out.extend(std::iter::repeat_n(underline, title.chars().count()));
    out.push('\n');
}

fn fenced_cpp(out: &mut String, code: &str) {
    out.push_str("```cpp\n");
    out.push_str(code.trim_end());
    out.push_str("\n```\n");
}

/// Format the "not found" error message for terminal display.
pub fn format_not_found(
    identifier: &str,
    check_ids: &[&'static str],
    codes: &[&'static str],
) -> String {
    let mut out = String::new();

    out.push_str(&format!("Unknown check_id or code: {}\n\n", identifier));
    out.push_str("Available check_ids:\n");
    for id in check_ids {
        out.push_str(&format!("  - {}\n", id));
    }
    out.push_str("\nAvailable codes:\n");
    for code in codes {
        out.push_str(&format!("  - {}\n", code));
    }

    out
}
