//! Markdown change log.

use std::fmt::Write;

use oasguard_diff::Verdict;

use crate::summary::{Endpoint, Summary};

fn endpoint_line(out: &mut String, endpoint: &Endpoint) {
    if endpoint.method.is_empty() {
        let _ = writeln!(out, "* {}", code(&endpoint.path));
    } else {
        let _ = writeln!(out, "* `{}` {}", endpoint.method, code(&endpoint.path));
    }
}

/// Inline code span that survives backticks in the content.
fn code(text: &str) -> String {
    if text.contains('`') {
        format!("`` {} ``", text)
    } else {
        format!("`{}`", text)
    }
}

pub(crate) fn render(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### API Changelog {}\n", summary.title);

    let lists = [
        ("What's New", &summary.new_endpoints),
        ("What's Deleted", &summary.deleted_endpoints),
        ("What's Deprecated", &summary.deprecated_endpoints),
    ];
    for (title, endpoints) in lists {
        if endpoints.is_empty() {
            continue;
        }
        let _ = writeln!(out, "#### {}\n", title);
        for endpoint in endpoints {
            endpoint_line(&mut out, endpoint);
        }
        out.push('\n');
    }

    if !summary.changed.is_empty() {
        out.push_str("#### What's Changed\n\n");
        for group in &summary.changed {
            match &group.endpoint {
                Some(endpoint) => endpoint_line(&mut out, endpoint),
                None => {
                    let _ = writeln!(out, "* {}", group.title);
                }
            }
            for item in &group.items {
                let marker = match item.verdict {
                    Verdict::Breaking => "**breaking**",
                    _ => "compatible",
                };
                if item.location.is_empty() {
                    let _ = writeln!(out, "    * {}: {}", marker, item.message);
                } else {
                    let _ = writeln!(
                        out,
                        "    * {} {}: {}",
                        marker,
                        code(&item.location),
                        item.message
                    );
                }
            }
        }
        out.push('\n');
    }

    let _ = writeln!(out, "#### Result\n\n**{}**", summary.result_line());
    out
}
