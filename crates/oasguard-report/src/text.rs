//! Plain-text change log, suitable for a terminal.

use std::fmt::Write;

use oasguard_diff::Verdict;

use crate::summary::{Endpoint, Summary};

const WIDTH: usize = 74;

fn rule(out: &mut String, ch: char) {
    out.extend(std::iter::repeat(ch).take(WIDTH));
    out.push('\n');
}

fn banner(out: &mut String, title: &str) {
    rule(out, '-');
    let _ = writeln!(out, "--{:^width$}--", title, width = WIDTH - 4);
    rule(out, '-');
}

fn centered(out: &mut String, text: &str) {
    let _ = writeln!(out, "{:^width$}", text, width = WIDTH);
}

fn endpoint_line(out: &mut String, endpoint: &Endpoint) {
    if endpoint.method.is_empty() {
        let _ = writeln!(out, "- {}", endpoint.path);
    } else {
        let _ = writeln!(out, "- {:<7} {}", endpoint.method, endpoint.path);
    }
}

fn marker(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Breaking => "[breaking]",
        _ => "[compatible]",
    }
}

pub(crate) fn render(summary: &Summary) -> String {
    let mut out = String::new();

    rule(&mut out, '=');
    let _ = writeln!(out, "=={:^width$}==", "API CHANGE LOG", width = WIDTH - 4);
    rule(&mut out, '=');
    centered(&mut out, &summary.title);

    let lists = [
        ("What's New", &summary.new_endpoints),
        ("What's Deleted", &summary.deleted_endpoints),
        ("What's Deprecated", &summary.deprecated_endpoints),
    ];
    for (title, endpoints) in lists {
        if endpoints.is_empty() {
            continue;
        }
        banner(&mut out, title);
        for endpoint in endpoints {
            endpoint_line(&mut out, endpoint);
        }
        out.push('\n');
    }

    if !summary.changed.is_empty() {
        banner(&mut out, "What's Changed");
        for group in &summary.changed {
            let _ = writeln!(out, "- {}", group.title);
            for item in &group.items {
                if item.location.is_empty() {
                    let _ = writeln!(out, "    {} {}", marker(item.verdict), item.message);
                } else {
                    let _ = writeln!(
                        out,
                        "    {} {}: {}",
                        marker(item.verdict),
                        item.location,
                        item.message
                    );
                }
            }
        }
        out.push('\n');
    }

    banner(&mut out, "Result");
    centered(&mut out, summary.result_line());
    rule(&mut out, '-');

    out
}
