//! Standalone HTML change log.

use std::fmt::Write;

use oasguard_diff::Verdict;

use crate::summary::{Endpoint, Summary};

const STYLE: &str = "body{font-family:sans-serif;margin:2em auto;max-width:60em}\
.method{font-family:monospace;font-weight:bold;margin-right:.5em}\
.breaking{color:#b00020}.compatible{color:#1b5e20}\
code{background:#f4f4f4;padding:0 .2em}";

/// Escape text for use in element content and attribute values.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn endpoint_html(endpoint: &Endpoint) -> String {
    if endpoint.method.is_empty() {
        format!("<code>{}</code>", escape(&endpoint.path))
    } else {
        format!(
            "<span class=\"method\">{}</span><code>{}</code>",
            escape(&endpoint.method),
            escape(&endpoint.path)
        )
    }
}

pub(crate) fn render(summary: &Summary) -> String {
    let mut out = String::new();
    let title = escape(&summary.title);

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(
        out,
        "<head><meta charset=\"utf-8\"><title>API Changelog {}</title><style>{}</style></head>",
        title, STYLE
    );
    let _ = writeln!(out, "<body>");
    let _ = writeln!(out, "<h1>API Changelog {}</h1>", title);

    let lists = [
        ("What's New", &summary.new_endpoints),
        ("What's Deleted", &summary.deleted_endpoints),
        ("What's Deprecated", &summary.deprecated_endpoints),
    ];
    for (heading, endpoints) in lists {
        if endpoints.is_empty() {
            continue;
        }
        let _ = writeln!(out, "<h2>{}</h2>", escape(heading));
        let _ = writeln!(out, "<ul>");
        for endpoint in endpoints {
            let _ = writeln!(out, "<li>{}</li>", endpoint_html(endpoint));
        }
        let _ = writeln!(out, "</ul>");
    }

    if !summary.changed.is_empty() {
        let _ = writeln!(out, "<h2>{}</h2>", escape("What's Changed"));
        let _ = writeln!(out, "<ul>");
        for group in &summary.changed {
            let heading = match &group.endpoint {
                Some(endpoint) => endpoint_html(endpoint),
                None => escape(&group.title),
            };
            let _ = writeln!(out, "<li>{}<ul>", heading);
            for item in &group.items {
                let class = match item.verdict {
                    Verdict::Breaking => "breaking",
                    _ => "compatible",
                };
                let location = if item.location.is_empty() {
                    String::new()
                } else {
                    format!("<code>{}</code>: ", escape(&item.location))
                };
                let _ = writeln!(
                    out,
                    "<li class=\"{}\">{}{}</li>",
                    class,
                    location,
                    escape(&item.message)
                );
            }
            let _ = writeln!(out, "</ul></li>");
        }
        let _ = writeln!(out, "</ul>");
    }

    let result_class = match summary.verdict {
        Verdict::Breaking => "breaking",
        _ => "compatible",
    };
    let _ = writeln!(out, "<h2>Result</h2>");
    let _ = writeln!(
        out,
        "<p class=\"{}\"><strong>{}</strong></p>",
        result_class,
        escape(summary.result_line())
    );
    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");

    out
}
