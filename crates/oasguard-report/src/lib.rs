//! Human- and machine-readable reports for a [`ChangeSet`].
//!
//! Text, Markdown and HTML reports share one layout: new, deleted and
//! deprecated endpoints, then every other finding grouped by operation, then
//! the overall result. JSON is the serialized change tree.

mod error;
mod html;
mod markdown;
pub mod summary;
mod text;

use std::fmt;

use oasguard_diff::ChangeSet;
use serde::{Deserialize, Serialize};

pub use error::ReportError;
pub use summary::Summary;

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Markdown,
    Html,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render `changes` in the given format.
pub fn render(changes: &ChangeSet, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(changes)?),
        ReportFormat::Text => Ok(text::render(&Summary::from_changes(changes))),
        ReportFormat::Markdown => Ok(markdown::render(&Summary::from_changes(changes))),
        ReportFormat::Html => Ok(html::render(&Summary::from_changes(changes))),
    }
}
