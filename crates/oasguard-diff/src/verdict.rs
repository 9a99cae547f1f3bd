use serde::{Deserialize, Serialize};
use std::fmt;

/// Compatibility classification of a change or subtree.
///
/// Ordered by severity so that aggregation is a plain `max`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    Unchanged,
    /// Additive or widening; existing clients keep working.
    Compatible,
    /// Existing clients or servers may fail after the update.
    Breaking,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Compatible => "compatible",
            Self::Breaking => "breaking",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a value flows between client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sent by the client (request side).
    Input,
    /// Received by the client (response side).
    Output,
}

impl Direction {
    /// Verdict for a change that accepts fewer values than before.
    pub fn narrowing(self) -> Verdict {
        match self {
            Self::Input => Verdict::Breaking,
            Self::Output => Verdict::Compatible,
        }
    }

    /// Verdict for a change that accepts more values than before.
    pub fn widening(self) -> Verdict {
        match self {
            Self::Input => Verdict::Compatible,
            Self::Output => Verdict::Breaking,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}
