use thiserror::Error;

/// Errors produced before a comparison can start.
#[derive(Debug, Error)]
pub enum DiffError {
    /// E2001: A comparison input was rejected.
    #[error("E2001: invalid argument: {0}")]
    InvalidArgument(String),

    /// A document could not be loaded.
    #[error("failed to load '{location}': {source}")]
    Load {
        location: String,
        #[source]
        source: oasguard_spec_parser::ParseError,
    },
}
