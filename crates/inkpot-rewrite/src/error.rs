use std::fmt;

use inkpot_parser::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    /// The cell does not parse; the message carries line and column.
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error("transform failed: {0}")]
    Transform(String),
}

impl From<fmt::Error> for RewriteError {
    fn from(_: fmt::Error) -> Self {
        RewriteError::Transform("failed to write generated source".to_string())
    }
}

pub type Result<T> = std::result::Result<T, RewriteError>;
