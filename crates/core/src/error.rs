//! Error types shared by the reconstruction and strategy modules.

use thiserror::Error;

/// Errors raised by the ladder core.
///
/// Every failure here is a validation failure: the core performs no I/O, so
/// nothing is retried and the offending value is carried back to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LadderError {
    /// Malformed input: empty fill lists, non-positive margins or leverage,
    /// unsorted trade tapes.
    #[error("invalid {what}: {value}")]
    InvalidInput {
        /// Which input was rejected.
        what: &'static str,
        /// The rejected value, rendered for an operator.
        value: String,
    },

    /// A simulation step that is not allowed from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl LadderError {
    pub(crate) fn invalid_input(what: &'static str, value: impl ToString) -> Self {
        Self::InvalidInput {
            what,
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LadderError>;
