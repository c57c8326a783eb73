use crate::events::EventError;
use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum RuleError {
    #[error("failed with {0:?}")]
    Event(EventError),
    #[error("the expression is structurally degenerate (nested too deeply to be indexed)")]
    InvalidExpression,
}
