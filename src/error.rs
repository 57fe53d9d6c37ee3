use std::fmt;
use thiserror::Error;

/// Failure taxonomy shared by commands, pickers and the render loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("invalid precondition: {0}")]
    Validation(String),
    #[error("invalid state transition: {0}")]
    State(String),
    #[error("{context}: {message}")]
    External { context: String, message: String },
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Validation,
    State,
    External,
    Cancellation,
}

impl Fault {
    pub fn validation(message: impl Into<String>) -> Self {
        Fault::Validation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Fault::State(message.into())
    }

    /// Wraps a collaborator error, keeping the full context chain in the message.
    pub fn external(context: impl Into<String>, err: impl fmt::Display) -> Self {
        Fault::External { context: context.into(), message: format!("{err:#}") }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Validation(_) => FaultKind::Validation,
            Fault::State(_) => FaultKind::State,
            Fault::External { .. } => FaultKind::External,
            Fault::Cancelled => FaultKind::Cancellation,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Fault::Cancelled)
    }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self {
        Fault::external("external", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn external_keeps_context_chain() {
        let err = Err::<(), _>(anyhow!("disk full")).context("writing model").unwrap_err();
        let fault = Fault::external("export", err);
        assert_eq!(fault.kind(), FaultKind::External);
        assert!(fault.to_string().contains("writing model"));
        assert!(fault.to_string().contains("disk full"));
    }

    #[test]
    fn only_cancelled_is_cancellation() {
        assert!(Fault::Cancelled.is_cancellation());
        assert!(!Fault::validation("empty selection").is_cancellation());
    }
}
