use shared::domain::TreatmentKind;
use thiserror::Error;

use crate::state::{Action, Phase};

/// Failure of a single backend exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The service answered and reported a failure (`error` field or `success: false`).
    #[error("{0}")]
    Server(String),
    /// The exchange itself failed: connection error or a body we could not read.
    #[error("{0}")]
    Transport(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Server(String),
    #[error("{context}: {message}")]
    Transport {
        context: &'static str,
        message: String,
    },
    #[error("cannot {action} while {phase}")]
    Precondition { action: Action, phase: Phase },
    #[error("cannot {action} unless the {expected} treatment is selected")]
    TreatmentNotSelected {
        action: Action,
        expected: TreatmentKind,
    },
}

impl ControllerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn from_backend(context: &'static str, err: BackendError) -> Self {
        match err {
            BackendError::Server(message) => Self::Server(message),
            BackendError::Transport(message) => Self::Transport { context, message },
        }
    }
}
