use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DiseaseId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    PayloadTooLarge,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::PayloadTooLarge => 413,
            Self::Unavailable => 503,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<DiseaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_chemicals: Option<Vec<String>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            disease_id: None,
            available_chemicals: None,
        }
    }

    pub fn with_disease(mut self, disease_id: DiseaseId) -> Self {
        self.disease_id = Some(disease_id);
        self
    }

    pub fn with_available_chemicals(mut self, names: Vec<String>) -> Self {
        self.available_chemicals = Some(names);
        self
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message.clone(),
            disease_id: self.disease_id.clone(),
            available_chemicals: self.available_chemicals.clone(),
        }
    }
}

/// JSON shape of every failed reply: `{"error": "..."}` plus optional context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<DiseaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_chemicals: Option<Vec<String>>,
}
