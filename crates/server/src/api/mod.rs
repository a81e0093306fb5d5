use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{DetectionResult, DiseaseId, DiseaseInfo, DosageResult, TreatmentKind},
    error::{ApiError, ErrorCode},
    protocol::OrganicTreatmentResponse,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    advisor::{self, AdvisorError},
    catalog::{Catalog, ChemicalEntry},
    classifier::{Classifier, ClassifierError, StoredImage},
};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

const UNKNOWN_DISEASE_NAME: &str = "Unknown";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct ApiContext {
    pub catalog: Arc<Catalog>,
    pub classifier: Arc<dyn Classifier>,
    pub upload_dir: PathBuf,
}

/// The `image` part of an upload, as received.
#[derive(Debug, Clone)]
pub struct ImageSubmission {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiseaseQuery {
    #[serde(default)]
    pub disease_id: Option<DiseaseId>,
}

/// Numbers may arrive as JSON numbers or as numeric strings from form inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
    Other(Value),
}

impl NumericField {
    fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Other(value) => value.is_null(),
            Self::Number(_) => false,
        }
    }

    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
            Self::Other(_) => None,
        }
        .filter(|value| value.is_finite())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CalculateQuery {
    #[serde(default)]
    pub disease_id: Option<DiseaseId>,
    #[serde(default)]
    pub chemical_name: Option<String>,
    #[serde(default)]
    pub motor_capacity: Option<NumericField>,
    #[serde(default)]
    pub water_amount: Option<NumericField>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChemicalOptionsReply {
    pub treatment_type: TreatmentKind,
    pub disease_id: DiseaseId,
    pub available_chemicals: Vec<ChemicalEntry>,
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Validation, message)
}

pub fn allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduces a client file name to a safe basename of `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']);
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn require_disease(disease_id: Option<DiseaseId>) -> Result<DiseaseId, ApiError> {
    disease_id
        .filter(|id| !id.is_blank())
        .ok_or_else(|| validation("Disease ID is required"))
}

pub async fn analyze_upload(
    ctx: &ApiContext,
    submission: ImageSubmission,
) -> Result<DetectionResult, ApiError> {
    if submission.file_name.is_empty() {
        return Err(validation("No file selected"));
    }
    if !allowed_file(&submission.file_name) {
        return Err(validation(
            "Invalid file type. Please upload an image file.",
        ));
    }

    let file_name = sanitize_file_name(&submission.file_name);
    let path = ctx
        .upload_dir
        .join(format!("{}_{file_name}", Uuid::new_v4()));
    tokio::fs::write(&path, &submission.bytes)
        .await
        .map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to store upload");
            ApiError::new(ErrorCode::Internal, format!("Error processing image: {e}"))
        })?;
    info!(
        path = %path.display(),
        size_bytes = submission.bytes.len(),
        "stored upload"
    );

    let image = StoredImage {
        path,
        file_name,
        content_type: submission
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
    };
    let classification = ctx.classifier.classify(&image).await.map_err(|e| {
        warn!(file_name = %image.file_name, error = %e, "classification failed");
        let code = match e {
            ClassifierError::Unavailable => ErrorCode::Unavailable,
            _ => ErrorCode::Internal,
        };
        ApiError::new(code, "Failed to analyze image")
    })?;

    let (disease_name, description) = match ctx.catalog.disease(&classification.disease_id) {
        Some(info) => (info.name.clone(), info.description.clone()),
        None => (UNKNOWN_DISEASE_NAME.to_string(), String::new()),
    };
    info!(
        disease_id = %classification.disease_id,
        severity = %classification.severity,
        confidence = classification.confidence,
        "image classified"
    );
    Ok(DetectionResult {
        disease_id: classification.disease_id,
        disease_name,
        description,
        severity: classification.severity,
        confidence: advisor::round2(classification.confidence),
    })
}

pub fn organic_treatment(
    ctx: &ApiContext,
    query: DiseaseQuery,
) -> Result<OrganicTreatmentResponse, ApiError> {
    let disease_id = require_disease(query.disease_id)?;
    let recipe = ctx.catalog.organic_recipe(&disease_id).cloned().ok_or_else(|| {
        ApiError::new(
            ErrorCode::NotFound,
            "No organic treatment found for this disease",
        )
        .with_disease(disease_id.clone())
    })?;
    Ok(OrganicTreatmentResponse {
        treatment_type: Some(TreatmentKind::Organic),
        disease_id: Some(disease_id),
        recipe,
    })
}

pub fn inorganic_options(
    ctx: &ApiContext,
    query: DiseaseQuery,
) -> Result<ChemicalOptionsReply, ApiError> {
    let disease_id = require_disease(query.disease_id)?;
    let chemicals = ctx.catalog.chemicals(&disease_id);
    if chemicals.is_empty() {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            "No inorganic treatments found for this disease",
        )
        .with_disease(disease_id));
    }
    Ok(ChemicalOptionsReply {
        treatment_type: TreatmentKind::Inorganic,
        disease_id,
        available_chemicals: chemicals.to_vec(),
    })
}

pub fn calculate_dosage(ctx: &ApiContext, query: CalculateQuery) -> Result<DosageResult, ApiError> {
    let required = || validation("disease_id, chemical_name, and motor_capacity are required");
    let disease_id = query
        .disease_id
        .filter(|id| !id.is_blank())
        .ok_or_else(required)?;
    let chemical_name = query
        .chemical_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(required)?;
    let motor_capacity = query
        .motor_capacity
        .filter(|field| !field.is_blank())
        .ok_or_else(required)?;

    let invalid = || validation("Invalid numeric values");
    let motor_capacity = motor_capacity.value().ok_or_else(invalid)?;
    let water_amount = match query.water_amount.filter(|field| !field.is_blank()) {
        Some(field) => Some(field.value().ok_or_else(invalid)?),
        None => None,
    };
    if motor_capacity <= 0.0 {
        return Err(validation("motor_capacity must be positive"));
    }
    if water_amount.is_some_and(|water| water < 0.0) {
        return Err(validation("water_amount must not be negative"));
    }

    advisor::calculate_dosage(
        &ctx.catalog,
        &disease_id,
        &chemical_name,
        motor_capacity,
        water_amount,
    )
    .map_err(|err| match err {
        AdvisorError::ChemicalNotFound { ref available, .. } => {
            let available = available.clone();
            ApiError::new(ErrorCode::NotFound, err.to_string()).with_available_chemicals(available)
        }
        AdvisorError::WaterExceedsCapacity { .. } => validation(err.to_string()),
        AdvisorError::InvalidDose(_) | AdvisorError::InvalidRatio(_) => {
            error!(%disease_id, chemical = %chemical_name, error = %err, "catalog entry is malformed");
            ApiError::new(ErrorCode::Internal, err.to_string())
        }
    })
}

pub fn disease_info(ctx: &ApiContext, disease_id: &str) -> Result<DiseaseInfo, ApiError> {
    ctx.catalog
        .disease(&DiseaseId::from(disease_id))
        .cloned()
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "Disease not found"))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
