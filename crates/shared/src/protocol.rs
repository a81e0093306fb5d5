use serde::{Deserialize, Serialize};

use crate::domain::{ChemicalOption, DetectionResult, DiseaseId, OrganicRecipe, TreatmentKind};

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

pub fn upload_route() -> &'static str {
    "/api/upload"
}

pub fn organic_treatment_route() -> &'static str {
    "/api/treatment/organic"
}

pub fn inorganic_options_route() -> &'static str {
    "/api/treatment/inorganic/options"
}

pub fn inorganic_calculate_route() -> &'static str {
    "/api/treatment/inorganic/calculate"
}

pub fn disease_info_route() -> &'static str {
    "/api/disease/:disease_id"
}

pub fn disease_info_path(disease_id: &DiseaseId) -> String {
    format!("/api/disease/{disease_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseRequest {
    pub disease_id: DiseaseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicTreatmentResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_type: Option<TreatmentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<DiseaseId>,
    pub recipe: OrganicRecipe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InorganicOptionsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_type: Option<TreatmentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<DiseaseId>,
    #[serde(default)]
    pub available_chemicals: Vec<ChemicalOption>,
}

/// Dosage request as sent by the client. `water_amount` is always present on
/// the wire and is `null` when the sprayer should be filled to capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosageRequest {
    pub disease_id: DiseaseId,
    pub chemical_name: String,
    pub motor_capacity: f64,
    pub water_amount: Option<f64>,
}
