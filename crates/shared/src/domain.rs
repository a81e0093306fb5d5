use std::fmt;

use serde::{Deserialize, Serialize};

/// Disease identifier as issued by the classifier.
///
/// Catalog ids are slugs such as `leaf_blight`, but some classifiers emit
/// numeric class indices; both forms round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiseaseId {
    Numeric(i64),
    Named(String),
}

impl DiseaseId {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Numeric(_) => false,
            Self::Named(name) => name.trim().is_empty(),
        }
    }

    /// Key used for catalog lookups.
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DiseaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for DiseaseId {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for DiseaseId {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<i64> for DiseaseId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Mild,
    Moderate,
    Severe,
    Other(String),
}

impl Severity {
    pub fn label(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "mild" => Self::Mild,
            "moderate" => Self::Moderate,
            "severe" => Self::Severe,
            _ => Self::Other(value),
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentKind {
    Organic,
    Inorganic,
}

impl TreatmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organic => "organic",
            Self::Inorganic => "inorganic",
        }
    }
}

impl fmt::Display for TreatmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub disease_id: DiseaseId,
    pub disease_name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    /// Percentage in `0.0..=100.0`.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    pub id: DiseaseId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symptoms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPlan {
    pub method: String,
    pub frequency: String,
    pub timing: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicRecipe {
    pub name: String,
    pub ingredients: Vec<String>,
    pub preparation: Vec<String>,
    pub application: ApplicationPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemicalOption {
    pub name: String,
    pub concentration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_ingredient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_dose_per_liter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemicalDetails {
    pub name: String,
    pub active_ingredient: String,
    pub concentration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixingInstructions {
    pub water_amount: f64,
    pub water_unit: String,
    pub chemical_amount: f64,
    pub chemical_unit: String,
    pub mixing_ratio: String,
    pub remaining_capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosageResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_type: Option<TreatmentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_id: Option<DiseaseId>,
    pub chemical_details: ChemicalDetails,
    pub motor_capacity: f64,
    pub mixing_instructions: MixingInstructions,
    pub application_steps: Vec<String>,
    pub safety_precautions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_dose_per_liter: Option<String>,
}
