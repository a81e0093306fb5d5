//! Sizes a chemical dose for a spray motor.

use std::fmt;

use shared::domain::{
    ChemicalDetails, DiseaseId, DosageResult, MixingInstructions, TreatmentKind,
};
use thiserror::Error;

use crate::catalog::{Catalog, ChemicalEntry};

pub const WATER_UNIT: &str = "liters";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdvisorError {
    #[error("Chemical \"{name}\" not found for this disease")]
    ChemicalNotFound { name: String, available: Vec<String> },
    #[error("Water amount ({water}L) exceeds motor capacity ({capacity}L)")]
    WaterExceedsCapacity { water: f64, capacity: f64 },
    #[error("invalid recommended dose {0:?}")]
    InvalidDose(String),
    #[error("invalid mixing ratio {0:?}")]
    InvalidRatio(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseUnit {
    Grams,
    Milliliters,
}

impl DoseUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Grams => "g",
            Self::Milliliters => "ml",
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseRate {
    pub per_liter: f64,
    pub unit: DoseUnit,
}

/// Parses `"2.5g"`, `"2ml"` or a bare `"0.1"` (grams).
pub fn parse_dose(raw: &str) -> Result<DoseRate, AdvisorError> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let (number, unit) = if let Some(number) = lowered.strip_suffix("ml") {
        (number, DoseUnit::Milliliters)
    } else if let Some(number) = lowered.strip_suffix('g') {
        (number, DoseUnit::Grams)
    } else {
        (lowered.as_str(), DoseUnit::Grams)
    };
    let per_liter = number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .ok_or_else(|| AdvisorError::InvalidDose(trimmed.to_string()))?;
    Ok(DoseRate { per_liter, unit })
}

/// Parses a `chemical:water` ratio into whole parts.
pub fn parse_ratio(raw: &str) -> Result<(u32, u32), AdvisorError> {
    let invalid = || AdvisorError::InvalidRatio(raw.to_string());
    let (chemical, water) = raw.split_once(':').ok_or_else(invalid)?;
    let chemical = chemical.trim().parse::<u32>().map_err(|_| invalid())?;
    let water = water.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok((chemical, water))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn find_chemical<'a>(
    chemicals: &'a [ChemicalEntry],
    name: &str,
) -> Result<&'a ChemicalEntry, AdvisorError> {
    let wanted = name.trim().to_lowercase();
    chemicals
        .iter()
        .find(|chemical| chemical.name.to_lowercase() == wanted)
        .ok_or_else(|| AdvisorError::ChemicalNotFound {
            name: name.to_string(),
            available: chemicals.iter().map(|c| c.name.clone()).collect(),
        })
}

/// Computes mixing instructions for `chemical_name` against `disease_id`.
///
/// `water` defaults to `motor_capacity`; callers have already checked that
/// the capacity is positive and the water amount non-negative.
pub fn calculate_dosage(
    catalog: &Catalog,
    disease_id: &DiseaseId,
    chemical_name: &str,
    motor_capacity: f64,
    water: Option<f64>,
) -> Result<DosageResult, AdvisorError> {
    let chemical = find_chemical(catalog.chemicals(disease_id), chemical_name)?;

    let water = water.unwrap_or(motor_capacity);
    if water > motor_capacity {
        return Err(AdvisorError::WaterExceedsCapacity {
            water,
            capacity: motor_capacity,
        });
    }

    let dose = parse_dose(&chemical.recommended_dose_per_liter)?;
    let (chemical_parts, water_parts) = parse_ratio(&chemical.mixing_ratio.chemical_to_water)?;
    let chemical_amount = round2(dose.per_liter * water);
    let remaining_capacity = motor_capacity - water;

    Ok(DosageResult {
        treatment_type: Some(TreatmentKind::Inorganic),
        disease_id: Some(disease_id.clone()),
        chemical_details: ChemicalDetails {
            name: chemical.name.clone(),
            active_ingredient: chemical.active_ingredient.clone(),
            concentration: chemical.concentration.clone(),
        },
        motor_capacity,
        mixing_instructions: MixingInstructions {
            water_amount: water,
            water_unit: WATER_UNIT.to_string(),
            chemical_amount,
            chemical_unit: dose.unit.symbol().to_string(),
            mixing_ratio: format!("{chemical_parts}:{water_parts}"),
            remaining_capacity,
        },
        application_steps: vec![
            format!("Fill spray motor with {water} liters of clean water"),
            format!("Measure {chemical_amount} {} of {}", dose.unit, chemical.name),
            "Add chemical slowly to water while stirring".to_string(),
            "Mix thoroughly for 2-3 minutes".to_string(),
            "Ensure complete dissolution before spraying".to_string(),
            format!(
                "Remaining motor capacity: {remaining_capacity} liters (keep empty for agitation)"
            ),
        ],
        safety_precautions: chemical.safety_precautions.clone(),
        recommended_dose_per_liter: Some(chemical.recommended_dose_per_liter.clone()),
    })
}

#[cfg(test)]
#[path = "tests/advisor_tests.rs"]
mod tests;
