//! Plain-text rendering of controller updates for terminal output.

use std::{fmt::Write as _, io::Write};

use client_core::{View, ViewUpdate};
use shared::domain::{ChemicalOption, DetectionResult, DosageResult, OrganicRecipe};
use tracing::warn;

pub fn format_detection(detection: &DetectionResult) -> String {
    let mut out = format!(
        "Disease:    {} ({})\nSeverity:   {}\nConfidence: {}%\n",
        detection.disease_name,
        detection.disease_id,
        detection.severity.label().to_uppercase(),
        detection.confidence
    );
    if !detection.description.is_empty() {
        let _ = writeln!(out, "{}", detection.description);
    }
    out
}

pub fn format_recipe(recipe: &OrganicRecipe) -> String {
    let mut out = format!("{}\n\nIngredients:\n", recipe.name);
    for item in &recipe.ingredients {
        let _ = writeln!(out, "  - {item}");
    }
    out.push_str("\nPreparation:\n");
    for (step, item) in recipe.preparation.iter().enumerate() {
        let _ = writeln!(out, "  {}. {item}", step + 1);
    }
    let application = &recipe.application;
    let _ = write!(
        out,
        "\nApplication:\n  Method:    {}\n  Frequency: {}\n  Timing:    {}\n  Duration:  {}\n",
        application.method, application.frequency, application.timing, application.duration
    );
    out
}

pub fn format_chemical_options(options: &[ChemicalOption]) -> String {
    if options.is_empty() {
        return "No chemicals available.\n".to_string();
    }
    let mut out = String::from("Available chemicals:\n");
    for option in options {
        let _ = write!(out, "  - {} ({})", option.name, option.concentration);
        if let Some(dose) = &option.recommended_dose_per_liter {
            let _ = write!(out, ", {dose} per liter");
        }
        out.push('\n');
    }
    out
}

pub fn format_dosage(dosage: &DosageResult) -> String {
    let chemical = &dosage.chemical_details;
    let mixing = &dosage.mixing_instructions;
    let mut out = format!(
        "Chemical:           {} ({}, {})\n\
         Water amount:       {} {}\n\
         Chemical amount:    {} {}\n\
         Mixing ratio:       {}\n\
         Motor capacity:     {} liters\n\
         Remaining capacity: {} liters\n\nSteps:\n",
        chemical.name,
        chemical.active_ingredient,
        chemical.concentration,
        mixing.water_amount,
        mixing.water_unit,
        mixing.chemical_amount,
        mixing.chemical_unit,
        mixing.mixing_ratio,
        dosage.motor_capacity,
        mixing.remaining_capacity,
    );
    for (step, item) in dosage.application_steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {item}", step + 1);
    }
    if !dosage.safety_precautions.is_empty() {
        out.push_str("\nSafety precautions:\n");
        for item in &dosage.safety_precautions {
            let _ = writeln!(out, "  - {item}");
        }
    }
    out
}

/// Text for one update; `None` for updates with no terminal representation.
pub fn format_update(update: &ViewUpdate) -> Option<String> {
    match update {
        ViewUpdate::ImagePreview {
            file_name,
            mime_type,
            size_bytes,
        } => Some(format!("Image: {file_name} ({mime_type}, {size_bytes} bytes)\n")),
        ViewUpdate::Detection(detection) => Some(format!("\n{}", format_detection(detection))),
        ViewUpdate::TreatmentSelected(kind) => Some(format!("\nTreatment: {kind}\n")),
        ViewUpdate::OrganicRecipe(recipe) => Some(format!("\n{}", format_recipe(recipe))),
        ViewUpdate::ChemicalOptions(options) => Some(format_chemical_options(options)),
        ViewUpdate::Dosage(dosage) => Some(format!("\n{}", format_dosage(dosage))),
        ViewUpdate::Notify(notification) => Some(format!(
            "[{}] {}\n",
            notification.level.as_str(),
            notification.message
        )),
        ViewUpdate::AnalyzeEnabled(_) | ViewUpdate::Loading(_) | ViewUpdate::Cleared => None,
    }
}

/// Writes each update to `out` as it arrives.
pub struct TerminalView<W> {
    out: W,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn apply(&mut self, update: ViewUpdate) {
        if let Some(text) = format_update(&update) {
            if let Err(error) = self.out.write_all(text.as_bytes()) {
                warn!(%error, "failed to write to terminal");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
