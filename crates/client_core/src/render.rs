//! HTML rendering of controller updates.

use std::{fmt::Write as _, time::Instant};

use shared::domain::{ChemicalOption, DetectionResult, DosageResult, OrganicRecipe, TreatmentKind};

use crate::{
    notify::Notification,
    view::{View, ViewUpdate},
};

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn list_items(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("<li>{}</li>", escape_html(item)))
        .collect()
}

fn dosage_row(out: &mut String, label: &str, value: &str) {
    let _ = write!(
        out,
        "<div class=\"dosage-row\"><span class=\"dosage-label\">{label}:</span>\
         <span class=\"dosage-value\">{}</span></div>",
        escape_html(value)
    );
}

pub fn render_detection(detection: &DetectionResult) -> String {
    let severity = detection.severity.label();
    format!(
        "<div class=\"detection\"><h2 id=\"diseaseName\">{}</h2>\
         <p id=\"diseaseDescription\">{}</p>\
         <span id=\"severityBadge\" class=\"severity-badge severity-{}\">{}</span>\
         <span id=\"confidenceValue\">{}%</span></div>",
        escape_html(&detection.disease_name),
        escape_html(&detection.description),
        escape_html(severity),
        escape_html(&severity.to_uppercase()),
        detection.confidence
    )
}

pub fn render_organic_recipe(recipe: &OrganicRecipe) -> String {
    let application = &recipe.application;
    format!(
        "<div class=\"recipe-section\"><h3>{}</h3></div>\
         <div class=\"recipe-section\"><h3>Ingredients</h3><ul>{}</ul></div>\
         <div class=\"recipe-section\"><h3>Preparation Steps</h3><ol>{}</ol></div>\
         <div class=\"recipe-section\"><h3>Application Instructions</h3><ul>\
         <li><strong>Method:</strong> {}</li>\
         <li><strong>Frequency:</strong> {}</li>\
         <li><strong>Timing:</strong> {}</li>\
         <li><strong>Duration:</strong> {}</li></ul></div>",
        escape_html(&recipe.name),
        list_items(&recipe.ingredients),
        list_items(&recipe.preparation),
        escape_html(&application.method),
        escape_html(&application.frequency),
        escape_html(&application.timing),
        escape_html(&application.duration),
    )
}

pub fn render_chemical_select(options: &[ChemicalOption]) -> String {
    let mut out = String::from("<option value=\"\">Select a chemical...</option>");
    for option in options {
        let _ = write!(
            out,
            "<option value=\"{}\">{} ({})</option>",
            escape_html(&option.name),
            escape_html(&option.name),
            escape_html(&option.concentration)
        );
    }
    out
}

pub fn render_dosage(dosage: &DosageResult) -> String {
    let chemical = &dosage.chemical_details;
    let mixing = &dosage.mixing_instructions;

    let mut out = String::from("<div class=\"dosage-info\"><h3>Chemical Details</h3>");
    dosage_row(&mut out, "Chemical Name", &chemical.name);
    dosage_row(&mut out, "Active Ingredient", &chemical.active_ingredient);
    dosage_row(&mut out, "Concentration", &chemical.concentration);
    out.push_str("</div><div class=\"dosage-info\"><h3>Mixing Instructions</h3>");
    dosage_row(
        &mut out,
        "Water Amount",
        &format!("{} {}", mixing.water_amount, mixing.water_unit),
    );
    dosage_row(
        &mut out,
        "Chemical Amount",
        &format!("{} {}", mixing.chemical_amount, mixing.chemical_unit),
    );
    dosage_row(&mut out, "Mixing Ratio", &mixing.mixing_ratio);
    dosage_row(
        &mut out,
        "Motor Capacity",
        &format!("{} liters", dosage.motor_capacity),
    );
    dosage_row(
        &mut out,
        "Remaining Capacity",
        &format!("{} liters", mixing.remaining_capacity),
    );
    let _ = write!(
        out,
        "</div><div class=\"recipe-section\"><h3>Application Steps</h3><ol>{}</ol></div>\
         <div class=\"recipe-section\"><h3>Safety Precautions</h3><ul>{}</ul></div>",
        list_items(&dosage.application_steps),
        list_items(&dosage.safety_precautions)
    );
    out
}

pub fn render_alert(notification: &Notification) -> String {
    format!(
        "<div class=\"alert alert-{}\">{}</div>",
        notification.level.as_str(),
        escape_html(&notification.message)
    )
}

/// Keeps one HTML fragment per panel; `None` means the panel is hidden.
#[derive(Debug, Default)]
pub struct HtmlView {
    preview: Option<String>,
    analyze_enabled: bool,
    loading: bool,
    results: Option<String>,
    treatment_form: Option<TreatmentKind>,
    chemical_select: Option<String>,
    treatment_results: Option<String>,
    alerts: Vec<Notification>,
}

impl HtmlView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn analyze_enabled(&self) -> bool {
        self.analyze_enabled
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn results_html(&self) -> Option<&str> {
        self.results.as_deref()
    }

    pub fn treatment_form(&self) -> Option<TreatmentKind> {
        self.treatment_form
    }

    pub fn chemical_select_html(&self) -> Option<&str> {
        self.chemical_select.as_deref()
    }

    pub fn treatment_results_html(&self) -> Option<&str> {
        self.treatment_results.as_deref()
    }

    pub fn alerts(&self, now: Instant) -> Vec<&Notification> {
        self.alerts
            .iter()
            .filter(|alert| !alert.is_expired(now))
            .collect()
    }

    pub fn document(&self, now: Instant) -> String {
        let mut body = String::new();
        for alert in self.alerts(now).into_iter().rev() {
            body.push_str(&render_alert(alert));
        }
        if let Some(file_name) = &self.preview {
            let _ = write!(
                body,
                "<div id=\"imagePreview\" class=\"active\">{}</div>",
                escape_html(file_name)
            );
        }
        if let Some(results) = &self.results {
            let _ = write!(body, "<section id=\"resultsSection\">{results}</section>");
        }
        if let Some(kind) = self.treatment_form {
            let _ = write!(
                body,
                "<section id=\"treatmentForm\" data-treatment=\"{kind}\">"
            );
            if let Some(select) = &self.chemical_select {
                let _ = write!(body, "<select id=\"chemicalSelect\">{select}</select>");
            }
            body.push_str("</section>");
        }
        if let Some(results) = &self.treatment_results {
            let _ = write!(body, "<section id=\"treatmentResults\">{results}</section>");
        }
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"UTF-8\">\
             <title>Plant Disease Detection</title></head>\
             <body><div class=\"container\">{body}</div></body></html>\n"
        )
    }
}

impl View for HtmlView {
    fn apply(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::ImagePreview { file_name, .. } => self.preview = Some(file_name),
            ViewUpdate::AnalyzeEnabled(enabled) => self.analyze_enabled = enabled,
            ViewUpdate::Loading(loading) => self.loading = loading,
            ViewUpdate::Detection(detection) => {
                self.results = Some(render_detection(&detection));
                self.treatment_form = None;
                self.chemical_select = None;
                self.treatment_results = None;
            }
            ViewUpdate::TreatmentSelected(kind) => {
                self.treatment_form = Some(kind);
                self.chemical_select = None;
                self.treatment_results = None;
            }
            ViewUpdate::OrganicRecipe(recipe) => {
                self.treatment_results = Some(render_organic_recipe(&recipe));
            }
            ViewUpdate::ChemicalOptions(options) => {
                self.chemical_select = Some(render_chemical_select(&options));
            }
            ViewUpdate::Dosage(dosage) => {
                self.treatment_results = Some(render_dosage(&dosage));
            }
            ViewUpdate::Notify(notification) => {
                let now = notification.raised_at;
                self.alerts.retain(|alert| !alert.is_expired(now));
                self.alerts.push(notification);
            }
            ViewUpdate::Cleared => {
                self.preview = None;
                self.analyze_enabled = false;
                self.loading = false;
                self.results = None;
                self.treatment_form = None;
                self.chemical_select = None;
                self.treatment_results = None;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
