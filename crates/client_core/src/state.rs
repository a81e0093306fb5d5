use std::fmt;

use shared::domain::{
    ChemicalOption, DetectionResult, DiseaseId, DosageResult, OrganicRecipe, TreatmentKind,
};

use crate::{backend::ImageUpload, error::ControllerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Analyzing,
    Detected,
    ChoosingTreatment,
    ShowingResult,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "no image has been analyzed",
            Self::Analyzing => "an analysis is in progress",
            Self::Detected => "a detection is shown",
            Self::ChoosingTreatment => "choosing a treatment",
            Self::ShowingResult => "a treatment result is shown",
        })
    }
}

/// Guarded controller actions, named in precondition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectTreatment,
    CalculateDosage,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SelectTreatment => "select a treatment",
            Self::CalculateDosage => "calculate a dosage",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreatmentOutcome {
    Organic(OrganicRecipe),
    Dosage(DosageResult),
}

/// Transient per-session state. Only the controller mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub phase: Phase,
    pub selected_image: Option<ImageUpload>,
    pub detection: Option<DetectionResult>,
    pub treatment: Option<TreatmentKind>,
    pub chemical_options: Vec<ChemicalOption>,
    pub outcome: Option<TreatmentOutcome>,
    pub in_flight: usize,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn analyze_enabled(&self) -> bool {
        self.selected_image.is_some() && self.phase != Phase::Analyzing
    }

    /// Phase implied by the data held, used once an analysis settles.
    pub fn settled_phase(&self) -> Phase {
        if self.detection.is_none() {
            Phase::Idle
        } else if self.outcome.is_some() {
            Phase::ShowingResult
        } else if self.treatment.is_some() {
            Phase::ChoosingTreatment
        } else {
            Phase::Detected
        }
    }

    pub fn require_detection(&self, action: Action) -> Result<DiseaseId, ControllerError> {
        if self.phase == Phase::Analyzing {
            return Err(ControllerError::Precondition {
                action,
                phase: self.phase,
            });
        }
        self.detection
            .as_ref()
            .map(|detection| detection.disease_id.clone())
            .ok_or(ControllerError::Precondition {
                action,
                phase: self.phase,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Analysis,
    ChemicalOptions,
    TreatmentResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub class: RequestClass,
    pub seq: u64,
    pub generation: u64,
}

/// Latest issued sequence number per request class. A response is applied
/// only while its token is still the latest for its class. The generation
/// advances on every full invalidation, so requests issued before a reset can
/// be told apart from live ones.
#[derive(Debug, Default)]
pub struct RequestFence {
    generation: u64,
    analysis: u64,
    chemical_options: u64,
    treatment_result: u64,
}

impl RequestFence {
    fn slot(&mut self, class: RequestClass) -> &mut u64 {
        match class {
            RequestClass::Analysis => &mut self.analysis,
            RequestClass::ChemicalOptions => &mut self.chemical_options,
            RequestClass::TreatmentResult => &mut self.treatment_result,
        }
    }

    pub fn issue(&mut self, class: RequestClass) -> RequestToken {
        let slot = self.slot(class);
        *slot += 1;
        let seq = *slot;
        RequestToken {
            class,
            seq,
            generation: self.generation,
        }
    }

    /// True when the token was issued since the last full invalidation.
    pub fn is_live_generation(&self, token: RequestToken) -> bool {
        token.generation == self.generation
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        let latest = match token.class {
            RequestClass::Analysis => self.analysis,
            RequestClass::ChemicalOptions => self.chemical_options,
            RequestClass::TreatmentResult => self.treatment_result,
        };
        latest == token.seq
    }

    pub fn invalidate(&mut self, class: RequestClass) {
        *self.slot(class) += 1;
    }

    pub fn invalidate_all(&mut self) {
        self.generation += 1;
        self.invalidate(RequestClass::Analysis);
        self.invalidate(RequestClass::ChemicalOptions);
        self.invalidate(RequestClass::TreatmentResult);
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
