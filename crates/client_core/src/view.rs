use shared::domain::{ChemicalOption, DetectionResult, DosageResult, OrganicRecipe, TreatmentKind};

use crate::notify::Notification;

/// A single change the controller wants reflected on screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    ImagePreview {
        file_name: String,
        mime_type: String,
        size_bytes: usize,
    },
    AnalyzeEnabled(bool),
    Loading(bool),
    /// Shows the detection and hides the treatment panels.
    Detection(DetectionResult),
    /// Shows the form for `kind` and hides any previous treatment result.
    TreatmentSelected(TreatmentKind),
    OrganicRecipe(OrganicRecipe),
    ChemicalOptions(Vec<ChemicalOption>),
    Dosage(DosageResult),
    Notify(Notification),
    /// Hides every panel and forgets the selected image.
    Cleared,
}

pub trait View: Send {
    fn apply(&mut self, update: ViewUpdate);
}

impl<V: View + ?Sized> View for Box<V> {
    fn apply(&mut self, update: ViewUpdate) {
        (**self).apply(update);
    }
}
