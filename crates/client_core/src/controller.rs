//! Session controller: guards each user action against the current phase,
//! fences backend responses, and pushes every visible change through a [`View`].

use std::time::Instant;

use shared::{
    domain::{DetectionResult, DosageResult, TreatmentKind},
    protocol::DosageRequest,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    backend::{ImageUpload, TreatmentBackend},
    error::ControllerError,
    notify::{Notification, NotificationQueue},
    state::{Action, Phase, RequestClass, RequestFence, RequestToken, SessionState, TreatmentOutcome},
    view::{View, ViewUpdate},
};

const SELECT_IMAGE_FILE: &str = "Please select an image file";
const SELECT_IMAGE_FIRST: &str = "Please select an image first";
const REQUIRED_FIELDS: &str = "Please fill in all required fields";
const INVALID_MOTOR_CAPACITY: &str = "Motor capacity must be a positive number";
const INVALID_WATER_AMOUNT: &str = "Water amount must be a non-negative number";

const UPLOAD_CONTEXT: &str = "Error connecting to server";
const RECIPE_CONTEXT: &str = "Error fetching treatment";
const OPTIONS_CONTEXT: &str = "Error loading chemicals";
const DOSAGE_CONTEXT: &str = "Error calculating dosage";

struct ControllerInner<V> {
    state: SessionState,
    fence: RequestFence,
    notifications: NotificationQueue,
    view: V,
}

impl<V: View> ControllerInner<V> {
    fn emit(&mut self, update: ViewUpdate) {
        self.view.apply(update);
    }

    fn fail(&mut self, err: ControllerError) -> ControllerError {
        warn!(error = %err, phase = ?self.state.phase, "controller action failed");
        let notification = Notification::error(err.to_string(), Instant::now());
        self.notifications.push(notification.clone());
        self.emit(ViewUpdate::Notify(notification));
        err
    }

    fn begin_request(&mut self, class: RequestClass) -> RequestToken {
        self.state.in_flight += 1;
        if self.state.in_flight == 1 {
            self.emit(ViewUpdate::Loading(true));
        }
        self.fence.issue(class)
    }

    /// Runs on every completion path, stale or not. Requests issued before a
    /// reset were already dropped from the count by the reset itself.
    fn finish_request(&mut self, token: RequestToken) {
        if !self.fence.is_live_generation(token) {
            return;
        }
        self.state.in_flight = self.state.in_flight.saturating_sub(1);
        if self.state.in_flight == 0 {
            self.emit(ViewUpdate::Loading(false));
        }
    }

    fn is_stale(&self, token: RequestToken) -> bool {
        if self.fence.is_current(token) {
            return false;
        }
        debug!(?token, "dropping superseded response");
        true
    }

    fn apply_detection(&mut self, detection: DetectionResult) {
        self.fence.invalidate(RequestClass::ChemicalOptions);
        self.fence.invalidate(RequestClass::TreatmentResult);
        self.state.detection = Some(detection.clone());
        self.state.treatment = None;
        self.state.chemical_options.clear();
        self.state.outcome = None;
        self.state.phase = Phase::Detected;
        self.emit(ViewUpdate::Detection(detection));
    }
}

pub struct Controller<B, V> {
    backend: B,
    inner: Mutex<ControllerInner<V>>,
}

impl<B: TreatmentBackend, V: View> Controller<B, V> {
    pub fn new(backend: B, view: V) -> Self {
        Self {
            backend,
            inner: Mutex::new(ControllerInner {
                state: SessionState::default(),
                fence: RequestFence::default(),
                notifications: NotificationQueue::default(),
                view,
            }),
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn active_notifications(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .await
            .notifications
            .active(Instant::now())
    }

    pub async fn with_view<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.inner.lock().await.view)
    }

    pub fn into_view(self) -> V {
        self.inner.into_inner().view
    }

    pub async fn select_image(&self, upload: ImageUpload) -> Result<(), ControllerError> {
        let mut inner = self.inner.lock().await;
        if !upload.is_image() {
            return Err(inner.fail(ControllerError::validation(SELECT_IMAGE_FILE)));
        }
        inner.emit(ViewUpdate::ImagePreview {
            file_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: upload.bytes.len(),
        });
        inner.state.selected_image = Some(upload);
        let enabled = inner.state.analyze_enabled();
        inner.emit(ViewUpdate::AnalyzeEnabled(enabled));
        Ok(())
    }

    pub async fn submit_image(
        &self,
        upload: ImageUpload,
    ) -> Result<Option<DetectionResult>, ControllerError> {
        self.select_image(upload).await?;
        self.analyze().await
    }

    /// Classifies the selected image. `Ok(None)` means a later analysis or a
    /// reset superseded this one and its response was discarded.
    pub async fn analyze(&self) -> Result<Option<DetectionResult>, ControllerError> {
        let (token, upload) = {
            let mut inner = self.inner.lock().await;
            let Some(upload) = inner.state.selected_image.clone() else {
                return Err(inner.fail(ControllerError::validation(SELECT_IMAGE_FIRST)));
            };
            let token = inner.begin_request(RequestClass::Analysis);
            inner.state.phase = Phase::Analyzing;
            inner.emit(ViewUpdate::AnalyzeEnabled(false));
            (token, upload)
        };

        info!(
            file_name = %upload.file_name,
            size_bytes = upload.bytes.len(),
            "submitting image for analysis"
        );
        let outcome = self.backend.classify(upload).await;

        let mut inner = self.inner.lock().await;
        inner.finish_request(token);
        if inner.is_stale(token) {
            return Ok(None);
        }
        let result = match outcome {
            Ok(detection) => {
                info!(
                    disease_id = %detection.disease_id,
                    confidence = detection.confidence,
                    "detection received"
                );
                inner.apply_detection(detection.clone());
                Ok(Some(detection))
            }
            Err(err) => {
                inner.state.phase = inner.state.settled_phase();
                Err(inner.fail(ControllerError::from_backend(UPLOAD_CONTEXT, err)))
            }
        };
        let enabled = inner.state.analyze_enabled();
        inner.emit(ViewUpdate::AnalyzeEnabled(enabled));
        result
    }

    /// Chooses a treatment path for the current detection. Organic fetches the
    /// recipe right away; inorganic loads the chemical options to pick from.
    pub async fn select_treatment(&self, kind: TreatmentKind) -> Result<(), ControllerError> {
        let (token, disease_id) = {
            let mut inner = self.inner.lock().await;
            let disease_id = match inner.state.require_detection(Action::SelectTreatment) {
                Ok(disease_id) => disease_id,
                Err(err) => return Err(inner.fail(err)),
            };
            inner.fence.invalidate(RequestClass::ChemicalOptions);
            inner.fence.invalidate(RequestClass::TreatmentResult);
            inner.state.treatment = Some(kind);
            inner.state.chemical_options.clear();
            inner.state.outcome = None;
            inner.state.phase = Phase::ChoosingTreatment;
            inner.emit(ViewUpdate::TreatmentSelected(kind));
            let class = match kind {
                TreatmentKind::Organic => RequestClass::TreatmentResult,
                TreatmentKind::Inorganic => RequestClass::ChemicalOptions,
            };
            (inner.begin_request(class), disease_id)
        };

        info!(%disease_id, treatment = %kind, "treatment selected");
        match kind {
            TreatmentKind::Organic => {
                let outcome = self.backend.organic_treatment(&disease_id).await;
                let mut inner = self.inner.lock().await;
                inner.finish_request(token);
                if inner.is_stale(token) {
                    return Ok(());
                }
                match outcome {
                    Ok(recipe) => {
                        inner.state.outcome = Some(TreatmentOutcome::Organic(recipe.clone()));
                        inner.state.phase = Phase::ShowingResult;
                        inner.emit(ViewUpdate::OrganicRecipe(recipe));
                        Ok(())
                    }
                    Err(err) => Err(inner.fail(ControllerError::from_backend(RECIPE_CONTEXT, err))),
                }
            }
            TreatmentKind::Inorganic => {
                let outcome = self.backend.inorganic_options(&disease_id).await;
                let mut inner = self.inner.lock().await;
                inner.finish_request(token);
                if inner.is_stale(token) {
                    return Ok(());
                }
                match outcome {
                    Ok(options) => {
                        debug!(count = options.len(), "chemical options loaded");
                        inner.state.chemical_options = options.clone();
                        inner.emit(ViewUpdate::ChemicalOptions(options));
                        Ok(())
                    }
                    Err(err) => {
                        Err(inner.fail(ControllerError::from_backend(OPTIONS_CONTEXT, err)))
                    }
                }
            }
        }
    }

    /// Sizes a chemical dose for a sprayer of `motor_capacity` liters. With no
    /// `water_amount` the service fills the tank to capacity.
    pub async fn calculate_dosage(
        &self,
        chemical_name: &str,
        motor_capacity: Option<f64>,
        water_amount: Option<f64>,
    ) -> Result<Option<DosageResult>, ControllerError> {
        let (token, request) = {
            let mut inner = self.inner.lock().await;
            let chemical_name = chemical_name.trim();
            let Some(motor_capacity) = motor_capacity.filter(|_| !chemical_name.is_empty()) else {
                return Err(inner.fail(ControllerError::validation(REQUIRED_FIELDS)));
            };
            if !motor_capacity.is_finite() || motor_capacity <= 0.0 {
                return Err(inner.fail(ControllerError::validation(INVALID_MOTOR_CAPACITY)));
            }
            if water_amount.is_some_and(|water| !water.is_finite() || water < 0.0) {
                return Err(inner.fail(ControllerError::validation(INVALID_WATER_AMOUNT)));
            }
            let disease_id = match inner.state.require_detection(Action::CalculateDosage) {
                Ok(disease_id) => disease_id,
                Err(err) => return Err(inner.fail(err)),
            };
            if inner.state.treatment != Some(TreatmentKind::Inorganic) {
                return Err(inner.fail(ControllerError::TreatmentNotSelected {
                    action: Action::CalculateDosage,
                    expected: TreatmentKind::Inorganic,
                }));
            }
            let request = DosageRequest {
                disease_id,
                chemical_name: chemical_name.to_string(),
                motor_capacity,
                water_amount,
            };
            (inner.begin_request(RequestClass::TreatmentResult), request)
        };

        info!(
            disease_id = %request.disease_id,
            chemical = %request.chemical_name,
            motor_capacity = request.motor_capacity,
            water_amount = ?request.water_amount,
            "requesting dosage calculation"
        );
        let outcome = self.backend.calculate_dosage(&request).await;

        let mut inner = self.inner.lock().await;
        inner.finish_request(token);
        if inner.is_stale(token) {
            return Ok(None);
        }
        match outcome {
            Ok(dosage) => {
                inner.state.outcome = Some(TreatmentOutcome::Dosage(dosage.clone()));
                inner.state.phase = Phase::ShowingResult;
                inner.emit(ViewUpdate::Dosage(dosage.clone()));
                Ok(Some(dosage))
            }
            Err(err) => Err(inner.fail(ControllerError::from_backend(DOSAGE_CONTEXT, err))),
        }
    }

    /// Returns to a blank session. Responses still in flight are discarded.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.fence.invalidate_all();
        inner.state = SessionState::default();
        inner.emit(ViewUpdate::Cleared);
        inner.emit(ViewUpdate::AnalyzeEnabled(false));
        inner.emit(ViewUpdate::Loading(false));
        info!("session reset");
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
