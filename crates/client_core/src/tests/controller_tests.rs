use std::{
    collections::VecDeque,
    sync::{Arc, Mutex as StdMutex},
};

use super::*;
use async_trait::async_trait;
use shared::domain::{
    ApplicationPlan, ChemicalDetails, ChemicalOption, DiseaseId, DiseaseInfo, MixingInstructions,
    OrganicRecipe, Severity,
};
use tokio::sync::{mpsc, oneshot};

use crate::{error::BackendError, render::HtmlView};

#[derive(Default)]
struct FakeBackend {
    detections: StdMutex<VecDeque<Result<DetectionResult, BackendError>>>,
    recipes: StdMutex<VecDeque<Result<OrganicRecipe, BackendError>>>,
    options: StdMutex<VecDeque<Result<Vec<ChemicalOption>, BackendError>>>,
    dosages: StdMutex<VecDeque<Result<DosageResult, BackendError>>>,
    calls: StdMutex<Vec<String>>,
    dosage_requests: StdMutex<Vec<DosageRequest>>,
    classify_gates: StdMutex<VecDeque<oneshot::Receiver<()>>>,
    entered: StdMutex<Option<mpsc::UnboundedSender<()>>>,
}

impl FakeBackend {
    fn with_detection(self, reply: Result<DetectionResult, BackendError>) -> Self {
        self.detections.lock().expect("lock").push_back(reply);
        self
    }

    fn with_recipe(self, reply: Result<OrganicRecipe, BackendError>) -> Self {
        self.recipes.lock().expect("lock").push_back(reply);
        self
    }

    fn with_options(self, reply: Result<Vec<ChemicalOption>, BackendError>) -> Self {
        self.options.lock().expect("lock").push_back(reply);
        self
    }

    fn with_dosage(self, reply: Result<DosageResult, BackendError>) -> Self {
        self.dosages.lock().expect("lock").push_back(reply);
        self
    }

    /// The next classify call blocks until the returned sender fires.
    fn gate_next_classify(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.classify_gates.lock().expect("lock").push_back(rx);
        tx
    }

    fn notify_entered(&self) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.entered.lock().expect("lock") = Some(tx);
        rx
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }
}

fn next<T>(queue: &StdMutex<VecDeque<Result<T, BackendError>>>) -> Result<T, BackendError> {
    queue
        .lock()
        .expect("lock")
        .pop_front()
        .unwrap_or_else(|| Err(BackendError::Transport("no scripted reply".to_string())))
}

#[async_trait]
impl TreatmentBackend for FakeBackend {
    async fn classify(&self, upload: ImageUpload) -> Result<DetectionResult, BackendError> {
        self.record(format!("classify:{}", upload.file_name));
        let reply = next(&self.detections);
        let gate = self.classify_gates.lock().expect("lock").pop_front();
        let entered = self.entered.lock().expect("lock").clone();
        if let Some(tx) = entered {
            let _ = tx.send(());
        }
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        reply
    }

    async fn organic_treatment(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<OrganicRecipe, BackendError> {
        self.record(format!("organic:{disease_id}"));
        next(&self.recipes)
    }

    async fn inorganic_options(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<Vec<ChemicalOption>, BackendError> {
        self.record(format!("options:{disease_id}"));
        next(&self.options)
    }

    async fn calculate_dosage(
        &self,
        request: &DosageRequest,
    ) -> Result<DosageResult, BackendError> {
        self.record(format!("dosage:{}", request.chemical_name));
        self.dosage_requests
            .lock()
            .expect("lock")
            .push(request.clone());
        next(&self.dosages)
    }

    async fn disease_info(&self, disease_id: &DiseaseId) -> Result<DiseaseInfo, BackendError> {
        self.record(format!("info:{disease_id}"));
        Err(BackendError::Server("Disease not found".to_string()))
    }
}

#[derive(Clone, Default)]
struct RecordingView {
    updates: Arc<StdMutex<Vec<ViewUpdate>>>,
}

impl RecordingView {
    fn updates(&self) -> Vec<ViewUpdate> {
        self.updates.lock().expect("lock").clone()
    }
}

impl View for RecordingView {
    fn apply(&mut self, update: ViewUpdate) {
        self.updates.lock().expect("lock").push(update);
    }
}

fn leaf() -> ImageUpload {
    ImageUpload::new("leaf.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff])
}

fn detection(disease_id: impl Into<DiseaseId>) -> DetectionResult {
    DetectionResult {
        disease_id: disease_id.into(),
        disease_name: "Leaf Blight".to_string(),
        description: "Brown lesions with yellow halos".to_string(),
        severity: Severity::Moderate,
        confidence: 62.37,
    }
}

fn recipe() -> OrganicRecipe {
    OrganicRecipe {
        name: "Neem oil spray".to_string(),
        ingredients: vec![
            "Neem oil 5 ml".to_string(),
            "Liquid soap 2 ml".to_string(),
            "Water 1 liter".to_string(),
        ],
        preparation: vec![
            "Warm the water".to_string(),
            "Emulsify oil with soap".to_string(),
            "Dilute and shake well".to_string(),
        ],
        application: ApplicationPlan {
            method: "Foliar spray".to_string(),
            frequency: "Every 7 days".to_string(),
            timing: "Evening".to_string(),
            duration: "4 weeks".to_string(),
        },
    }
}

fn copper() -> ChemicalOption {
    ChemicalOption {
        name: "CopperOxychloride".to_string(),
        concentration: "50% WP".to_string(),
        active_ingredient: Some("Copper oxychloride".to_string()),
        recommended_dose_per_liter: Some("2.5g".to_string()),
    }
}

fn dosage(remaining_capacity: f64) -> DosageResult {
    DosageResult {
        treatment_type: Some(TreatmentKind::Inorganic),
        disease_id: Some(DiseaseId::Numeric(42)),
        chemical_details: ChemicalDetails {
            name: "CopperOxychloride".to_string(),
            active_ingredient: "Copper oxychloride".to_string(),
            concentration: "50% WP".to_string(),
        },
        motor_capacity: 15.0,
        mixing_instructions: MixingInstructions {
            water_amount: 15.0,
            water_unit: "liters".to_string(),
            chemical_amount: 37.5,
            chemical_unit: "g".to_string(),
            mixing_ratio: "1:400".to_string(),
            remaining_capacity,
        },
        application_steps: vec!["Fill spray motor with 15 liters of clean water".to_string()],
        safety_precautions: vec!["Wear gloves".to_string()],
        recommended_dose_per_liter: Some("2.5g".to_string()),
    }
}

async fn detected_controller(
    backend: FakeBackend,
) -> (Controller<Arc<FakeBackend>, RecordingView>, Arc<FakeBackend>, RecordingView) {
    let backend = Arc::new(backend.with_detection(Ok(detection(42_i64))));
    let view = RecordingView::default();
    let controller = Controller::new(backend.clone(), view.clone());
    controller
        .submit_image(leaf())
        .await
        .expect("analysis succeeds");
    (controller, backend, view)
}

#[tokio::test]
async fn non_image_file_is_rejected_without_network() {
    let backend = Arc::new(FakeBackend::default());
    let view = RecordingView::default();
    let controller = Controller::new(backend.clone(), view.clone());

    let err = controller
        .submit_image(ImageUpload::new("notes.pdf", "application/pdf", vec![1]))
        .await
        .expect_err("validation failure");

    assert_eq!(err, ControllerError::validation("Please select an image file"));
    assert!(backend.calls().is_empty());
    assert!(view.updates().iter().any(|update| matches!(
        update,
        ViewUpdate::Notify(n) if n.message == "Please select an image file"
    )));
    assert_eq!(controller.snapshot().await.selected_image, None);
}

#[tokio::test]
async fn analyze_without_selected_image_is_rejected() {
    let backend = Arc::new(FakeBackend::default());
    let controller = Controller::new(backend.clone(), RecordingView::default());

    let err = controller.analyze().await.expect_err("no image");
    assert_eq!(err.to_string(), "Please select an image first");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn successful_analysis_stores_detection_and_hides_treatment_panel() {
    let (controller, backend, view) = detected_controller(FakeBackend::default()).await;

    let state = controller.snapshot().await;
    assert_eq!(state.detection, Some(detection(42_i64)));
    assert_eq!(state.phase, Phase::Detected);
    assert_eq!(state.treatment, None);
    assert!(!state.is_loading());
    assert_eq!(backend.calls(), vec!["classify:leaf.jpg".to_string()]);

    let updates = view.updates();
    assert!(updates.contains(&ViewUpdate::Detection(detection(42_i64))));
    assert!(!updates
        .iter()
        .any(|update| matches!(update, ViewUpdate::TreatmentSelected(_))));
    assert_eq!(updates.last(), Some(&ViewUpdate::AnalyzeEnabled(true)));
}

#[tokio::test]
async fn loading_brackets_every_outcome() {
    let backend = Arc::new(
        FakeBackend::default()
            .with_detection(Err(BackendError::Server("Failed to analyze image".to_string())))
            .with_detection(Err(BackendError::Transport("connection refused".to_string())))
            .with_detection(Ok(detection("rust"))),
    );
    let view = RecordingView::default();
    let controller = Controller::new(backend.clone(), view.clone());
    controller.select_image(leaf()).await.expect("select");

    let server = controller.analyze().await.expect_err("server failure");
    assert_eq!(server, ControllerError::Server("Failed to analyze image".to_string()));
    let transport = controller.analyze().await.expect_err("transport failure");
    assert_eq!(
        transport.to_string(),
        "Error connecting to server: connection refused"
    );
    controller.analyze().await.expect("success");

    let loading: Vec<bool> = view
        .updates()
        .into_iter()
        .filter_map(|update| match update {
            ViewUpdate::Loading(on) => Some(on),
            _ => None,
        })
        .collect();
    assert_eq!(loading, vec![true, false, true, false, true, false]);
    assert!(!controller.snapshot().await.is_loading());
}

#[tokio::test]
async fn failed_analysis_keeps_previous_detection() {
    let (controller, backend, _view) =
        detected_controller(FakeBackend::default().with_recipe(Ok(recipe()))).await;
    backend
        .detections
        .lock()
        .expect("lock")
        .push_back(Err(BackendError::Server("Failed to analyze image".to_string())));
    controller
        .select_treatment(TreatmentKind::Organic)
        .await
        .expect("recipe");

    controller.analyze().await.expect_err("second analysis fails");

    let state = controller.snapshot().await;
    assert_eq!(state.detection, Some(detection(42_i64)));
    assert_eq!(state.outcome, Some(TreatmentOutcome::Organic(recipe())));
    assert_eq!(state.phase, Phase::ShowingResult);
    assert_eq!(state.treatment, Some(TreatmentKind::Organic));
}

#[tokio::test]
async fn organic_recipe_renders_each_item_once_in_order() {
    let backend = Arc::new(
        FakeBackend::default()
            .with_detection(Ok(detection(42_i64)))
            .with_recipe(Ok(recipe())),
    );
    let controller = Controller::new(backend.clone(), HtmlView::new());
    controller.submit_image(leaf()).await.expect("analysis");
    assert!(controller.with_view(|view| view.treatment_form().is_none()).await);

    controller
        .select_treatment(TreatmentKind::Organic)
        .await
        .expect("recipe");

    assert_eq!(
        backend.calls(),
        vec!["classify:leaf.jpg".to_string(), "organic:42".to_string()]
    );
    let html = controller
        .with_view(|view| view.treatment_results_html().map(str::to_string))
        .await
        .expect("recipe panel visible");
    let recipe = recipe();
    for items in [&recipe.ingredients, &recipe.preparation] {
        let mut last = 0;
        for item in items {
            let needle = format!("<li>{item}</li>");
            assert_eq!(html.matches(&needle).count(), 1, "{item} rendered once");
            let position = html.find(&needle).expect("present");
            assert!(position > last, "{item} out of order");
            last = position;
        }
    }
    assert_eq!(controller.snapshot().await.phase, Phase::ShowingResult);
}

#[tokio::test]
async fn inorganic_selection_loads_chemical_options() {
    let (controller, backend, view) =
        detected_controller(FakeBackend::default().with_options(Ok(vec![copper()]))).await;

    controller
        .select_treatment(TreatmentKind::Inorganic)
        .await
        .expect("options");

    let state = controller.snapshot().await;
    assert_eq!(state.phase, Phase::ChoosingTreatment);
    assert_eq!(state.chemical_options, vec![copper()]);
    assert!(backend.calls().contains(&"options:42".to_string()));
    assert!(view
        .updates()
        .contains(&ViewUpdate::ChemicalOptions(vec![copper()])));
}

#[tokio::test]
async fn treatment_before_detection_is_a_precondition_error() {
    let backend = Arc::new(FakeBackend::default());
    let view = RecordingView::default();
    let controller = Controller::new(backend.clone(), view.clone());

    let err = controller
        .select_treatment(TreatmentKind::Organic)
        .await
        .expect_err("no detection");

    assert_eq!(
        err,
        ControllerError::Precondition {
            action: Action::SelectTreatment,
            phase: Phase::Idle,
        }
    );
    assert!(backend.calls().is_empty());
    assert!(view
        .updates()
        .iter()
        .any(|update| matches!(update, ViewUpdate::Notify(_))));
}

#[tokio::test]
async fn dosage_without_water_sends_null_and_renders_reply() {
    let (controller, backend, _view) = detected_controller(
        FakeBackend::default()
            .with_options(Ok(vec![copper()]))
            .with_dosage(Ok(dosage(0.0))),
    )
    .await;
    controller
        .select_treatment(TreatmentKind::Inorganic)
        .await
        .expect("options");

    let result = controller
        .calculate_dosage("CopperOxychloride", Some(15.0), None)
        .await
        .expect("dosage")
        .expect("applied");

    let requests = backend.dosage_requests.lock().expect("lock").clone();
    assert_eq!(
        requests,
        vec![DosageRequest {
            disease_id: DiseaseId::Numeric(42),
            chemical_name: "CopperOxychloride".to_string(),
            motor_capacity: 15.0,
            water_amount: None,
        }]
    );
    let wire = serde_json::to_value(&requests[0]).expect("json");
    assert!(wire["water_amount"].is_null());
    assert_eq!(result, dosage(0.0));
    assert_eq!(
        controller.snapshot().await.outcome,
        Some(TreatmentOutcome::Dosage(dosage(0.0)))
    );
}

#[tokio::test]
async fn dosage_html_shows_literal_remaining_capacity() {
    let backend = Arc::new(
        FakeBackend::default()
            .with_detection(Ok(detection(42_i64)))
            .with_options(Ok(vec![copper()]))
            .with_dosage(Ok(dosage(2.75))),
    );
    let controller = Controller::new(backend, HtmlView::new());
    controller.submit_image(leaf()).await.expect("analysis");
    controller
        .select_treatment(TreatmentKind::Inorganic)
        .await
        .expect("options");
    controller
        .calculate_dosage("CopperOxychloride", Some(15.0), None)
        .await
        .expect("dosage");

    let html = controller
        .with_view(|view| view.treatment_results_html().map(str::to_string))
        .await
        .expect("dosage panel");
    assert!(html.contains("<span class=\"dosage-value\">2.75 liters</span>"));
    assert!(html.contains("<span class=\"dosage-value\">1:400</span>"));
}

#[tokio::test]
async fn missing_dosage_fields_are_rejected_before_any_request() {
    let (controller, backend, _view) =
        detected_controller(FakeBackend::default().with_options(Ok(vec![copper()]))).await;
    controller
        .select_treatment(TreatmentKind::Inorganic)
        .await
        .expect("options");
    let calls_before = backend.calls().len();

    for (name, capacity, water) in [
        ("", Some(15.0), None),
        ("   ", Some(15.0), None),
        ("CopperOxychloride", None, None),
    ] {
        let err = controller
            .calculate_dosage(name, capacity, water)
            .await
            .expect_err("missing field");
        assert_eq!(err.to_string(), "Please fill in all required fields");
    }
    let err = controller
        .calculate_dosage("CopperOxychloride", Some(-3.0), None)
        .await
        .expect_err("negative capacity");
    assert!(matches!(err, ControllerError::Validation(_)));
    let err = controller
        .calculate_dosage("CopperOxychloride", Some(10.0), Some(f64::NAN))
        .await
        .expect_err("nan water");
    assert!(matches!(err, ControllerError::Validation(_)));

    assert_eq!(backend.calls().len(), calls_before);
}

#[tokio::test]
async fn dosage_requires_inorganic_path() {
    let (controller, backend, _view) =
        detected_controller(FakeBackend::default().with_recipe(Ok(recipe()))).await;
    controller
        .select_treatment(TreatmentKind::Organic)
        .await
        .expect("recipe");

    let err = controller
        .calculate_dosage("CopperOxychloride", Some(15.0), None)
        .await
        .expect_err("organic path");
    assert_eq!(
        err.to_string(),
        "cannot calculate a dosage unless the inorganic treatment is selected"
    );
    assert!(!backend
        .calls()
        .iter()
        .any(|call| call.starts_with("dosage:")));
}

#[tokio::test]
async fn failed_calculation_shows_server_message_and_keeps_previous_result() {
    let (controller, _backend, view) = detected_controller(
        FakeBackend::default()
            .with_options(Ok(vec![copper()]))
            .with_dosage(Ok(dosage(0.0)))
            .with_dosage(Err(BackendError::Server("chemical not found".to_string()))),
    )
    .await;
    controller
        .select_treatment(TreatmentKind::Inorganic)
        .await
        .expect("options");
    controller
        .calculate_dosage("CopperOxychloride", Some(15.0), None)
        .await
        .expect("first dosage");

    let err = controller
        .calculate_dosage("Unobtainium", Some(15.0), Some(10.0))
        .await
        .expect_err("second dosage fails");

    assert_eq!(err, ControllerError::Server("chemical not found".to_string()));
    let updates = view.updates();
    assert!(matches!(
        updates.iter().rev().find(|u| matches!(u, ViewUpdate::Notify(_))),
        Some(ViewUpdate::Notify(n)) if n.message == "chemical not found"
    ));
    let dosage_updates = updates
        .iter()
        .filter(|update| matches!(update, ViewUpdate::Dosage(_)))
        .count();
    assert_eq!(dosage_updates, 1);
    let state = controller.snapshot().await;
    assert_eq!(state.outcome, Some(TreatmentOutcome::Dosage(dosage(0.0))));
    assert_eq!(state.phase, Phase::ShowingResult);
    assert_eq!(
        controller
            .active_notifications()
            .await
            .last()
            .map(|n| n.message.clone()),
        Some("chemical not found".to_string())
    );
}

#[tokio::test]
async fn transport_failures_carry_context_per_action() {
    let (controller, _backend, _view) = detected_controller(
        FakeBackend::default()
            .with_recipe(Err(BackendError::Transport("timed out".to_string())))
            .with_options(Err(BackendError::Transport("reset by peer".to_string()))),
    )
    .await;

    let recipe_err = controller
        .select_treatment(TreatmentKind::Organic)
        .await
        .expect_err("recipe transport failure");
    assert_eq!(recipe_err.to_string(), "Error fetching treatment: timed out");

    let options_err = controller
        .select_treatment(TreatmentKind::Inorganic)
        .await
        .expect_err("options transport failure");
    assert_eq!(options_err.to_string(), "Error loading chemicals: reset by peer");
}

#[tokio::test]
async fn reset_clears_everything_and_is_idempotent() {
    let backend = Arc::new(
        FakeBackend::default()
            .with_detection(Ok(detection(42_i64)))
            .with_recipe(Ok(recipe())),
    );
    let controller = Controller::new(backend, HtmlView::new());
    controller.submit_image(leaf()).await.expect("analysis");
    controller
        .select_treatment(TreatmentKind::Organic)
        .await
        .expect("recipe");

    for _ in 0..3 {
        controller.reset().await;
        let state = controller.snapshot().await;
        assert_eq!(state, SessionState::default());
        assert!(!state.analyze_enabled());
        controller
            .with_view(|view| {
                assert!(!view.analyze_enabled());
                assert!(view.preview().is_none());
                assert!(view.results_html().is_none());
                assert!(view.treatment_form().is_none());
                assert!(view.treatment_results_html().is_none());
                assert!(!view.loading());
            })
            .await;
    }
}

#[tokio::test]
async fn stale_analysis_response_never_overwrites_newer_one() {
    let backend = Arc::new(
        FakeBackend::default()
            .with_detection(Ok(detection("leaf_blight")))
            .with_detection(Ok(detection("rust"))),
    );
    let release_first = backend.gate_next_classify();
    let mut entered = backend.notify_entered();
    let controller = Arc::new(Controller::new(backend.clone(), RecordingView::default()));
    controller.select_image(leaf()).await.expect("select");

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.analyze().await }
    });
    entered.recv().await.expect("first request in flight");

    let second = controller.analyze().await.expect("second analysis");
    assert_eq!(second, Some(detection("rust")));

    release_first.send(()).expect("release");
    let first = first.await.expect("join").expect("first analysis");
    assert_eq!(first, None);

    let state = controller.snapshot().await;
    assert_eq!(state.detection, Some(detection("rust")));
    assert_eq!(state.phase, Phase::Detected);
    assert!(!state.is_loading());
}

#[tokio::test]
async fn response_arriving_after_reset_is_dropped() {
    let backend = Arc::new(FakeBackend::default().with_detection(Ok(detection(42_i64))));
    let release = backend.gate_next_classify();
    let mut entered = backend.notify_entered();
    let view = RecordingView::default();
    let controller = Arc::new(Controller::new(backend.clone(), view.clone()));
    controller.select_image(leaf()).await.expect("select");

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.analyze().await }
    });
    entered.recv().await.expect("request in flight");
    controller.reset().await;
    release.send(()).expect("release");

    assert_eq!(pending.await.expect("join").expect("analysis"), None);
    assert_eq!(controller.snapshot().await, SessionState::default());
    assert!(!view
        .updates()
        .iter()
        .any(|update| matches!(update, ViewUpdate::Detection(_))));
}

#[tokio::test]
async fn reply_from_before_reset_keeps_new_analysis_loading() {
    let backend = Arc::new(
        FakeBackend::default()
            .with_detection(Ok(detection("leaf_blight")))
            .with_detection(Ok(detection("rust"))),
    );
    let release_old = backend.gate_next_classify();
    let release_new = backend.gate_next_classify();
    let mut entered = backend.notify_entered();
    let view = RecordingView::default();
    let controller = Arc::new(Controller::new(backend.clone(), view.clone()));

    controller.select_image(leaf()).await.expect("select");
    let old = tokio::spawn({
        let controller = controller.clone();
        async move { controller.analyze().await }
    });
    entered.recv().await.expect("old request in flight");

    controller.reset().await;
    controller.select_image(leaf()).await.expect("select again");
    let new = tokio::spawn({
        let controller = controller.clone();
        async move { controller.analyze().await }
    });
    entered.recv().await.expect("new request in flight");

    release_old.send(()).expect("release old");
    assert_eq!(old.await.expect("join").expect("old analysis"), None);

    let state = controller.snapshot().await;
    assert_eq!(state.phase, Phase::Analyzing);
    assert_eq!(state.in_flight, 1);
    assert!(state.is_loading());
    let last_loading = view.updates().into_iter().rev().find_map(|update| match update {
        ViewUpdate::Loading(on) => Some(on),
        _ => None,
    });
    assert_eq!(last_loading, Some(true));

    release_new.send(()).expect("release new");
    let fresh = new.await.expect("join").expect("new analysis");
    assert_eq!(fresh, Some(detection("rust")));
    let state = controller.snapshot().await;
    assert_eq!(state.detection, Some(detection("rust")));
    assert!(!state.is_loading());
    assert_eq!(view.updates().last(), Some(&ViewUpdate::AnalyzeEnabled(true)));
}
