use super::*;
use shared::domain::Severity;

fn detection() -> DetectionResult {
    DetectionResult {
        disease_id: DiseaseId::from("rust"),
        disease_name: "Rust".to_string(),
        description: String::new(),
        severity: Severity::Moderate,
        confidence: 71.5,
    }
}

#[test]
fn fence_accepts_only_latest_token_per_class() {
    let mut fence = RequestFence::default();
    let first = fence.issue(RequestClass::Analysis);
    let options = fence.issue(RequestClass::ChemicalOptions);
    let second = fence.issue(RequestClass::Analysis);

    assert!(!fence.is_current(first));
    assert!(fence.is_current(second));
    assert!(fence.is_current(options));
}

#[test]
fn invalidate_all_retires_every_outstanding_token() {
    let mut fence = RequestFence::default();
    let tokens = [
        fence.issue(RequestClass::Analysis),
        fence.issue(RequestClass::ChemicalOptions),
        fence.issue(RequestClass::TreatmentResult),
    ];
    fence.invalidate_all();
    assert!(tokens.iter().all(|token| !fence.is_current(*token)));
    assert!(tokens.iter().all(|token| !fence.is_live_generation(*token)));
}

#[test]
fn class_invalidation_keeps_the_generation() {
    let mut fence = RequestFence::default();
    let options = fence.issue(RequestClass::ChemicalOptions);
    fence.invalidate(RequestClass::ChemicalOptions);

    assert!(!fence.is_current(options));
    assert!(fence.is_live_generation(options));
    let analysis = fence.issue(RequestClass::Analysis);
    assert!(fence.is_live_generation(analysis));
}

#[test]
fn settled_phase_follows_held_data() {
    let mut state = SessionState::default();
    assert_eq!(state.settled_phase(), Phase::Idle);

    state.detection = Some(detection());
    assert_eq!(state.settled_phase(), Phase::Detected);

    state.treatment = Some(TreatmentKind::Inorganic);
    assert_eq!(state.settled_phase(), Phase::ChoosingTreatment);

    state.outcome = Some(TreatmentOutcome::Organic(OrganicRecipe {
        name: "Neem spray".to_string(),
        ingredients: Vec::new(),
        preparation: Vec::new(),
        application: shared::domain::ApplicationPlan {
            method: "Spray".to_string(),
            frequency: "Weekly".to_string(),
            timing: "Evening".to_string(),
            duration: "3 weeks".to_string(),
        },
    }));
    assert_eq!(state.settled_phase(), Phase::ShowingResult);
}

#[test]
fn treatment_actions_require_a_settled_detection() {
    let mut state = SessionState::default();
    let err = state
        .require_detection(Action::SelectTreatment)
        .expect_err("idle session has no detection");
    assert_eq!(
        err.to_string(),
        "cannot select a treatment while no image has been analyzed"
    );

    state.detection = Some(detection());
    state.phase = Phase::Analyzing;
    assert!(matches!(
        state.require_detection(Action::CalculateDosage),
        Err(ControllerError::Precondition {
            phase: Phase::Analyzing,
            ..
        })
    ));

    state.phase = Phase::Detected;
    assert_eq!(
        state.require_detection(Action::SelectTreatment),
        Ok(DiseaseId::from("rust"))
    );
}

#[test]
fn analyze_is_enabled_only_with_an_idle_selected_image() {
    let mut state = SessionState::default();
    assert!(!state.analyze_enabled());

    state.selected_image = Some(ImageUpload::new("leaf.png", "image/png", vec![1, 2, 3]));
    assert!(state.analyze_enabled());

    state.phase = Phase::Analyzing;
    assert!(!state.analyze_enabled());
}
