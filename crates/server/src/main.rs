use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, Path,
        State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{DiseaseInfo, DosageResult},
    error::{ApiError, ErrorBody, ErrorCode},
    protocol::{
        disease_info_route, inorganic_calculate_route, inorganic_options_route,
        organic_treatment_route, upload_route, OrganicTreatmentResponse, UploadResponse,
        IMAGE_FIELD,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod advisor;
mod api;
mod app_state;
mod catalog;
mod classifier;
mod config;

use api::{ApiContext, CalculateQuery, ChemicalOptionsReply, DiseaseQuery, ImageSubmission};
use app_state::AppState;
use catalog::Catalog;
use classifier::{Classifier, MissingClassifier, RemoteClassifier};
use config::{load_settings, prepare_upload_dir};

type Rejection = (StatusCode, Json<ErrorBody>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let upload_dir = prepare_upload_dir(&settings.upload_dir)?;
    let catalog = Catalog::load(settings.data_dir.as_deref())
        .context("failed to load treatment catalog")?;
    info!(diseases = catalog.diseases().len(), "treatment catalog loaded");
    let classifier: Arc<dyn Classifier> = match settings.classifier_url.as_deref() {
        Some(url) => {
            let remote = RemoteClassifier::new(url).context("invalid classifier url")?;
            info!(url = %remote.url(), "using remote classifier");
            Arc::new(remote)
        }
        None => {
            warn!("no classifier configured; uploads will fail to analyze");
            Arc::new(MissingClassifier)
        }
    };

    let state = AppState {
        api: ApiContext {
            catalog: Arc::new(catalog),
            classifier,
            upload_dir,
        },
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route(upload_route(), post(upload_image))
        .route(organic_treatment_route(), post(organic_treatment))
        .route(inorganic_options_route(), post(inorganic_options))
        .route(inorganic_calculate_route(), post(calculate_dosage))
        .route(disease_info_route(), get(disease_info))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

fn reject(err: ApiError) -> Rejection {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.body()))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Rejection> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        reject(ApiError::new(
            ErrorCode::Validation,
            format!("Invalid request body: {}", rejection.body_text()),
        ))
    })
}

fn multipart_failure(err: MultipartError) -> Rejection {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return reject(ApiError::new(ErrorCode::PayloadTooLarge, "File too large"));
    }
    reject(ApiError::new(
        ErrorCode::Validation,
        format!("Invalid upload: {}", err.body_text()),
    ))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Rejection> {
    let mut submission = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_failure)?;
        submission = Some(ImageSubmission {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }
    let submission = submission.ok_or_else(|| {
        reject(ApiError::new(ErrorCode::Validation, "No image file provided"))
    })?;

    let detection = api::analyze_upload(&state.api, submission)
        .await
        .map_err(reject)?;
    Ok(Json(UploadResponse {
        success: true,
        detection: Some(detection),
        error: None,
    }))
}

async fn organic_treatment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiseaseQuery>, JsonRejection>,
) -> Result<Json<OrganicTreatmentResponse>, Rejection> {
    let query = json_body(payload)?;
    api::organic_treatment(&state.api, query)
        .map(Json)
        .map_err(reject)
}

async fn inorganic_options(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiseaseQuery>, JsonRejection>,
) -> Result<Json<ChemicalOptionsReply>, Rejection> {
    let query = json_body(payload)?;
    api::inorganic_options(&state.api, query)
        .map(Json)
        .map_err(reject)
}

async fn calculate_dosage(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CalculateQuery>, JsonRejection>,
) -> Result<Json<DosageResult>, Rejection> {
    let query = json_body(payload)?;
    api::calculate_dosage(&state.api, query)
        .map(Json)
        .map_err(reject)
}

async fn disease_info(
    State(state): State<Arc<AppState>>,
    Path(disease_id): Path<String>,
) -> Result<Json<DiseaseInfo>, Rejection> {
    api::disease_info(&state.api, &disease_id)
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
