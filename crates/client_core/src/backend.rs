use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{ChemicalOption, DetectionResult, DiseaseId, DiseaseInfo, DosageResult, OrganicRecipe},
    protocol::{
        disease_info_path, inorganic_calculate_route, inorganic_options_route,
        organic_treatment_route, upload_route, DiseaseRequest, DosageRequest,
        InorganicOptionsResponse, OrganicTreatmentResponse, UploadResponse, IMAGE_FIELD,
    },
};
use tracing::debug;
use url::Url;

use crate::error::BackendError;

const ANALYSIS_FAILED: &str = "Failed to analyze image";

/// An image picked by the user, held until it is analyzed or replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

#[async_trait]
pub trait TreatmentBackend: Send + Sync {
    async fn classify(&self, upload: ImageUpload) -> Result<DetectionResult, BackendError>;
    async fn organic_treatment(&self, disease_id: &DiseaseId)
        -> Result<OrganicRecipe, BackendError>;
    async fn inorganic_options(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<Vec<ChemicalOption>, BackendError>;
    async fn calculate_dosage(&self, request: &DosageRequest)
        -> Result<DosageResult, BackendError>;
    async fn disease_info(&self, disease_id: &DiseaseId) -> Result<DiseaseInfo, BackendError>;
}

#[async_trait]
impl<T> TreatmentBackend for Arc<T>
where
    T: TreatmentBackend + ?Sized,
{
    async fn classify(&self, upload: ImageUpload) -> Result<DetectionResult, BackendError> {
        (**self).classify(upload).await
    }

    async fn organic_treatment(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<OrganicRecipe, BackendError> {
        (**self).organic_treatment(disease_id).await
    }

    async fn inorganic_options(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<Vec<ChemicalOption>, BackendError> {
        (**self).inorganic_options(disease_id).await
    }

    async fn calculate_dosage(
        &self,
        request: &DosageRequest,
    ) -> Result<DosageResult, BackendError> {
        (**self).calculate_dosage(request).await
    }

    async fn disease_info(&self, disease_id: &DiseaseId) -> Result<DiseaseInfo, BackendError> {
        (**self).disease_info(disease_id).await
    }
}

pub struct HttpBackend {
    http: Client,
    server_url: String,
}

impl HttpBackend {
    pub fn new(server_url: &str) -> Result<Self, BackendError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, BackendError> {
        let parsed = Url::parse(server_url.trim()).map_err(|e| {
            BackendError::Transport(format!("invalid server url '{server_url}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::Transport(format!(
                "unsupported server url scheme '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            http,
            server_url: server_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

/// Reads a JSON body regardless of status; the service reports failures in the body.
async fn read_json(response: Response) -> Result<(StatusCode, Value), BackendError> {
    let status = response.status();
    let body = response.bytes().await?;
    let value = serde_json::from_slice(&body).map_err(|e| {
        BackendError::Transport(format!("malformed response (status {status}): {e}"))
    })?;
    Ok((status, value))
}

fn decode_reply<T: DeserializeOwned>(status: StatusCode, value: Value) -> Result<T, BackendError> {
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(BackendError::Server(message.to_string()));
    }
    if !status.is_success() {
        return Err(BackendError::Server(format!(
            "request failed with status {status}"
        )));
    }
    serde_json::from_value(value)
        .map_err(|e| BackendError::Transport(format!("malformed response: {e}")))
}

fn decode_upload(value: Value) -> Result<DetectionResult, BackendError> {
    let reply: UploadResponse = serde_json::from_value(value)
        .map_err(|e| BackendError::Transport(format!("malformed response: {e}")))?;
    match reply {
        UploadResponse {
            success: true,
            detection: Some(detection),
            ..
        } => Ok(detection),
        UploadResponse { success: true, .. } => Err(BackendError::Transport(
            "malformed response: detection missing".to_string(),
        )),
        UploadResponse { error, .. } => Err(BackendError::Server(
            error.unwrap_or_else(|| ANALYSIS_FAILED.to_string()),
        )),
    }
}

#[async_trait]
impl TreatmentBackend for HttpBackend {
    async fn classify(&self, upload: ImageUpload) -> Result<DetectionResult, BackendError> {
        let size_bytes = upload.bytes.len();
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
        let form = Form::new().part(IMAGE_FIELD, part);
        let response = self
            .http
            .post(self.endpoint(upload_route()))
            .multipart(form)
            .send()
            .await?;
        let (status, value) = read_json(response).await?;
        debug!(%status, size_bytes, "classification reply received");
        decode_upload(value)
    }

    async fn organic_treatment(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<OrganicRecipe, BackendError> {
        let response = self
            .http
            .post(self.endpoint(organic_treatment_route()))
            .json(&DiseaseRequest {
                disease_id: disease_id.clone(),
            })
            .send()
            .await?;
        let (status, value) = read_json(response).await?;
        let reply: OrganicTreatmentResponse = decode_reply(status, value)?;
        Ok(reply.recipe)
    }

    async fn inorganic_options(
        &self,
        disease_id: &DiseaseId,
    ) -> Result<Vec<ChemicalOption>, BackendError> {
        let response = self
            .http
            .post(self.endpoint(inorganic_options_route()))
            .json(&DiseaseRequest {
                disease_id: disease_id.clone(),
            })
            .send()
            .await?;
        let (status, value) = read_json(response).await?;
        let reply: InorganicOptionsResponse = decode_reply(status, value)?;
        Ok(reply.available_chemicals)
    }

    async fn calculate_dosage(
        &self,
        request: &DosageRequest,
    ) -> Result<DosageResult, BackendError> {
        let response = self
            .http
            .post(self.endpoint(inorganic_calculate_route()))
            .json(request)
            .send()
            .await?;
        let (status, value) = read_json(response).await?;
        decode_reply(status, value)
    }

    async fn disease_info(&self, disease_id: &DiseaseId) -> Result<DiseaseInfo, BackendError> {
        let response = self
            .http
            .get(self.endpoint(&disease_info_path(disease_id)))
            .send()
            .await?;
        let (status, value) = read_json(response).await?;
        decode_reply(status, value)
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
