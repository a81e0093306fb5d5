//! Image classification seam. The service stores uploads and delegates the
//! actual disease detection to whatever model endpoint is configured.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{DiseaseId, Severity},
    protocol::IMAGE_FIELD,
};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("no classifier is configured")]
    Unavailable,
    #[error("invalid classifier url: {0}")]
    InvalidUrl(String),
    #[error("failed to read stored image: {0}")]
    Io(#[from] std::io::Error),
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier rejected the image with status {0}")]
    Rejected(u16),
}

/// An upload already written to the upload directory.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: String,
}

/// Raw model output before catalog enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub disease_id: DiseaseId,
    pub severity: Severity,
    pub confidence: f64,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &StoredImage) -> Result<Classification, ClassifierError>;
}

/// Used when no classifier endpoint is configured; every upload fails.
pub struct MissingClassifier;

#[async_trait]
impl Classifier for MissingClassifier {
    async fn classify(&self, _image: &StoredImage) -> Result<Classification, ClassifierError> {
        Err(ClassifierError::Unavailable)
    }
}

/// Posts the stored image as multipart field `image` and expects
/// `{disease_id, severity, confidence}` back.
pub struct RemoteClassifier {
    http: Client,
    url: Url,
}

impl RemoteClassifier {
    pub fn new(url: &str) -> Result<Self, ClassifierError> {
        let url = Url::parse(url).map_err(|e| ClassifierError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClassifierError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        Ok(Self {
            http: Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(&self, image: &StoredImage) -> Result<Classification, ClassifierError> {
        let bytes = tokio::fs::read(&image.path).await?;
        debug!(
            file_name = %image.file_name,
            size_bytes = bytes.len(),
            url = %self.url,
            "forwarding image to classifier"
        );
        let part = Part::bytes(bytes)
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let response = self
            .http
            .post(self.url.clone())
            .multipart(Form::new().part(IMAGE_FIELD, part))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Rejected(status.as_u16()));
        }
        let mut classification: Classification = response.json().await?;
        classification.confidence = classification.confidence.clamp(0.0, 100.0);
        Ok(classification)
    }
}

#[cfg(test)]
#[path = "tests/classifier_tests.rs"]
mod tests;
