use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;

use crate::capture::domain::capture_request::{CaptureRequest, CaptureResult};
use crate::capture::domain::prediction_client::{PredictionClient, UploadError};

/// Multipart/form-data client for the liveness API.
///
/// Each capture is a single POST to `{base_url}/{mode}` carrying the image
/// under the `image` field and, for training, the label under `label`.
pub struct HttpPredictionClient {
    base_url: String,
    client: Client,
}

impl HttpPredictionClient {
    /// `timeout: None` waits for the server indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, UploadError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(UploadError::InvalidBaseUrl(base_url));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, request: &CaptureRequest) -> String {
        format!("{}{}", self.base_url, request.mode().endpoint_path())
    }

    fn build_form(request: &CaptureRequest) -> Result<Form, reqwest::Error> {
        let image = request.image();
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(image.mime_type)?;
        let form = Form::new().part("image", part);
        Ok(match request.label() {
            Some(label) => form.text("label", label.as_str()),
            None => form,
        })
    }
}

impl PredictionClient for HttpPredictionClient {
    fn submit(&self, request: &CaptureRequest) -> Result<CaptureResult, UploadError> {
        let url = self.endpoint_url(request);
        let transport = |e: reqwest::Error| UploadError::Transport {
            url: url.clone(),
            message: e.to_string(),
        };

        let form = Self::build_form(request).map_err(transport)?;
        log::debug!(
            "POST {url} ({} bytes, label: {:?})",
            request.image().bytes.len(),
            request.label()
        );
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().map_err(transport)?;
        if !status.is_success() {
            return Err(UploadError::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| UploadError::InvalidResponse {
                url: url.clone(),
                message: e.to_string(),
            })?
        };

        Ok(CaptureResult {
            mode: request.mode(),
            status: status.as_u16(),
            body,
            received_at: Utc::now(),
        })
    }
}
