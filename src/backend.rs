//! Client side of the persistence backend.
//!
//! Endpoints:
//! - `GET  /classes`      → `["cat", "dog"]`
//! - `POST /classes`      `{className}` → `{success, classes, message?}`
//! - `POST /upload`       multipart field `image` → `{success, filename}`
//! - `POST /annotations`  [`SaveRequest`] → `{success, message?}`

use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};
use crate::session::SaveRequest;

/// Operations the annotation app needs from the backend.
pub trait Backend {
    fn fetch_classes(&self) -> Result<Vec<String>>;

    /// Append a class; returns the updated ordered list.
    fn add_class(&self, class_name: &str) -> Result<Vec<String>>;

    /// Store an image; returns the server-assigned filename.
    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;

    fn save_annotations(&self, request: &SaveRequest) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddClassRequest {
    pub class_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddClassResponse {
    pub success: bool,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Acknowledgement {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Add a class, treating "already exists" as success.
///
/// When the backend refuses the add, the class list is fetched again; if the
/// class is in it the refusal was a duplicate and the fresh list is returned.
pub fn add_class_idempotent(backend: &dyn Backend, class_name: &str) -> Result<Vec<String>> {
    match backend.add_class(class_name) {
        Ok(classes) => Ok(classes),
        Err(AnnotateError::Rejected { message }) => {
            let classes = backend.fetch_classes()?;
            if classes.iter().any(|c| c == class_name) {
                log::info!("Class '{}' already on the backend", class_name);
                Ok(classes)
            } else {
                Err(AnnotateError::Rejected { message })
            }
        }
        Err(e) => Err(e),
    }
}

/// [`Backend`] over HTTP with a blocking client. Meant to run on the worker
/// thread, never on the UI thread.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("box-annotate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text()?;
        parse_body(status, &body)
    }
}

/// Parse a JSON body. Error statuses are tolerated as long as the body
/// parses, since the backend reports refusals as `{success: false}`.
fn parse_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    match serde_json::from_str(body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => {
            Err(AnnotateError::rejected(format!("HTTP {}", status)))
        }
        Err(e) => Err(e.into()),
    }
}

fn added_classes(body: AddClassResponse) -> Result<Vec<String>> {
    if !body.success {
        return Err(rejection(body.message, "Class could not be added"));
    }
    Ok(body.classes)
}

fn rejection(message: Option<String>, fallback: &str) -> AnnotateError {
    AnnotateError::rejected(message.unwrap_or_else(|| fallback.to_string()))
}

impl Backend for HttpBackend {
    fn fetch_classes(&self) -> Result<Vec<String>> {
        log::debug!("GET {}", self.url("classes"));
        let response = self.client.get(self.url("classes")).send()?.error_for_status()?;
        Ok(response.json()?)
    }

    fn add_class(&self, class_name: &str) -> Result<Vec<String>> {
        log::debug!("POST {} '{}'", self.url("classes"), class_name);
        let response = self
            .client
            .post(self.url("classes"))
            .json(&AddClassRequest {
                class_name: class_name.to_string(),
            })
            .send()?;
        added_classes(Self::parse(response)?)
    }

    fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        log::debug!("POST {} ({} bytes)", self.url("upload"), bytes.len());
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("image", part);
        let response = self.client.post(self.url("upload")).multipart(form).send()?;
        let body: UploadResponse = Self::parse(response)?;
        if !body.success || body.filename.is_empty() {
            return Err(rejection(body.message, "Upload failed"));
        }
        Ok(body.filename)
    }

    fn save_annotations(&self, request: &SaveRequest) -> Result<()> {
        log::debug!(
            "POST {} '{}' ({} boxes)",
            self.url("annotations"),
            request.filename,
            request.boxes.len()
        );
        let response = self.client.post(self.url("annotations")).json(request).send()?;
        let body: Acknowledgement = Self::parse(response)?;
        if !body.success {
            return Err(rejection(body.message, "Annotations could not be saved"));
        }
        Ok(())
    }
}
