use crate::utils::validation::FieldErrors;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tempfile::NamedTempFile;
use utoipa::ToSchema;

/// A file received through a multipart upload, spooled to a temporary file.
/// The temporary file is removed when the value is dropped.
#[derive(Debug)]
pub struct UploadedFile {
    pub client_name: Option<String>,
    pub size: u64,
    tmp: NamedTempFile,
}

impl UploadedFile {
    pub fn new(tmp: NamedTempFile, size: u64, client_name: Option<String>) -> Self {
        Self {
            client_name,
            size,
            tmp,
        }
    }

    pub fn tmp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Opens the spooled content for reading from the start.
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.tmp.path()).await
    }
}

/// Payload accepted by the validator.
///
/// `path` is trimmed and non-empty. At least one of `data_string` / `data_file`
/// is set; when both are, the file takes precedence.
#[derive(Debug)]
pub struct IncomingPayload {
    pub path: String,
    pub data_string: Option<Value>,
    pub data_file: Option<UploadedFile>,
}

#[derive(Debug)]
pub enum StorageContent {
    Stream(UploadedFile),
    Text(String),
}

/// What gets handed to a disk: resolved for one request, never persisted.
#[derive(Debug)]
pub struct StorageTarget {
    pub disk_name: String,
    pub path: String,
    pub content: StorageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// The only body shape returned by `POST /set`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn stored(path: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: "Data stored successfully".to_string(),
            path: Some(path.into()),
            errors: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            path: None,
            errors: None,
            error: None,
        }
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
