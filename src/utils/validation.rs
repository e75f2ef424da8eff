use crate::models::{IncomingPayload, UploadedFile};
use serde::Serialize;
use serde::ser::SerializeMap;
use serde_json::Value;
use std::fmt;
use validator::Validate;

pub const FIELD_PATH: &str = "path";
pub const FIELD_DATA_STRING: &str = "dataString";
pub const FIELD_DATA_FILE: &str = "dataFile";

/// Message templates. `{field}` and the constraint parameters are substituted at render time.
mod messages {
    pub const PATH_REQUIRED: &str = "A valid path is required for storing the data";
    pub const STRING: &str = "The value of {field} field must be a string";
    pub const MIN_LENGTH: &str = "The {field} must be at least {min} characters long";
    pub const REQUIRED_IF_MISSING: &str =
        "The {field} field is required when {otherField} is not provided";
    pub const FILE: &str = "The dataFile must be a valid file";
    pub const FILE_SIZE: &str = "The {field} size must not be greater than {size}";
}

fn render(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |message, (key, value)| {
            message.replace(&format!("{{{}}}", key), value)
        })
}

/// Field name -> messages, kept in the order fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(String, Vec<String>)>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: String) {
        match self.0.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.0.push((field.to_string(), vec![message])),
        }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, messages) in &self.0 {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// What the request carried under `dataFile`.
#[derive(Debug)]
pub enum RawFile {
    Upload(UploadedFile),
    /// A value that is not an uploaded file (JSON value, plain form field).
    NotAFile,
}

/// Unvalidated fields extracted from a request body.
#[derive(Debug, Default)]
pub struct RawPayload {
    pub path: Option<Value>,
    pub data_string: Option<Value>,
    pub data_file: Option<RawFile>,
}

#[derive(Debug, Validate)]
struct PathRules {
    #[validate(length(min = 1, code = "minLength"))]
    path: String,
}

/// Null and empty strings count as absent.
fn present(value: Option<Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        other => other,
    }
}

fn validate_path(value: Option<Value>, errors: &mut FieldErrors) -> Option<String> {
    let raw = match present(value) {
        None => {
            errors.add(FIELD_PATH, messages::PATH_REQUIRED.to_string());
            return None;
        }
        Some(Value::String(s)) => s,
        Some(_) => {
            errors.add(FIELD_PATH, render(messages::STRING, &[("field", FIELD_PATH)]));
            return None;
        }
    };

    let rules = PathRules {
        path: raw.trim().to_string(),
    };
    match rules.validate() {
        Ok(()) => Some(rules.path),
        Err(violations) => {
            if let Some(list) = violations.field_errors().get(FIELD_PATH) {
                for violation in list.iter() {
                    let mut params: Vec<(String, String)> = violation
                        .params
                        .iter()
                        .map(|(key, value)| (key.to_string(), value.to_string()))
                        .collect();
                    params.push(("field".to_string(), FIELD_PATH.to_string()));
                    let params: Vec<(&str, &str)> = params
                        .iter()
                        .map(|(key, value)| (key.as_str(), value.as_str()))
                        .collect();
                    errors.add(FIELD_PATH, render(messages::MIN_LENGTH, &params));
                }
            }
            None
        }
    }
}

/// Renders a byte count the way limits are usually written (`50mb`, `512kb`).
pub fn human_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    const GB: usize = 1024 * MB;

    match bytes {
        b if b >= GB && b % GB == 0 => format!("{}gb", b / GB),
        b if b >= MB && b % MB == 0 => format!("{}mb", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}kb", b / KB),
        b => format!("{} bytes", b),
    }
}

fn validate_file(
    file: Option<RawFile>,
    max_file_size: usize,
    errors: &mut FieldErrors,
) -> Option<UploadedFile> {
    match file? {
        RawFile::NotAFile => {
            errors.add(FIELD_DATA_FILE, messages::FILE.to_string());
            None
        }
        RawFile::Upload(upload) if upload.size > max_file_size as u64 => {
            errors.add(
                FIELD_DATA_FILE,
                render(
                    messages::FILE_SIZE,
                    &[("field", FIELD_DATA_FILE), ("size", &human_size(max_file_size))],
                ),
            );
            None
        }
        RawFile::Upload(upload) => Some(upload),
    }
}

/// Validates a raw payload into an [`IncomingPayload`].
///
/// `path` is trimmed and must be non-empty. `dataString` accepts any JSON value and
/// is kept untrimmed. `dataFile` must be an uploaded file within `max_file_size`.
/// Each data field is required when the other one is missing.
pub fn validate_payload(
    raw: RawPayload,
    max_file_size: usize,
) -> Result<IncomingPayload, FieldErrors> {
    let mut errors = FieldErrors::default();

    let file_supplied = raw.data_file.is_some();
    let data_string = present(raw.data_string);

    let path = validate_path(raw.path, &mut errors);

    if data_string.is_none() && !file_supplied {
        errors.add(
            FIELD_DATA_STRING,
            render(
                messages::REQUIRED_IF_MISSING,
                &[("field", FIELD_DATA_STRING), ("otherField", FIELD_DATA_FILE)],
            ),
        );
        errors.add(
            FIELD_DATA_FILE,
            render(
                messages::REQUIRED_IF_MISSING,
                &[("field", FIELD_DATA_FILE), ("otherField", FIELD_DATA_STRING)],
            ),
        );
    }

    let data_file = validate_file(raw.data_file, max_file_size, &mut errors);

    match path {
        Some(path) if errors.is_empty() => Ok(IncomingPayload {
            path,
            data_string,
            data_file,
        }),
        _ => Err(errors),
    }
}
