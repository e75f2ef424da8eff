use crate::AppState;
use crate::api::error::AppError;
use crate::models::{ResponseEnvelope, UploadedFile};
use crate::utils::validation::{
    FIELD_DATA_FILE, FIELD_DATA_STRING, FIELD_PATH, RawFile, RawPayload, validate_payload,
};
use axum::{
    Json,
    body::Bytes,
    extract::{
        FromRequest, Multipart, Request, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderMap, StatusCode, header},
};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use utoipa::ToSchema;

/// JSON form of the `POST /set` body. Multipart bodies carry the same fields, with
/// `dataFile` sent as a file part.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct SetRequest {
    /// Object key the data is stored under
    #[schema(example = "logs/a.txt")]
    path: String,
    /// Text to store. Non-string JSON values are stored as their JSON text.
    #[schema(value_type = Option<Object>)]
    data_string: Option<Value>,
    /// File to store (multipart only, 50 MB max)
    #[schema(value_type = Option<String>, format = Binary)]
    data_file: Option<Vec<u8>>,
}

#[utoipa::path(
    post,
    path = "/set",
    request_body(
        content = SetRequest,
        description = "application/json, application/x-www-form-urlencoded or multipart/form-data",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Data stored", body = ResponseEnvelope),
        (status = 401, description = "Invalid or missing X-Webhook-Password", body = ResponseEnvelope),
        (status = 422, description = "Validation failed", body = ResponseEnvelope),
        (status = 500, description = "Storage write failed", body = ResponseEnvelope)
    ),
    security(
        ("webhook_password" = [])
    ),
    tag = "webhook"
)]
pub async fn set_data(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ResponseEnvelope>, AppError> {
    let raw = read_payload(&state, request).await?;

    let payload = validate_payload(raw, state.config.max_file_size).map_err(|errors| {
        tracing::info!("Webhook payload rejected: {}", errors);
        AppError::Validation(errors)
    })?;

    let path = state.dispatcher.store(payload).await?;

    Ok(Json(ResponseEnvelope::stored(path)))
}

#[derive(Debug, PartialEq, Eq)]
enum BodyKind {
    Json,
    Multipart,
    Form,
    Other,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
    else {
        return BodyKind::Other;
    };

    let (kind, subtype) = (content_type.type_(), content_type.subtype());
    if kind == mime::MULTIPART && subtype == mime::FORM_DATA {
        BodyKind::Multipart
    } else if kind == mime::APPLICATION
        && (subtype == mime::JSON || content_type.suffix() == Some(mime::JSON))
    {
        BodyKind::Json
    } else if kind == mime::APPLICATION && subtype == mime::WWW_FORM_URLENCODED {
        BodyKind::Form
    } else {
        BodyKind::Other
    }
}

/// Query string fields, overridden by whatever the body carries.
async fn read_payload(state: &AppState, request: Request) -> Result<RawPayload, AppError> {
    let query = match request.uri().query() {
        Some(query) => parse_form(query.as_bytes())?,
        None => RawPayload::default(),
    };

    let body = match body_kind(request.headers()) {
        BodyKind::Multipart => read_multipart(state, request).await?,
        BodyKind::Json => parse_json(&read_body(state, request).await?)?,
        BodyKind::Form => parse_form(&read_body(state, request).await?)?,
        BodyKind::Other => {
            read_body(state, request).await?;
            RawPayload::default()
        }
    };

    Ok(merge(body, query))
}

fn merge(body: RawPayload, query: RawPayload) -> RawPayload {
    RawPayload {
        path: body.path.or(query.path),
        data_string: body.data_string.or(query.data_string),
        data_file: body.data_file.or(query.data_file),
    }
}

async fn read_body(state: &AppState, request: Request) -> Result<Bytes, AppError> {
    Bytes::from_request(request, state)
        .await
        .map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge(rejection.body_text())
            } else {
                AppError::MalformedBody(rejection.body_text())
            }
        })
}

fn parse_json(body: &[u8]) -> Result<RawPayload, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RawPayload::default());
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| AppError::MalformedBody(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(AppError::MalformedBody(
            "Expected a JSON object".to_string(),
        ));
    };

    Ok(RawPayload {
        path: fields.remove(FIELD_PATH),
        data_string: fields.remove(FIELD_DATA_STRING),
        // JSON cannot carry an upload
        data_file: fields
            .remove(FIELD_DATA_FILE)
            .filter(|v| !v.is_null())
            .map(|_| RawFile::NotAFile),
    })
}

fn parse_form(body: &[u8]) -> Result<RawPayload, AppError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|e| AppError::MalformedBody(e.to_string()))?;

    let mut raw = RawPayload::default();
    for (name, value) in pairs {
        apply_text_field(&mut raw, &name, value);
    }
    Ok(raw)
}

fn apply_text_field(raw: &mut RawPayload, name: &str, value: String) {
    match name {
        FIELD_PATH => raw.path = Some(Value::String(value)),
        FIELD_DATA_STRING => raw.data_string = Some(Value::String(value)),
        FIELD_DATA_FILE if !value.is_empty() => raw.data_file = Some(RawFile::NotAFile),
        _ => {}
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::MalformedBody(err_msg)
    }
}

async fn read_multipart(state: &AppState, request: Request) -> Result<RawPayload, AppError> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|rejection| AppError::MalformedBody(rejection.body_text()))?;

    let mut raw = RawPayload::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let is_file = field.file_name().is_some_and(|n| !n.is_empty());

        if is_file {
            // Other file parts are dropped; multer skips their remaining bytes.
            if name == FIELD_DATA_FILE {
                let upload = spool_file(field, state.config.max_file_size).await?;
                raw.data_file = Some(RawFile::Upload(upload));
            }
            continue;
        }

        if matches!(name.as_str(), FIELD_PATH | FIELD_DATA_STRING | FIELD_DATA_FILE) {
            let text = field.text().await.map_err(multipart_error)?;
            apply_text_field(&mut raw, &name, text);
        }
    }

    Ok(raw)
}

/// Copies a file part into a temporary file. Bytes past `max_file_size` are counted but
/// not written, so validation can report the real size.
async fn spool_file(mut field: Field<'_>, max_file_size: usize) -> Result<UploadedFile, AppError> {
    let client_name = field.file_name().map(str::to_string);

    let tmp = tempfile::NamedTempFile::new().map_err(anyhow::Error::from)?;
    let mut out = tokio::fs::File::from_std(tmp.reopen().map_err(anyhow::Error::from)?);

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size <= max_file_size as u64 {
            out.write_all(&chunk).await.map_err(anyhow::Error::from)?;
        }
    }
    out.flush().await.map_err(anyhow::Error::from)?;

    let upload = UploadedFile::new(tmp, size, client_name);
    tracing::debug!(
        "Spooled upload {:?} ({} bytes) to {}",
        upload.client_name,
        upload.size,
        upload.tmp_path().display()
    );

    Ok(upload)
}
