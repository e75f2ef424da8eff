use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::{AuthOutcome, PASSWORD_HEADER};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Rejects requests whose `X-Webhook-Password` header does not match the configured
/// secret. Without a configured secret every request passes, with a warning.
pub async fn password_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(PASSWORD_HEADER)
        .and_then(|h| h.to_str().ok());

    match state.auth.check(provided) {
        AuthOutcome::Allow => {}
        AuthOutcome::Unprotected => {
            tracing::warn!(
                "WARNING: No PASSWORD environment variable set. Webhook endpoint is unprotected!"
            );
        }
        AuthOutcome::Deny => {
            tracing::warn!(
                "🔒 Rejected {} {}: invalid or missing password",
                req.method(),
                req.uri()
            );
            return Err(AppError::Unauthorized);
        }
    }

    Ok(next.run(req).await)
}
