use crate::controller::ApiResponse;
use crate::extractors::authenticated_identity::AuthenticatedIdentity;
use crate::params::history::HistoryParams;
use crate::{AppState, Error};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use events::Cursor;
use log::*;

/// POST replay a range of the event log into the caller's open stream
#[utoipa::path(
    post,
    path = "/stream/history",
    request_body(content = HistoryParams, description = "Replay window; both fields are optional"),
    responses(
        (status = 200, description = "Replay queued on the open stream, or the log could not be read", body = ApiResponse),
        (status = 400, description = "Malformed body or cursor", body = ApiResponse),
        (status = 401, description = "Missing credentials or no open stream for this identity"),
    ),
    security(
        ("bearer_auth" = []),
        ("cookie_auth" = [])
    )
)]
pub async fn history(
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, Error> {
    let params: HistoryParams = if body.iter().all(u8::is_ascii_whitespace) {
        HistoryParams::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::BadRequest(format!("invalid history request: {e}")))?
    };

    let from = params
        .from
        .as_deref()
        .unwrap_or("-")
        .parse::<Cursor>()
        .map_err(sse::Error::from)?;
    let size = params.size.unwrap_or(app_state.config.history_default_size);

    debug!("POST stream history for {} from {from} (size {size})", identity.id);

    app_state.hub.replay(&identity.id, &from, size).await?;

    Ok(Json(ApiResponse::success()))
}
