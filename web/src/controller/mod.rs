use serde::Serialize;
use utoipa::ToSchema;

pub(crate) mod health_check_controller;
pub(crate) mod stream_controller;

/// Outcome of a JSON stream command.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
