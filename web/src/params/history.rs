use serde::Deserialize;
use utoipa::ToSchema;

/// Body of a history replay request.
///
/// # Fields
///
/// * `from` - Offset of the first event to replay, or `-` for the oldest one
/// * `size` - Maximum number of events to replay
#[derive(Debug, Default, Deserialize, ToSchema)]
pub(crate) struct HistoryParams {
    #[schema(example = "-")]
    pub(crate) from: Option<String>,
    #[schema(example = 200)]
    pub(crate) size: Option<usize>,
}
