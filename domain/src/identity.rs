use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Capability that lets an identity see every event in full, whatever its markings.
pub const BYPASS_CAPABILITY: &str = "BYPASS";

/// Who is on the other end of a stream connection, and what they may see.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Unique per user. At most one live stream exists per id.
    pub id: String,
    /// Marking identifiers whose events this identity may read.
    pub allowed_markings: HashSet<String>,
    pub bypass: bool,
    /// The connection is closed at the first heartbeat sweep after this instant.
    pub expiration_time: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        allowed_markings: impl IntoIterator<Item = impl Into<String>>,
        bypass: bool,
        expiration_time: DateTime<Utc>,
    ) -> Self {
        Identity {
            id: id.into(),
            allowed_markings: allowed_markings.into_iter().map(Into::into).collect(),
            bypass,
            expiration_time,
        }
    }

    pub fn may_see(&self, marking: &str) -> bool {
        self.allowed_markings.contains(marking)
    }
}

/// Resolves a bearer or cookie token to an identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `Ok(None)` when the token is missing, malformed, expired or
    /// otherwise not recognised. `Err` is reserved for failures of the
    /// authenticator itself.
    async fn authenticate(&self, token: &str) -> Result<Option<Identity>, Error>;
}
