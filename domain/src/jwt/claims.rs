//! This module defines the claims carried by stream authentication tokens.
//!
//! The subject is the identity id; markings and capabilities are copied into
//! the [`Identity`](crate::Identity) when a stream connection is opened.
//!
//! # Example
//!
//! ```rust
//! use domain::jwt::StreamClaims;
//!
//! let claims = StreamClaims {
//!     sub: "user-1".to_string(),
//!     exp: 1825247600,
//!     allowed_markings: vec!["TLP:GREEN".to_string()],
//!     capabilities: vec![],
//! };
//! let json = serde_json::to_value(&claims).unwrap();
//! assert_eq!(json["allowed_markings"][0], "TLP:GREEN");
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamClaims {
    pub sub: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub allowed_markings: Vec<String>,
    /// Capability names granted to the identity, e.g. `BYPASS`.
    #[serde(default)]
    pub capabilities: Vec<String>,
}
