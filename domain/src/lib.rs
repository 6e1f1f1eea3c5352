//! Authentication domain of the stream hub.
//!
//! The stream hub never looks at credentials itself: it hands the raw token
//! to an [`Authenticator`] and receives an [`Identity`] (or nothing). The
//! identity is resolved once per connection and copied into the session.

pub mod error;
pub mod identity;
pub mod jwt;

pub use identity::{Authenticator, Identity, BYPASS_CAPABILITY};
