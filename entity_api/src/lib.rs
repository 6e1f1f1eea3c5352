//! Database access for the `stream_events` log table.
//!
//! Higher layers (the `events` crate) never build sea-orm queries directly;
//! they go through the functions exposed here and translate
//! [`error::Error`] into their own error kinds.

pub use entity::{stream_events, Id};

pub mod error;
pub mod stream_event;
