//! This module holds typed parameters for various endpoint inputs.
//!
//! Each parameter type is a struct deserialized from the request, so handlers
//! only ever see inputs that already have the expected shape.

pub(crate) mod history;
