pub mod prelude;

pub mod stream_events;

/// A type alias that represents the event log's offset column.
/// Offsets are assigned by a Postgres `BIGSERIAL`, so they are strictly
/// increasing in commit order for a single writer.
pub type Id = i64;
