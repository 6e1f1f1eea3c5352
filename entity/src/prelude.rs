pub use super::stream_events::Entity as StreamEvents;
