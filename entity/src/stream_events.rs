//! SeaORM Entity for the stream_events table.
//! Append-only log of every event published to the live stream.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Postgres NOTIFY channel on which the insert trigger publishes new event ids.
pub const NOTIFY_CHANNEL: &str = "stream_events";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(schema_name = "stream_hub", table_name = "stream_events")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,

    pub topic: String,

    /// Event payload. Always a JSON object carrying at least a `type` field.
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,

    /// Confidentiality marking identifiers, stored as a JSON array of strings
    /// in the order they were attached.
    #[sea_orm(column_type = "JsonBinary")]
    pub markings: Json,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Marking identifiers of this event. Non-string array members are ignored.
    pub fn marking_ids(&self) -> Vec<String> {
        self.markings
            .as_array()
            .map(|markings| {
                markings
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(markings: Json) -> Model {
        Model {
            id: 1,
            topic: "create".to_string(),
            data: json!({"type": "report"}),
            markings,
            created_at: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn marking_ids_preserves_order() {
        let model = model(json!(["TLP:GREEN", "TLP:AMBER"]));
        assert_eq!(model.marking_ids(), vec!["TLP:GREEN", "TLP:AMBER"]);
    }

    #[test]
    fn marking_ids_of_malformed_column_is_empty() {
        assert!(model(json!({"not": "an array"})).marking_ids().is_empty());
        assert_eq!(model(json!(["TLP:RED", 7])).marking_ids(), vec!["TLP:RED"]);
    }
}
