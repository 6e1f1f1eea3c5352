//! Queries over the stream_events log table.

use super::error::{EntityApiErrorKind, Error};
use entity::stream_events::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, DatabaseConnection, PaginatorTrait, QueryOrder,
    QuerySelect,
};
use serde_json::Value;

/// Offsets and size of the log at the time of the query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogBounds {
    pub first_id: Option<Id>,
    pub last_id: Option<Id>,
    pub size: u64,
}

/// Appends a new event to the log. The insert trigger installed by the
/// migrations notifies live-tail listeners with the new row's id.
pub async fn create(
    db: &DatabaseConnection,
    topic: String,
    data: Value,
    markings: Vec<String>,
) -> Result<Model, Error> {
    debug!("Appending stream event on topic {topic} with markings {markings:?}");

    let active_model = ActiveModel {
        topic: Set(topic),
        data: Set(data),
        markings: Set(Value::from(markings)),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    Ok(active_model.insert(db).await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id).one(db).await?.ok_or_else(|| Error {
        source: None,
        error_kind: EntityApiErrorKind::RecordNotFound,
    })
}

/// Reads at most `size` events in log order, starting at `from` inclusive,
/// or at the beginning of the log when `from` is `None`.
pub async fn find_range(
    db: &DatabaseConnection,
    from: Option<Id>,
    size: u64,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find();
    if let Some(from) = from {
        query = query.filter(Column::Id.gte(from));
    }

    Ok(query
        .order_by_asc(Column::Id)
        .limit(size)
        .all(db)
        .await?)
}

pub async fn find_bounds(db: &DatabaseConnection) -> Result<LogBounds, Error> {
    let first = Entity::find().order_by_asc(Column::Id).one(db).await?;
    let last = Entity::find().order_by_desc(Column::Id).one(db).await?;
    let size = Entity::find().count(db).await?;

    Ok(LogBounds {
        first_id: first.map(|m| m.id),
        last_id: last.map(|m| m.id),
        size,
    })
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn event(id: Id, topic: &str) -> Model {
        Model {
            id,
            topic: topic.to_string(),
            data: json!({"type": "report", "name": format!("report-{id}")}),
            markings: json!(["TLP:GREEN"]),
            created_at: chrono::Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn create_returns_the_appended_event() -> Result<(), Error> {
        let appended = event(42, "create");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![appended.clone()]])
            .into_connection();

        let model = create(
            &db,
            "create".to_string(),
            appended.data.clone(),
            vec!["TLP:GREEN".to_string()],
        )
        .await?;

        assert_eq!(model.id, 42);
        assert_eq!(model.marking_ids(), vec!["TLP:GREEN"]);
        Ok(())
    }

    #[tokio::test]
    async fn find_by_id_reports_missing_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        let err = find_by_id(&db, 7).await.unwrap_err();
        assert_eq!(err.error_kind, EntityApiErrorKind::RecordNotFound);
    }

    #[tokio::test]
    async fn find_range_returns_rows_in_the_order_given_by_the_database() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![event(3, "create"), event(4, "update")]])
            .into_connection();

        let events = find_range(&db, Some(3), 2).await?;

        assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 4]);
        Ok(())
    }

    #[tokio::test]
    async fn find_bounds_of_an_empty_log() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .append_query_results(vec![Vec::<Model>::new()])
            .append_query_results(vec![vec![std::collections::BTreeMap::from([(
                "num_items",
                Into::<sea_orm::Value>::into(0i64),
            )])]])
            .into_connection();

        let bounds = find_bounds(&db).await?;

        assert_eq!(bounds, LogBounds::default());
        Ok(())
    }
}
