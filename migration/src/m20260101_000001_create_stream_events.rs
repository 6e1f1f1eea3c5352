use entity::stream_events::NOTIFY_CHANNEL;
use sea_orm_migration::prelude::*;
use service::DB_SCHEMA;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let create_table_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {DB_SCHEMA}.stream_events (
                id BIGSERIAL PRIMARY KEY,
                topic VARCHAR(255) NOT NULL,
                data JSONB NOT NULL,
                markings JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#
        );

        manager
            .get_connection()
            .execute_unprepared(&create_table_sql)
            .await?;

        // Live-tail listeners receive the id of every committed row and load it
        // themselves, which keeps payloads under the 8000 byte NOTIFY limit.
        let notify_function_sql = format!(
            r#"
            CREATE OR REPLACE FUNCTION {DB_SCHEMA}.notify_stream_event() RETURNS trigger AS $$
            BEGIN
                PERFORM pg_notify('{NOTIFY_CHANNEL}', NEW.id::text);
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql
        "#
        );

        manager
            .get_connection()
            .execute_unprepared(&notify_function_sql)
            .await?;

        manager
            .get_connection()
            .execute_unprepared(&format!(
                "DROP TRIGGER IF EXISTS stream_events_notify ON {DB_SCHEMA}.stream_events"
            ))
            .await?;

        manager
            .get_connection()
            .execute_unprepared(&format!(
                "CREATE TRIGGER stream_events_notify
                 AFTER INSERT ON {DB_SCHEMA}.stream_events
                 FOR EACH ROW EXECUTE FUNCTION {DB_SCHEMA}.notify_stream_event()"
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&format!(
                "DROP TABLE IF EXISTS {DB_SCHEMA}.stream_events CASCADE"
            ))
            .await?;

        manager
            .get_connection()
            .execute_unprepared(&format!(
                "DROP FUNCTION IF EXISTS {DB_SCHEMA}.notify_stream_event()"
            ))
            .await?;

        Ok(())
    }
}
