//! Transactional batch insertion.
//!
//! Writes an ordered collection of events in exactly one transaction: all
//! rows commit together or none do. Column values are derived per event
//! here; the SQL text is built once per writer and reused so the prepared
//! statement is shared across every row in a batch.

use std::sync::Arc;

use log::debug;

use crate::config::{ExtensionColumn, SinkOptions};
use crate::error_handling::StoreError;
use crate::event::LogEvent;

use super::exception::render_error;
use super::json::render_properties;
use super::schema::SchemaManager;
use super::values::{
    current_thread_label, extract_scalar, machine_name, render_timestamp, scalar_text,
    truncate_chars, SqlValue,
};

/// Writes batches of events into the configured table.
pub struct BatchWriter {
    schema: Arc<SchemaManager>,
    columns: Vec<ExtensionColumn>,
    use_utc: bool,
    store_json_properties: bool,
    store_exceptions: bool,
    max_message_length: Option<usize>,
    max_exception_length: Option<usize>,
    max_properties_length: Option<usize>,
    machine_name: String,
    insert_sql: String,
}

impl BatchWriter {
    /// Builds a writer over the given schema manager. The machine name is
    /// captured once here and reused for every row.
    pub fn new(schema: Arc<SchemaManager>, options: &SinkOptions) -> Self {
        BatchWriter {
            insert_sql: build_insert(&options.table_name, &options.columns),
            schema,
            columns: options.columns.clone(),
            use_utc: options.use_utc_timestamps,
            store_json_properties: options.store_json_properties,
            store_exceptions: options.store_exceptions,
            max_message_length: options.max_message_length,
            max_exception_length: options.max_exception_length,
            max_properties_length: options.max_properties_length,
            machine_name: machine_name(),
        }
    }

    /// Writes all events in one transaction, in input order.
    ///
    /// An empty batch returns immediately without touching the database,
    /// not even to create the schema. On any failure the transaction is
    /// rolled back (dropping an uncommitted sqlx transaction rolls it
    /// back) and the error is returned to the caller.
    pub async fn write_batch(&self, events: &[LogEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        self.schema.ensure_schema().await?;

        let mut tx = self.schema.pool().begin().await?;
        for event in events {
            let mut query = sqlx::query(&self.insert_sql)
                .bind(render_timestamp(event.timestamp, self.use_utc))
                .bind(event.level.ordinal())
                .bind(event.level.as_str())
                .bind(truncate_chars(
                    event.message.clone(),
                    self.max_message_length,
                ))
                .bind(event.template.clone())
                .bind(self.render_exception(event))
                .bind(self.render_properties(event))
                .bind(self.source_context(event))
                .bind(self.machine_name.clone())
                .bind(self.thread_id(event));
            for column in &self.columns {
                let value = event
                    .properties
                    .get(&column.source_property)
                    .map(extract_scalar)
                    .unwrap_or(SqlValue::Null);
                query = bind_value(query, value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(
            "Committed batch of {} events to \"{}\"",
            events.len(),
            self.schema.table()
        );
        Ok(())
    }

    fn render_exception(&self, event: &LogEvent) -> Option<String> {
        if !self.store_exceptions {
            return None;
        }
        event
            .error
            .as_ref()
            .map(|error| render_error(error, self.max_exception_length))
    }

    fn render_properties(&self, event: &LogEvent) -> Option<String> {
        if !self.store_json_properties {
            return None;
        }
        render_properties(&event.properties, self.max_properties_length)
    }

    fn source_context(&self, event: &LogEvent) -> Option<String> {
        event.properties.get("SourceContext").map(scalar_text)
    }

    fn thread_id(&self, event: &LogEvent) -> String {
        event
            .properties
            .get("ThreadId")
            .map(scalar_text)
            .unwrap_or_else(current_thread_label)
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: SqlValue,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
    }
}

/// Builds the parameterized INSERT naming every standard column plus every
/// extension column, in table order.
pub(crate) fn build_insert(table: &str, columns: &[ExtensionColumn]) -> String {
    let mut column_list: Vec<String> = [
        "timestamp",
        "level",
        "level_name",
        "message",
        "message_template",
        "exception",
        "properties",
        "source_context",
        "machine_name",
        "thread_id",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect();
    for column in columns {
        column_list.push(format!("\"{}\"", column.name));
    }
    let placeholders = vec!["?"; column_list.len()].join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table,
        column_list.join(", "),
        placeholders
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreLocation;
    use crate::event::{ErrorInfo, Level};
    use sqlx::Row;

    fn memory_writer(options: SinkOptions) -> (Arc<SchemaManager>, BatchWriter) {
        let options = SinkOptions {
            location: StoreLocation::Memory,
            ..options
        };
        let schema = Arc::new(SchemaManager::new(&options));
        let writer = BatchWriter::new(Arc::clone(&schema), &options);
        (schema, writer)
    }

    #[test]
    fn test_build_insert_parameter_count() {
        let columns = vec![
            ExtensionColumn::new("UserId", "TEXT", "UserId"),
            ExtensionColumn::new("Region", "TEXT", "Region"),
        ];
        let sql = build_insert("Logs", &columns);
        assert_eq!(sql.matches('?').count(), 12);
        assert!(sql.contains("\"UserId\""));
        assert!(sql.contains("\"Region\""));
        assert!(sql.starts_with("INSERT INTO \"Logs\""));
    }

    #[tokio::test]
    async fn test_empty_batch_touches_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("untouched.db");
        let options = SinkOptions {
            location: StoreLocation::File(db_path.clone()),
            ..Default::default()
        };
        let schema = Arc::new(SchemaManager::new(&options));
        let writer = BatchWriter::new(Arc::clone(&schema), &options);

        writer.write_batch(&[]).await.expect("empty batch");

        // No connection was opened, so the database file was never created
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn test_batch_writes_all_rows_in_order() {
        let (schema, writer) = memory_writer(SinkOptions::default());
        let events = vec![
            LogEvent::new(Level::Information, "first"),
            LogEvent::new(Level::Warning, "second"),
            LogEvent::new(Level::Error, "third"),
        ];
        writer.write_batch(&events).await.expect("write");

        assert_eq!(schema.row_count().await.expect("count"), 3);

        let rows = sqlx::query("SELECT message, level, level_name FROM \"Logs\" ORDER BY id")
            .fetch_all(schema.pool())
            .await
            .expect("fetch");
        assert_eq!(rows[0].get::<String, _>("message"), "first");
        assert_eq!(rows[1].get::<String, _>("message"), "second");
        assert_eq!(rows[2].get::<String, _>("message"), "third");
        assert_eq!(rows[2].get::<i64, _>("level"), 4);
        assert_eq!(rows[2].get::<String, _>("level_name"), "Error");
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_rows() {
        let options = SinkOptions {
            columns: vec![ExtensionColumn::new("UserId", "TEXT", "UserId").allow_null(false)],
            ..Default::default()
        };
        let (schema, writer) = memory_writer(options);

        // Seed one committed row so the failure case is distinguishable
        let seed = vec![LogEvent::new(Level::Information, "seed")
            .with_property("UserId", "u1")];
        writer.write_batch(&seed).await.expect("seed write");

        // Second event violates the NOT NULL constraint mid-batch
        let batch = vec![
            LogEvent::new(Level::Information, "ok").with_property("UserId", "u2"),
            LogEvent::new(Level::Information, "missing property"),
            LogEvent::new(Level::Information, "never reached").with_property("UserId", "u3"),
        ];
        let result = writer.write_batch(&batch).await;
        assert!(result.is_err());

        // The failed batch rolled back entirely; only the seed row remains
        assert_eq!(schema.row_count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_message_truncation_boundary() {
        let options = SinkOptions {
            max_message_length: Some(20),
            ..Default::default()
        };
        let (schema, writer) = memory_writer(options);

        let events = vec![
            LogEvent::new(Level::Information, "x".repeat(20)),
            LogEvent::new(Level::Information, "x".repeat(21)),
        ];
        writer.write_batch(&events).await.expect("write");

        let rows = sqlx::query("SELECT message FROM \"Logs\" ORDER BY id")
            .fetch_all(schema.pool())
            .await
            .expect("fetch");
        assert_eq!(rows[0].get::<String, _>("message").chars().count(), 20);
        assert_eq!(rows[1].get::<String, _>("message").chars().count(), 20);
    }

    #[tokio::test]
    async fn test_extension_column_values_and_nulls() {
        let options = SinkOptions {
            columns: vec![ExtensionColumn::new("UserId", "TEXT", "UserId")],
            ..Default::default()
        };
        let (schema, writer) = memory_writer(options);

        let events = vec![
            LogEvent::new(Level::Information, "with user").with_property("UserId", "abc"),
            LogEvent::new(Level::Information, "without user"),
        ];
        writer.write_batch(&events).await.expect("write");

        let rows = sqlx::query("SELECT \"UserId\" FROM \"Logs\" ORDER BY id")
            .fetch_all(schema.pool())
            .await
            .expect("fetch");
        assert_eq!(rows[0].get::<Option<String>, _>("UserId").as_deref(), Some("abc"));
        assert_eq!(rows[1].get::<Option<String>, _>("UserId"), None);
    }

    #[tokio::test]
    async fn test_exception_storage_toggle() {
        let options = SinkOptions {
            store_exceptions: false,
            ..Default::default()
        };
        let (schema, writer) = memory_writer(options);

        let events = vec![LogEvent::new(Level::Error, "failed")
            .with_error(ErrorInfo::new("IoError", "boom"))];
        writer.write_batch(&events).await.expect("write");

        let exception: Option<String> = sqlx::query_scalar("SELECT exception FROM \"Logs\"")
            .fetch_one(schema.pool())
            .await
            .expect("fetch");
        assert_eq!(exception, None);
    }

    #[tokio::test]
    async fn test_properties_storage_toggle() {
        let options = SinkOptions {
            store_json_properties: false,
            ..Default::default()
        };
        let (schema, writer) = memory_writer(options);

        let events = vec![LogEvent::new(Level::Information, "has props")
            .with_property("UserId", 42i64)];
        writer.write_batch(&events).await.expect("write");

        let properties: Option<String> = sqlx::query_scalar("SELECT properties FROM \"Logs\"")
            .fetch_one(schema.pool())
            .await
            .expect("fetch");
        assert_eq!(properties, None);
    }

    #[tokio::test]
    async fn test_source_context_and_thread_id_columns() {
        let (schema, writer) = memory_writer(SinkOptions::default());

        let events = vec![
            LogEvent::new(Level::Information, "tagged")
                .with_source_context("auth::login")
                .with_property("ThreadId", 7i64),
            LogEvent::new(Level::Information, "untagged"),
        ];
        writer.write_batch(&events).await.expect("write");

        let rows = sqlx::query(
            "SELECT source_context, thread_id, properties FROM \"Logs\" ORDER BY id",
        )
        .fetch_all(schema.pool())
        .await
        .expect("fetch");

        assert_eq!(
            rows[0].get::<Option<String>, _>("source_context").as_deref(),
            Some("auth::login")
        );
        assert_eq!(rows[0].get::<String, _>("thread_id"), "7");
        // Reserved properties are excluded from the JSON blob
        assert_eq!(
            rows[0].get::<Option<String>, _>("properties").as_deref(),
            Some("{}")
        );

        assert_eq!(rows[1].get::<Option<String>, _>("source_context"), None);
        assert!(!rows[1].get::<String, _>("thread_id").is_empty());
    }

    #[tokio::test]
    async fn test_message_template_stored_verbatim() {
        let (schema, writer) = memory_writer(SinkOptions::default());

        let events = vec![LogEvent::new(Level::Information, "user 42 logged in")
            .with_template("user {UserId} logged in")];
        writer.write_batch(&events).await.expect("write");

        let template: String = sqlx::query_scalar("SELECT message_template FROM \"Logs\"")
            .fetch_one(schema.pool())
            .await
            .expect("fetch");
        assert_eq!(template, "user {UserId} logged in");
    }
}
