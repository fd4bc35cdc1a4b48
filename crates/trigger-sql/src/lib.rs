//! Trigger-based change capture DDL for index-sync
//!
//! Every monitored table gets one trigger per event type. Each trigger asks a
//! shared stored procedure for the next id from one global counter table and
//! appends a row to the table's event log holding that id, the event type and
//! the id columns of the changed row. Using one counter for all tables gives
//! every event a position in a single total order, which is what lets the
//! update synchronizer replay changes across entity types in the order they
//! happened.
//!
//! Each event-log table also gets a cleanup trigger removing the counter row
//! once an event-log row is deleted, so the counter table does not grow
//! without bound.
//!
//! The counter table can be recreated but never dropped on its own: losing
//! it silently would restart ids below those already in the event logs.

mod client;
mod install;
mod mysql;
mod postgresql;

pub use client::{connect_mysql, connect_postgresql, sanitize_connection_string};
pub use install::{install, recreate_unique_id_table, uninstall, SqlExecutor};
pub use mysql::MySqlTriggerSqlSource;
pub use postgresql::PostgreSqlTriggerSqlSource;

use serde::{Deserialize, Serialize};
use std::fmt;
use sync_core::{EventModel, EventType};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Event model for table '{table}' doesn't contain any id columns")]
    NoIdColumns { table: String },
}

/// Dialect-specific trigger and event-log DDL.
///
/// All methods return the statements to run, in order. None of them touch a
/// database.
pub trait TriggerSqlSource: Send + Sync {
    /// Create the shared counter table if absent and (re)create the procedure
    /// handing out the next id.
    fn setup_code(&self) -> Vec<String>;

    /// Create the trigger recording `event_type` changes of the model's
    /// original table.
    fn trigger_creation_code(
        &self,
        model: &EventModel,
        event_type: EventType,
    ) -> Result<Vec<String>, TriggerError>;

    /// Drop what `trigger_creation_code` created.
    fn trigger_drop_code(&self, model: &EventModel, event_type: EventType) -> Vec<String>;

    /// Create the cleanup trigger of the model's event-log table.
    fn specific_setup_code(&self, model: &EventModel) -> Vec<String>;

    /// Drop what `specific_setup_code` created.
    fn specific_unsetup_code(&self, model: &EventModel) -> Vec<String>;

    /// Drop and recreate the shared counter table. Resets the counter; the
    /// procedure stays in place.
    fn recreate_unique_id_table_code(&self) -> Vec<String>;
}

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    MySql,
    PostgreSql,
}

impl SqlDialect {
    /// Trigger source for this dialect. Names left as `None` use the dialect
    /// defaults.
    pub fn trigger_source(
        self,
        unique_id_table: Option<&str>,
        unique_id_procedure: Option<&str>,
    ) -> Box<dyn TriggerSqlSource> {
        match self {
            SqlDialect::MySql => Box::new(MySqlTriggerSqlSource::with_names(
                unique_id_table.unwrap_or(mysql::DEFAULT_UNIQUE_ID_TABLE_NAME),
                unique_id_procedure.unwrap_or(mysql::DEFAULT_UNIQUE_ID_PROCEDURE_NAME),
            )),
            SqlDialect::PostgreSql => Box::new(PostgreSqlTriggerSqlSource::with_names(
                unique_id_table.unwrap_or(postgresql::DEFAULT_UNIQUE_ID_TABLE_NAME),
                unique_id_procedure.unwrap_or(postgresql::DEFAULT_UNIQUE_ID_FUNCTION_NAME),
            )),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::MySql => f.write_str("mysql"),
            SqlDialect::PostgreSql => f.write_str("postgresql"),
        }
    }
}

/// Name of the trigger recording `event_type` changes of `original_table`.
pub fn trigger_name(original_table: &str, event_type: EventType) -> String {
    format!("{original_table}_updates_hsearch_{}", event_type.as_str())
}

/// Name of the cleanup trigger of `event_log_table`.
pub fn cleanup_trigger_name(event_log_table: &str) -> String {
    format!("{event_log_table}_cleanup_hsearch")
}

/// Event-log column list and matching `OLD.`/`NEW.` value list for a trigger
/// body.
pub(crate) fn id_column_lists(
    model: &EventModel,
    event_type: EventType,
) -> Result<(String, String), TriggerError> {
    let row_ref = match event_type {
        EventType::Delete => "OLD",
        EventType::Insert | EventType::Update => "NEW",
    };
    let (columns, values): (Vec<&str>, Vec<String>) = model
        .id_infos()
        .iter()
        .flat_map(|info| info.column_pairs())
        .map(|(id_column, original)| (id_column, format!("{row_ref}.{original}")))
        .unzip();

    if columns.is_empty() {
        return Err(TriggerError::NoIdColumns {
            table: model.original_table_name().to_string(),
        });
    }
    Ok((columns.join(", "), values.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::{IdColumnType, IdInfo};

    #[test]
    fn test_trigger_names() {
        assert_eq!(
            trigger_name("Place", EventType::Insert),
            "Place_updates_hsearch_INSERT"
        );
        assert_eq!(
            cleanup_trigger_name("PlaceUpdates"),
            "PlaceUpdates_cleanup_hsearch"
        );
    }

    #[test]
    fn test_id_column_lists() {
        let model = EventModel::new(
            "Place_Sorcerer",
            "PlaceSorcererUpdates",
            "eventType",
            vec![
                IdInfo::single("Place", "placeId", "Place_ID", IdColumnType::Int32),
                IdInfo::single("Sorcerer", "sorcererId", "sorcerers_ID", IdColumnType::Int32),
            ],
        )
        .unwrap();

        let (columns, values) = id_column_lists(&model, EventType::Delete).unwrap();
        assert_eq!(columns, "placeId, sorcererId");
        assert_eq!(values, "OLD.Place_ID, OLD.sorcerers_ID");

        let (_, values) = id_column_lists(&model, EventType::Update).unwrap();
        assert_eq!(values, "NEW.Place_ID, NEW.sorcerers_ID");
    }

    #[test]
    fn test_id_column_lists_rejects_empty_model() {
        let model = EventModel::new_unchecked("Place", "PlaceUpdates", "eventType", vec![]);
        assert_eq!(
            id_column_lists(&model, EventType::Insert),
            Err(TriggerError::NoIdColumns {
                table: "Place".to_string()
            })
        );
    }

    #[test]
    fn test_dialect_selection() {
        let dialect: SqlDialect = serde_yaml::from_str("postgresql").unwrap();
        assert_eq!(dialect, SqlDialect::PostgreSql);

        let source = SqlDialect::MySql.trigger_source(None, Some("next_id"));
        assert!(source.setup_code().iter().any(|s| s.contains("CREATE PROCEDURE next_id")));
    }
}
