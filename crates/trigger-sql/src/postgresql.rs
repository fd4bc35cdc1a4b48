//! PostgreSQL flavour of the trigger DDL.
//!
//! PostgreSQL triggers call a function, so every trigger here comes with a
//! `{trigger}_fn` plpgsql function that is created and dropped alongside it.

use crate::{cleanup_trigger_name, id_column_lists, trigger_name, TriggerError, TriggerSqlSource};
use sync_core::{EventModel, EventType};

pub const DEFAULT_UNIQUE_ID_TABLE_NAME: &str = "_____unique____id____hsearch";
pub const DEFAULT_UNIQUE_ID_FUNCTION_NAME: &str = "get_unique_id_hsearch";

/// PostgreSQL 9.5+ trigger source.
#[derive(Debug, Clone)]
pub struct PostgreSqlTriggerSqlSource {
    unique_id_table_name: String,
    unique_id_function_name: String,
}

impl Default for PostgreSqlTriggerSqlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgreSqlTriggerSqlSource {
    pub fn new() -> Self {
        Self::with_names(DEFAULT_UNIQUE_ID_TABLE_NAME, DEFAULT_UNIQUE_ID_FUNCTION_NAME)
    }

    pub fn with_names(
        unique_id_table_name: impl Into<String>,
        unique_id_function_name: impl Into<String>,
    ) -> Self {
        Self {
            unique_id_table_name: unique_id_table_name.into(),
            unique_id_function_name: unique_id_function_name.into(),
        }
    }

    fn create_unique_id_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id BIGSERIAL NOT NULL,\n    PRIMARY KEY (id)\n);",
            self.unique_id_table_name
        )
    }

    fn trigger_function(name: &str, body: &str) -> String {
        format!(
            "CREATE OR REPLACE FUNCTION {name}_fn() RETURNS TRIGGER AS $$\n\
             BEGIN\n\
             {body}\n\
             \x20   RETURN NULL;\n\
             END;\n\
             $$ LANGUAGE plpgsql;"
        )
    }

    fn drop_trigger(name: &str, table: &str) -> Vec<String> {
        vec![
            format!("DROP TRIGGER IF EXISTS {name} ON {table};"),
            format!("DROP FUNCTION IF EXISTS {name}_fn();"),
        ]
    }
}

impl TriggerSqlSource for PostgreSqlTriggerSqlSource {
    fn setup_code(&self) -> Vec<String> {
        vec![
            self.create_unique_id_table(),
            format!("DROP FUNCTION IF EXISTS {}();", self.unique_id_function_name),
            format!(
                "CREATE FUNCTION {}() RETURNS BIGINT AS $$\n\
                 DECLARE\n\
                 \x20   ret BIGINT;\n\
                 BEGIN\n\
                 \x20   INSERT INTO {} DEFAULT VALUES RETURNING id INTO ret;\n\
                 \x20   RETURN ret;\n\
                 END;\n\
                 $$ LANGUAGE plpgsql;",
                self.unique_id_function_name, self.unique_id_table_name
            ),
        ]
    }

    fn trigger_creation_code(
        &self,
        model: &EventModel,
        event_type: EventType,
    ) -> Result<Vec<String>, TriggerError> {
        let (columns, values) = id_column_lists(model, event_type)?;
        let name = trigger_name(model.original_table_name(), event_type);
        let body = format!(
            "    INSERT INTO {log}(id, {type_column}, {columns})\n        VALUES({function}(), {type_value}, {values});",
            log = model.event_log_table_name(),
            type_column = model.event_type_column_name(),
            function = self.unique_id_function_name,
            type_value = event_type.value(),
        );
        Ok(vec![
            Self::trigger_function(&name, &body),
            format!(
                "CREATE TRIGGER {name} AFTER {event} ON {original}\nFOR EACH ROW EXECUTE PROCEDURE {name}_fn();",
                event = event_type.as_str(),
                original = model.original_table_name(),
            ),
        ])
    }

    fn trigger_drop_code(&self, model: &EventModel, event_type: EventType) -> Vec<String> {
        Self::drop_trigger(
            &trigger_name(model.original_table_name(), event_type),
            model.original_table_name(),
        )
    }

    fn specific_setup_code(&self, model: &EventModel) -> Vec<String> {
        let log = model.event_log_table_name();
        let name = cleanup_trigger_name(log);
        let body = format!(
            "    DELETE FROM {} WHERE id = OLD.id;",
            self.unique_id_table_name
        );
        vec![
            Self::trigger_function(&name, &body),
            format!(
                "CREATE TRIGGER {name} AFTER DELETE ON {log}\nFOR EACH ROW EXECUTE PROCEDURE {name}_fn();"
            ),
        ]
    }

    fn specific_unsetup_code(&self, model: &EventModel) -> Vec<String> {
        let log = model.event_log_table_name();
        Self::drop_trigger(&cleanup_trigger_name(log), log)
    }

    fn recreate_unique_id_table_code(&self) -> Vec<String> {
        vec![
            format!("DROP TABLE IF EXISTS {};", self.unique_id_table_name),
            self.create_unique_id_table(),
        ]
    }
}
