//! MySQL flavour of the trigger DDL.
//!
//! The counter is an `AUTO_INCREMENT` table; the procedure inserts an empty
//! row and hands back `last_insert_id()`, which MySQL keeps per connection,
//! so concurrent triggers never see each other's ids.

use crate::{cleanup_trigger_name, id_column_lists, trigger_name, TriggerError, TriggerSqlSource};
use sync_core::{EventModel, EventType};

pub const DEFAULT_UNIQUE_ID_TABLE_NAME: &str = "`_____unique____id____hsearch`";
pub const DEFAULT_UNIQUE_ID_PROCEDURE_NAME: &str = "get_unique_id_hsearch";

/// MySQL 5.6+ trigger source.
#[derive(Debug, Clone)]
pub struct MySqlTriggerSqlSource {
    unique_id_table_name: String,
    unique_id_procedure_name: String,
}

impl Default for MySqlTriggerSqlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlTriggerSqlSource {
    pub fn new() -> Self {
        Self::with_names(DEFAULT_UNIQUE_ID_TABLE_NAME, DEFAULT_UNIQUE_ID_PROCEDURE_NAME)
    }

    pub fn with_names(
        unique_id_table_name: impl Into<String>,
        unique_id_procedure_name: impl Into<String>,
    ) -> Self {
        Self {
            unique_id_table_name: unique_id_table_name.into(),
            unique_id_procedure_name: unique_id_procedure_name.into(),
        }
    }

    pub fn unique_id_table_name(&self) -> &str {
        &self.unique_id_table_name
    }

    pub fn unique_id_procedure_name(&self) -> &str {
        &self.unique_id_procedure_name
    }

    fn create_unique_id_table(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    id BIGINT(64) NOT NULL AUTO_INCREMENT,\n    PRIMARY KEY (id)\n);",
            self.unique_id_table_name
        )
    }

    fn drop_trigger(name: &str) -> String {
        format!("DROP TRIGGER IF EXISTS {name};")
    }
}

impl TriggerSqlSource for MySqlTriggerSqlSource {
    fn setup_code(&self) -> Vec<String> {
        vec![
            self.create_unique_id_table(),
            format!("DROP PROCEDURE IF EXISTS {};", self.unique_id_procedure_name),
            format!(
                "CREATE PROCEDURE {}\n(OUT ret BIGINT)\nBEGIN\n    INSERT INTO {} VALUES ();\n    SET ret = last_insert_id();\nEND;",
                self.unique_id_procedure_name, self.unique_id_table_name
            ),
        ]
    }

    fn trigger_creation_code(
        &self,
        model: &EventModel,
        event_type: EventType,
    ) -> Result<Vec<String>, TriggerError> {
        let (columns, values) = id_column_lists(model, event_type)?;
        let sql = format!(
            "CREATE TRIGGER {trigger} AFTER {event} ON {original}\n\
             FOR EACH ROW\n\
             BEGIN\n\
             \x20   CALL {procedure}(@unique_id);\n\
             \x20   INSERT INTO {log}(id, {type_column}, {columns})\n\
             \x20       VALUES(@unique_id, {type_value}, {values});\n\
             END;",
            trigger = trigger_name(model.original_table_name(), event_type),
            event = event_type.as_str(),
            original = model.original_table_name(),
            procedure = self.unique_id_procedure_name,
            log = model.event_log_table_name(),
            type_column = model.event_type_column_name(),
            type_value = event_type.value(),
        );
        Ok(vec![sql])
    }

    fn trigger_drop_code(&self, model: &EventModel, event_type: EventType) -> Vec<String> {
        vec![Self::drop_trigger(&trigger_name(
            model.original_table_name(),
            event_type,
        ))]
    }

    fn specific_setup_code(&self, model: &EventModel) -> Vec<String> {
        let log = model.event_log_table_name();
        vec![format!(
            "CREATE TRIGGER {trigger} AFTER DELETE ON {log}\n\
             FOR EACH ROW\n\
             BEGIN\n\
             \x20   DELETE FROM {table} WHERE id = OLD.id;\n\
             END;",
            trigger = cleanup_trigger_name(log),
            table = self.unique_id_table_name,
        )]
    }

    fn specific_unsetup_code(&self, model: &EventModel) -> Vec<String> {
        vec![Self::drop_trigger(&cleanup_trigger_name(
            model.event_log_table_name(),
        ))]
    }

    fn recreate_unique_id_table_code(&self) -> Vec<String> {
        vec![
            format!("DROP TABLE IF EXISTS {};", self.unique_id_table_name),
            self.create_unique_id_table(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::{IdColumnType, IdInfo};

    fn place_model() -> EventModel {
        EventModel::new(
            "Place",
            "PlaceUpdates",
            "eventType",
            vec![IdInfo::single("Place", "placeId", "id", IdColumnType::Int32)],
        )
        .unwrap()
    }

    #[test]
    fn test_setup_code() {
        let source = MySqlTriggerSqlSource::new();
        let setup = source.setup_code();
        assert_eq!(setup.len(), 3);
        assert!(setup[0].starts_with("CREATE TABLE IF NOT EXISTS `_____unique____id____hsearch`"));
        assert_eq!(setup[1], "DROP PROCEDURE IF EXISTS get_unique_id_hsearch;");
        assert!(setup[2].starts_with("CREATE PROCEDURE get_unique_id_hsearch"));
        assert!(setup[2].contains("INSERT INTO `_____unique____id____hsearch` VALUES ();"));
    }

    #[test]
    fn test_insert_trigger_uses_new_values() {
        let source = MySqlTriggerSqlSource::new();
        let sql = source
            .trigger_creation_code(&place_model(), EventType::Insert)
            .unwrap();
        assert_eq!(sql.len(), 1);
        let sql = &sql[0];
        assert!(sql.starts_with("CREATE TRIGGER Place_updates_hsearch_INSERT AFTER INSERT ON Place"));
        assert!(sql.contains("CALL get_unique_id_hsearch(@unique_id);"));
        assert!(sql.contains("INSERT INTO PlaceUpdates(id, eventType, placeId)"));
        assert!(sql.contains("VALUES(@unique_id, 0, NEW.id);"));
    }

    #[test]
    fn test_delete_trigger_uses_old_values() {
        let source = MySqlTriggerSqlSource::new();
        let sql = source
            .trigger_creation_code(&place_model(), EventType::Delete)
            .unwrap();
        assert!(sql[0].contains("AFTER DELETE ON Place"));
        assert!(sql[0].contains("VALUES(@unique_id, 2, OLD.id);"));
    }

    #[test]
    fn test_trigger_without_id_columns_fails() {
        let source = MySqlTriggerSqlSource::new();
        let model = EventModel::new_unchecked("Place", "PlaceUpdates", "eventType", vec![]);
        for event_type in EventType::ALL {
            assert!(source.trigger_creation_code(&model, event_type).is_err());
        }
    }

    #[test]
    fn test_drop_and_cleanup_code() {
        let source = MySqlTriggerSqlSource::new();
        let model = place_model();
        assert_eq!(
            source.trigger_drop_code(&model, EventType::Update),
            vec!["DROP TRIGGER IF EXISTS Place_updates_hsearch_UPDATE;".to_string()]
        );

        let cleanup = source.specific_setup_code(&model);
        assert!(cleanup[0].starts_with("CREATE TRIGGER PlaceUpdates_cleanup_hsearch AFTER DELETE ON PlaceUpdates"));
        assert!(cleanup[0].contains("DELETE FROM `_____unique____id____hsearch` WHERE id = OLD.id;"));
        assert_eq!(
            source.specific_unsetup_code(&model),
            vec!["DROP TRIGGER IF EXISTS PlaceUpdates_cleanup_hsearch;".to_string()]
        );
    }

    #[test]
    fn test_recreate_keeps_procedure() {
        let source = MySqlTriggerSqlSource::with_names("ids", "next_id");
        let recreate = source.recreate_unique_id_table_code();
        assert_eq!(
            recreate,
            vec![
                "DROP TABLE IF EXISTS ids;".to_string(),
                source.setup_code()[0].clone()
            ]
        );
        assert!(recreate.iter().all(|s| !s.contains("PROCEDURE")));
    }
}
