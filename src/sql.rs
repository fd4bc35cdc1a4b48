//! SQL scripts rendered for a configuration.

use crate::IndexSyncConfig;
use anyhow::{Context, Result};
use sync_core::EventType;
use trigger_sql::SqlDialect;

/// Counter, procedure, cleanup triggers and change-capture triggers.
pub fn setup_statements(config: &IndexSyncConfig) -> Result<Vec<String>> {
    let source = config.trigger_source();
    let mut statements = source.setup_code();
    for model in &config.event_models {
        statements.extend(source.specific_setup_code(model));
        for event_type in EventType::ALL {
            let create = source
                .trigger_creation_code(model, event_type)
                .with_context(|| {
                    format!(
                        "Failed to generate {event_type} trigger for table '{}'",
                        model.original_table_name()
                    )
                })?;
            statements.extend(create);
        }
    }
    Ok(statements)
}

/// Drops of every trigger `setup_statements` creates. The counter table and
/// the procedure stay.
pub fn teardown_statements(config: &IndexSyncConfig) -> Vec<String> {
    let source = config.trigger_source();
    let mut statements = Vec::new();
    for model in &config.event_models {
        for event_type in EventType::ALL {
            statements.extend(source.trigger_drop_code(model, event_type));
        }
        statements.extend(source.specific_unsetup_code(model));
    }
    statements
}

pub fn recreate_unique_id_statements(config: &IndexSyncConfig) -> Vec<String> {
    config.trigger_source().recreate_unique_id_table_code()
}

/// Join statements into a script the dialect's command-line client accepts.
///
/// MySQL trigger and procedure bodies contain `;`, so the script switches
/// the client delimiter for its duration.
pub fn render_script(dialect: SqlDialect, statements: &[String]) -> String {
    match dialect {
        SqlDialect::MySql => {
            let mut script = String::from("DELIMITER //\n");
            for statement in statements {
                script.push_str(statement.trim_end().trim_end_matches(';'));
                script.push_str("\n//\n");
            }
            script.push_str("DELIMITER ;\n");
            script
        }
        SqlDialect::PostgreSql => {
            let mut script = statements.join("\n\n");
            script.push('\n');
            script
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
dialect: mysql
event_models:
  - original_table: Place
    event_log_table: PlaceUpdates
    id_infos:
      - entity_type: Place
        id_columns: [placeId]
        columns_in_original: [id]
        column_types: { placeId: int32 }
"#;

    #[test]
    fn test_setup_statements() {
        let config = IndexSyncConfig::from_yaml(CONFIG).unwrap();
        let statements = setup_statements(&config).unwrap();

        // 3 setup + 1 cleanup trigger + 3 triggers
        assert_eq!(statements.len(), 7);
        assert!(statements[3].starts_with("CREATE TRIGGER PlaceUpdates_cleanup_hsearch"));
        assert!(statements[6].starts_with("CREATE TRIGGER Place_updates_hsearch_DELETE"));
    }

    #[test]
    fn test_teardown_statements() {
        let config = IndexSyncConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(
            teardown_statements(&config),
            vec![
                "DROP TRIGGER IF EXISTS Place_updates_hsearch_INSERT;".to_string(),
                "DROP TRIGGER IF EXISTS Place_updates_hsearch_UPDATE;".to_string(),
                "DROP TRIGGER IF EXISTS Place_updates_hsearch_DELETE;".to_string(),
                "DROP TRIGGER IF EXISTS PlaceUpdates_cleanup_hsearch;".to_string(),
            ]
        );
    }

    #[test]
    fn test_recreate_statements() {
        let config = IndexSyncConfig::from_yaml(CONFIG).unwrap();
        let statements = recreate_unique_id_statements(&config);
        assert_eq!(
            statements[0],
            "DROP TABLE IF EXISTS `_____unique____id____hsearch`;"
        );
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_render_mysql_script() {
        let script = render_script(
            SqlDialect::MySql,
            &[
                "DROP PROCEDURE IF EXISTS p;".to_string(),
                "CREATE PROCEDURE p()\nBEGIN\n    SELECT 1;\nEND;".to_string(),
            ],
        );
        assert_eq!(
            script,
            "DELIMITER //\nDROP PROCEDURE IF EXISTS p\n//\nCREATE PROCEDURE p()\nBEGIN\n    SELECT 1;\nEND\n//\nDELIMITER ;\n"
        );
    }

    #[test]
    fn test_render_postgresql_script() {
        let script = render_script(
            SqlDialect::PostgreSql,
            &["SELECT 1;".to_string(), "SELECT 2;".to_string()],
        );
        assert_eq!(script, "SELECT 1;\n\nSELECT 2;\n");
    }
}
