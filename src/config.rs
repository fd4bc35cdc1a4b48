//! YAML configuration of the `index-sync` tool.
//!
//! ```yaml
//! dialect: mysql
//! unique_id_table: "`_____unique____id____hsearch`"   # optional
//! unique_id_procedure: get_unique_id_hsearch          # optional
//! event_models:
//!   - original_table: Place
//!     event_log_table: PlaceUpdates
//!     id_infos:
//!       - entity_type: Place
//!         id_columns: [placeId]
//!         columns_in_original: [id]
//!         column_types: { placeId: int32 }
//! roots:
//!   - entity_type: Place
//!     contained:
//!       - entity_type: Sorcerer
//!         id_fields: [sorcerers.id]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use sync_core::{EventModel, IndexSchema, RootTypeConfig, SchemaError};
use thiserror::Error;
use tracing::warn;
use trigger_sql::{SqlDialect, TriggerSqlSource};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid index schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Table '{0}' has more than one event model")]
    DuplicateTable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSyncConfig {
    pub dialect: SqlDialect,

    /// Counter table name; dialect default when absent
    #[serde(default)]
    pub unique_id_table: Option<String>,

    /// Counter procedure/function name; dialect default when absent
    #[serde(default)]
    pub unique_id_procedure: Option<String>,

    #[serde(default)]
    pub event_models: Vec<EventModel>,

    #[serde(default)]
    pub roots: Vec<RootTypeConfig>,
}

impl IndexSyncConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut tables = HashSet::new();
        for model in &self.event_models {
            if !tables.insert(model.original_table_name()) {
                return Err(ConfigError::DuplicateTable(
                    model.original_table_name().to_string(),
                ));
            }
        }

        let schema = self.index_schema()?;
        if schema.roots().is_empty() {
            return Ok(());
        }
        let relevant = schema.index_relevant_entities();
        for model in &self.event_models {
            for info in model.id_infos() {
                if !relevant.contains(&info.entity_type) {
                    warn!(
                        "Table '{}' reports changes of '{}', which no index root contains",
                        model.original_table_name(),
                        info.entity_type
                    );
                }
            }
        }
        Ok(())
    }

    pub fn index_schema(&self) -> Result<IndexSchema, SchemaError> {
        IndexSchema::new(self.roots.clone())
    }

    pub fn trigger_source(&self) -> Box<dyn TriggerSqlSource> {
        self.dialect.trigger_source(
            self.unique_id_table.as_deref(),
            self.unique_id_procedure.as_deref(),
        )
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
  - original_table: Place_Sorcerer
    event_log_table: PlaceSorcererUpdates
    id_infos:
      - entity_type: Place
        id_columns: [placeId]
        columns_in_original: [Place_ID]
        column_types: { placeId: int32 }
      - entity_type: Sorcerer
        id_columns: [sorcererId]
        columns_in_original: [sorcerers_ID]
        column_types: { sorcererId: int32 }
roots:
  - entity_type: Place
    contained:
      - entity_type: Sorcerer
        id_fields: [sorcerers.id]
"#;

    #[test]
    fn test_from_yaml() {
        let config = IndexSyncConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.dialect, SqlDialect::MySql);
        assert_eq!(config.event_models.len(), 2);
        assert_eq!(config.event_models[1].id_infos().len(), 2);
        assert!(config.unique_id_table.is_none());

        let schema = config.index_schema().unwrap();
        assert_eq!(schema.roots().len(), 1);
    }

    #[test]
    fn test_custom_counter_names() {
        let yaml = "dialect: postgresql\nunique_id_table: ids\nunique_id_procedure: next_id\n";
        let config = IndexSyncConfig::from_yaml(yaml).unwrap();
        let setup = config.trigger_source().setup_code();
        assert!(setup[0].contains("CREATE TABLE IF NOT EXISTS ids"));
        assert!(setup[2].contains("CREATE FUNCTION next_id()"));
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        let yaml = r#"
dialect: mysql
event_models:
  - original_table: Place
    event_log_table: PlaceUpdates
    id_infos:
      - entity_type: Place
        id_columns: [placeId]
        columns_in_original: [id]
        column_types: { placeId: int32 }
  - original_table: Place
    event_log_table: PlaceUpdates2
    id_infos:
      - entity_type: Place
        id_columns: [placeId]
        columns_in_original: [id]
        column_types: { placeId: int32 }
"#;
        assert!(matches!(
            IndexSyncConfig::from_yaml(yaml),
            Err(ConfigError::DuplicateTable(table)) if table == "Place"
        ));
    }

    #[test]
    fn test_rejects_invalid_schema() {
        let yaml = "dialect: mysql\nroots:\n  - entity_type: Place\n  - entity_type: Place\n";
        assert!(matches!(
            IndexSyncConfig::from_yaml(yaml),
            Err(ConfigError::Schema(SchemaError::DuplicateRoot(_)))
        ));
    }

    #[test]
    fn test_rejects_unknown_dialect() {
        assert!(matches!(
            IndexSyncConfig::from_yaml("dialect: oracle\n"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index-sync.yaml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = IndexSyncConfig::from_file(&path).unwrap();
        assert_eq!(config.event_models[0].event_log_table_name(), "PlaceUpdates");

        assert!(matches!(
            IndexSyncConfig::from_file(dir.path().join("missing.yaml")),
            Err(ConfigError::IoError(_))
        ));
    }
}
