//! Index containment schema.
//!
//! The schema declares which entity types are index roots (one search
//! document per instance) and which other entity types each root embeds. It
//! replaces runtime reflection over annotated types: it is loaded once, from
//! YAML or built in code, and everything derived from it is immutable.
//!
//! ## YAML Format
//!
//! ```yaml
//! roots:
//!   - entity_type: Place
//!     id_type: uuid
//!     contained:
//!       - entity_type: Sorcerer
//!         id_fields: [sorcerers.id]
//!         back_reference: place
//! ```
//!
//! `id_fields` are the document fields of the root that hold the contained
//! entity's id, so an index engine can find the roots embedding a given
//! child. `back_reference` is the property of the contained entity that
//! holds the owning root id(s). Every contained type needs at least one of
//! the two.
//!
//! A back-reference value is read as the root's `id_type` (`int64` unless
//! set). When the value is an object, the root id is taken from its
//! `id_property` member (`id` unless set).

use crate::types::{EntityType, IdColumnType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Root declared more than once
    #[error("Root type declared more than once: {0}")]
    DuplicateRoot(EntityType),

    /// Contained type listed twice under one root
    #[error("Type '{contained}' listed more than once under root '{root}'")]
    DuplicateContained {
        root: EntityType,
        contained: EntityType,
    },

    /// Contained type with neither id fields nor a back-reference
    #[error("Type '{contained}' under root '{root}' needs id_fields or a back_reference")]
    UnresolvableContained {
        root: EntityType,
        contained: EntityType,
    },

    /// Empty entity type name
    #[error("Entity type names must not be empty")]
    EmptyName,
}

fn default_id_property() -> String {
    "id".to_string()
}

fn default_id_type() -> IdColumnType {
    IdColumnType::Int64
}

/// A type embedded into a root's documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedTypeConfig {
    pub entity_type: EntityType,

    /// Root document fields holding the contained entity's id
    #[serde(default)]
    pub id_fields: Vec<String>,

    /// Property on the contained entity referencing the owning root(s)
    #[serde(default)]
    pub back_reference: Option<String>,
}

impl ContainedTypeConfig {
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id_fields: Vec::new(),
            back_reference: None,
        }
    }

    pub fn with_id_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_back_reference(mut self, property: impl Into<String>) -> Self {
        self.back_reference = Some(property.into());
        self
    }
}

/// An index root and the types its documents embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootTypeConfig {
    pub entity_type: EntityType,

    /// Member holding the root id when a back-reference is an object
    #[serde(default = "default_id_property")]
    pub id_property: String,

    /// Type of the root id, used to read back-reference values
    #[serde(default = "default_id_type")]
    pub id_type: IdColumnType,

    #[serde(default)]
    pub contained: Vec<ContainedTypeConfig>,
}

impl RootTypeConfig {
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id_property: default_id_property(),
            id_type: default_id_type(),
            contained: Vec::new(),
        }
    }

    pub fn with_id_type(mut self, id_type: IdColumnType) -> Self {
        self.id_type = id_type;
        self
    }

    pub fn contains(mut self, contained: ContainedTypeConfig) -> Self {
        self.contained.push(contained);
        self
    }
}

/// Precomputed lookups for one root: how to get from any embedded entity
/// back to the root documents embedding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehashedTypeMetadata {
    root_type: EntityType,
    root_id_property: String,
    root_id_type: IdColumnType,
    id_fields_for_type: HashMap<EntityType, Vec<String>>,
    back_reference_for_type: HashMap<EntityType, String>,
}

impl RehashedTypeMetadata {
    fn rehash(root: &RootTypeConfig) -> Self {
        let mut id_fields_for_type = HashMap::new();
        let mut back_reference_for_type = HashMap::new();

        for contained in &root.contained {
            if !contained.id_fields.is_empty() {
                id_fields_for_type.insert(contained.entity_type.clone(), contained.id_fields.clone());
            }
            if let Some(back_reference) = &contained.back_reference {
                back_reference_for_type.insert(contained.entity_type.clone(), back_reference.clone());
            }
        }

        Self {
            root_type: root.entity_type.clone(),
            root_id_property: root.id_property.clone(),
            root_id_type: root.id_type,
            id_fields_for_type,
            back_reference_for_type,
        }
    }

    pub fn root_type(&self) -> &EntityType {
        &self.root_type
    }

    /// Whether `entity_type` is embedded into this root's documents. A root
    /// that embeds instances of its own type counts.
    pub fn embeds(&self, entity_type: &EntityType) -> bool {
        self.id_fields_for_type.contains_key(entity_type)
            || self.back_reference_for_type.contains_key(entity_type)
    }

    /// Member of an object-valued back-reference holding the root id.
    pub fn root_id_property(&self) -> &str {
        &self.root_id_property
    }

    pub fn root_id_type(&self) -> IdColumnType {
        self.root_id_type
    }

    /// Document fields holding ids of `entity_type`; empty when none are
    /// configured.
    pub fn id_fields(&self, entity_type: &EntityType) -> &[String] {
        self.id_fields_for_type
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn back_reference(&self, entity_type: &EntityType) -> Option<&str> {
        self.back_reference_for_type.get(entity_type).map(String::as_str)
    }
}

/// Entity type → root types whose documents embed it.
///
/// A root maps to itself first, followed by other roots embedding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentMap {
    in_index_of: HashMap<EntityType, Vec<EntityType>>,
}

impl ContainmentMap {
    pub fn roots_for(&self, entity_type: &EntityType) -> Option<&[EntityType]> {
        self.in_index_of.get(entity_type).map(Vec::as_slice)
    }
}

/// Validated set of root declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIndexSchema")]
pub struct IndexSchema {
    roots: Vec<RootTypeConfig>,
}

#[derive(Deserialize)]
struct RawIndexSchema {
    #[serde(default)]
    roots: Vec<RootTypeConfig>,
}

impl TryFrom<RawIndexSchema> for IndexSchema {
    type Error = SchemaError;

    fn try_from(raw: RawIndexSchema) -> Result<Self, Self::Error> {
        IndexSchema::new(raw.roots)
    }
}

impl IndexSchema {
    pub fn new(roots: Vec<RootTypeConfig>) -> Result<Self, SchemaError> {
        let mut seen_roots = HashSet::new();
        for root in &roots {
            if root.entity_type.as_str().is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if !seen_roots.insert(&root.entity_type) {
                return Err(SchemaError::DuplicateRoot(root.entity_type.clone()));
            }
            let mut seen_contained = HashSet::new();
            for contained in &root.contained {
                if contained.entity_type.as_str().is_empty() {
                    return Err(SchemaError::EmptyName);
                }
                if !seen_contained.insert(&contained.entity_type) {
                    return Err(SchemaError::DuplicateContained {
                        root: root.entity_type.clone(),
                        contained: contained.entity_type.clone(),
                    });
                }
                if contained.id_fields.is_empty() && contained.back_reference.is_none() {
                    return Err(SchemaError::UnresolvableContained {
                        root: root.entity_type.clone(),
                        contained: contained.entity_type.clone(),
                    });
                }
            }
        }
        Ok(Self { roots })
    }

    /// Load schema from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse schema from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn roots(&self) -> &[RootTypeConfig] {
        &self.roots
    }

    /// Build the containment map.
    pub fn contained_in_index_of(&self) -> ContainmentMap {
        let mut in_index_of: HashMap<EntityType, Vec<EntityType>> = HashMap::new();
        for root in &self.roots {
            in_index_of
                .entry(root.entity_type.clone())
                .or_default()
                .push(root.entity_type.clone());
        }
        for root in &self.roots {
            for contained in &root.contained {
                let roots = in_index_of.entry(contained.entity_type.clone()).or_default();
                if !roots.contains(&root.entity_type) {
                    roots.push(root.entity_type.clone());
                }
            }
        }
        ContainmentMap { in_index_of }
    }

    /// Rehashed metadata, keyed by root type.
    pub fn rehashed_metadata(&self) -> HashMap<EntityType, RehashedTypeMetadata> {
        self.roots
            .iter()
            .map(|root| (root.entity_type.clone(), RehashedTypeMetadata::rehash(root)))
            .collect()
    }

    /// Every entity type whose changes matter to the index.
    pub fn index_relevant_entities(&self) -> BTreeSet<EntityType> {
        self.roots
            .iter()
            .flat_map(|root| {
                std::iter::once(root.entity_type.clone())
                    .chain(root.contained.iter().map(|c| c.entity_type.clone()))
            })
            .collect()
    }
}
