//! Core types for the index-sync framework.
//!
//! This crate provides the foundational types shared by the trigger
//! generator, the update synchronizer and the bulk scanner:
//!
//! - [`EventModel`] / [`IdInfo`] - Event-log shape of one monitored table
//! - [`UpdateInfo`] - One change event (entity type, id, event type)
//! - [`IdValue`] - Entity identity, scalar or composite
//! - [`EntityRecord`] - Entity state handed out by an entity provider
//! - [`IndexSchema`] - Root/containment declarations, loaded from YAML
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── trigger-sql      (renders trigger DDL from EventModel)
//!    ├─── multi-query      (merged paged scans, no dependency on sync-core types)
//!    └─── index-updater    (applies UpdateInfo batches using IndexSchema)
//! ```

pub mod event;
pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use event::{EventModel, IdInfo, ModelError};
pub use schema::{
    ContainedTypeConfig, ContainmentMap, IndexSchema, RehashedTypeMetadata, RootTypeConfig,
    SchemaError,
};
pub use types::{EntityType, EventType, EventTypeError, IdColumnType};
pub use values::{EntityRecord, IdValue, UpdateInfo};
