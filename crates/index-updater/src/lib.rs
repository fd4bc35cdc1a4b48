//! Incremental index synchronization.
//!
//! [`IndexUpdater`] applies ordered batches of [`UpdateInfo`] change events to
//! a full-text index whose documents are rooted at a few entity types and
//! embed other entities. A change to an embedded entity becomes an update of
//! every root document embedding it; each root document is written at most
//! once per batch.
//!
//! The entity store and the index engine are reached through the
//! [`EntityProvider`] and [`IndexWrapper`] traits. [`bulk`] repopulates an
//! index from scratch through a merged scan.
//!
//! [`UpdateInfo`]: sync_core::UpdateInfo

pub mod bulk;
mod traits;
mod updater;

pub use traits::{EntityProvider, IndexWrapper};
pub use updater::{IndexUpdater, UpdateStats};

use sync_core::{EntityType, IdValue};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum UpdateError {
    /// The event's entity type cannot be mapped to index roots
    #[error("Cannot resolve index roots for {entity_type}: {reason}")]
    Resolution {
        entity_type: EntityType,
        reason: &'static str,
    },

    #[error("Failed to load {entity_type} {ids}")]
    Provider {
        entity_type: EntityType,
        ids: String,
        #[source]
        source: BoxError,
    },

    #[error("Index failed to {operation} {entity_type} {id}")]
    Sink {
        operation: &'static str,
        entity_type: EntityType,
        id: String,
        #[source]
        source: BoxError,
    },

    /// The index could not say which root documents embed an entity
    #[error("Index failed to find {root_type} documents embedding {entity_type} {id}")]
    Lookup {
        root_type: EntityType,
        entity_type: EntityType,
        id: String,
        #[source]
        source: BoxError,
    },

    #[error("Bulk scan failed: {0}")]
    Scan(#[from] multi_query::ScanError),
}

impl UpdateError {
    pub(crate) fn sink(
        operation: &'static str,
        entity_type: &EntityType,
        id: &IdValue,
        source: anyhow::Error,
    ) -> Self {
        UpdateError::Sink {
            operation,
            entity_type: entity_type.clone(),
            id: id.to_string(),
            source: source.into(),
        }
    }
}
