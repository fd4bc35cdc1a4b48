//! Bulk (re)population of an index from the primary tables.

use crate::{IndexWrapper, UpdateError};
use multi_query::{Comparator, MultiQueryAccess};
use sync_core::{EntityRecord, EntityType};
use tracing::info;

const PROGRESS_INTERVAL: u64 = 1000;

/// Orders records by id; equal ids keep source order.
pub fn by_entity_id() -> Comparator<EntityType, EntityRecord> {
    Box::new(|a, b| a.value.id.cmp(&b.value.id))
}

/// Index every record `scan` yields, in merged order.
///
/// Returns the number of records indexed.
pub async fn index_all<W>(
    scan: &mut MultiQueryAccess<EntityType, EntityRecord>,
    wrapper: &W,
    tx: &W::Transaction,
) -> Result<u64, UpdateError>
where
    W: IndexWrapper + ?Sized,
{
    let mut indexed = 0u64;
    while scan.next().await? {
        let record = scan.get()?;
        wrapper
            .index(record, tx)
            .await
            .map_err(|source| UpdateError::sink("index", &record.entity_type, &record.id, source))?;
        indexed += 1;
        if indexed % PROGRESS_INTERVAL == 0 {
            info!("Indexed {indexed} records");
        }
    }
    info!("Bulk indexing complete: {indexed} records");
    Ok(indexed)
}
