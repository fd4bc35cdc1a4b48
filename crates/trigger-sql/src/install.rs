//! Installing and removing the change-capture DDL on a live database.

use crate::TriggerSqlSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use sync_core::{EventModel, EventType};
use tracing::{debug, info};

/// Something that can run one DDL statement.
#[async_trait]
pub trait SqlExecutor: Send {
    async fn execute(&mut self, statement: &str) -> Result<()>;
}

#[async_trait]
impl SqlExecutor for mysql_async::Conn {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.query_drop(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for tokio_postgres::Client {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.batch_execute(statement).await?;
        Ok(())
    }
}

async fn run_all<E: SqlExecutor + ?Sized>(executor: &mut E, statements: Vec<String>) -> Result<usize> {
    let count = statements.len();
    for statement in statements {
        debug!("Executing: {statement}");
        executor
            .execute(&statement)
            .await
            .with_context(|| format!("Failed to execute statement: {statement}"))?;
    }
    Ok(count)
}

/// Install the counter, the procedure and all triggers for `models`.
///
/// Existing triggers are dropped before being recreated, so running this
/// again after a model change is safe. The counter table is only created
/// when absent. Returns the number of statements executed.
pub async fn install<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    source: &dyn TriggerSqlSource,
    models: &[EventModel],
) -> Result<usize> {
    let mut executed = run_all(executor, source.setup_code()).await?;
    info!("Installed unique id table and procedure");

    for model in models {
        executed += run_all(executor, source.specific_unsetup_code(model)).await?;
        executed += run_all(executor, source.specific_setup_code(model)).await?;

        for event_type in EventType::ALL {
            executed += run_all(executor, source.trigger_drop_code(model, event_type)).await?;
            let create = source
                .trigger_creation_code(model, event_type)
                .with_context(|| {
                    format!(
                        "Failed to generate {event_type} trigger for table '{}'",
                        model.original_table_name()
                    )
                })?;
            executed += run_all(executor, create).await?;
        }
        info!(
            "Installed change-capture triggers on '{}' logging to '{}'",
            model.original_table_name(),
            model.event_log_table_name()
        );
    }

    Ok(executed)
}

/// Drop all triggers for `models`.
///
/// The counter table and the procedure stay; event-log ids must keep
/// increasing across a later re-install.
pub async fn uninstall<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    source: &dyn TriggerSqlSource,
    models: &[EventModel],
) -> Result<usize> {
    let mut executed = 0;
    for model in models {
        for event_type in EventType::ALL {
            executed += run_all(executor, source.trigger_drop_code(model, event_type)).await?;
        }
        executed += run_all(executor, source.specific_unsetup_code(model)).await?;
        info!(
            "Removed change-capture triggers from '{}'",
            model.original_table_name()
        );
    }
    Ok(executed)
}

/// Drop and recreate the counter table, resetting the global id sequence.
pub async fn recreate_unique_id_table<E: SqlExecutor + ?Sized>(
    executor: &mut E,
    source: &dyn TriggerSqlSource,
) -> Result<usize> {
    let executed = run_all(executor, source.recreate_unique_id_table_code()).await?;
    info!("Recreated unique id table; event ids restart from 1");
    Ok(executed)
}
