use itertools::Itertools;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{info, warn};

use crate::client::QuestDb;
use crate::ddl::{self, TableSchema};

use super::executor::{fetch_schema, DdlExecutor};
use super::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DedupeAction {
    Check,
    Enable,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupeResult {
    pub table: String,
    pub action: DedupeAction,
    pub dedup_enabled: bool,
    pub designated_timestamp: Option<String>,
    pub upsert_keys: Vec<String>,
}

fn validate_enable(schema: &TableSchema, upsert_keys: &[String]) -> Result<(), WorkflowError> {
    let Some(timestamp) = &schema.designated_timestamp else {
        return Err(WorkflowError::validation(format!(
            "Table '{}' has no designated timestamp; deduplication requires one",
            schema.table_name
        )));
    };
    if !schema.wal {
        return Err(WorkflowError::validation(format!(
            "Table '{}' is not a WAL table; deduplication requires WAL",
            schema.table_name
        )));
    }

    let unknown = upsert_keys
        .iter()
        .filter(|k| !schema.has_column(k))
        .collect_vec();
    if !unknown.is_empty() {
        return Err(WorkflowError::validation(format!(
            "UPSERT KEYS reference unknown columns of '{}': {}",
            schema.table_name,
            unknown.iter().join(", ")
        )));
    }

    if !upsert_keys.iter().any(|k| k.eq_ignore_ascii_case(timestamp)) {
        return Err(WorkflowError::validation(format!(
            "UPSERT KEYS ({}) must include the designated timestamp column '{timestamp}'",
            upsert_keys.iter().join(", ")
        )));
    }

    Ok(())
}

/// Check, enable or disable deduplication. Each action is at most one schema
/// fetch followed by at most one statement.
pub async fn dedupe(
    db: &dyn QuestDb,
    table: &str,
    action: DedupeAction,
    upsert_keys: &[String],
    statement_timeout: Option<u64>,
) -> Result<DedupeResult, WorkflowError> {
    let executor = DdlExecutor::new(db, statement_timeout);

    if action != DedupeAction::Enable && !upsert_keys.is_empty() {
        warn!("Ignoring UPSERT KEYS for dedupe action '{action}'");
    }

    match action {
        DedupeAction::Check => {
            let schema = fetch_schema(db, table).await?;
            info!(
                "Deduplication on '{table}' is {}",
                if schema.dedup_enabled { "enabled" } else { "disabled" }
            );
            Ok(DedupeResult {
                table: table.to_string(),
                action,
                dedup_enabled: schema.dedup_enabled,
                designated_timestamp: schema.designated_timestamp,
                upsert_keys: schema.upsert_keys,
            })
        }
        DedupeAction::Enable => {
            if upsert_keys.is_empty() {
                return Err(WorkflowError::validation(
                    "Enabling deduplication requires at least one UPSERT KEY",
                ));
            }

            let schema = fetch_schema(db, table).await?;
            validate_enable(&schema, upsert_keys)?;

            executor
                .execute(&ddl::dedup_enable(table, upsert_keys))
                .await?;
            info!(
                "Enabled deduplication on '{table}' with UPSERT KEYS({})",
                upsert_keys.iter().join(",")
            );

            Ok(DedupeResult {
                table: table.to_string(),
                action,
                dedup_enabled: true,
                designated_timestamp: schema.designated_timestamp,
                upsert_keys: upsert_keys.to_vec(),
            })
        }
        DedupeAction::Disable => {
            executor.execute(&ddl::dedup_disable(table)).await?;
            info!("Disabled deduplication on '{table}'");

            Ok(DedupeResult {
                table: table.to_string(),
                action,
                dedup_enabled: false,
                designated_timestamp: None,
                upsert_keys: vec![],
            })
        }
    }
}
