//! Create-or-replace a table from a query.
//!
//! 1. Build: create a temp table from the query. The database validates the query
//!    and types here, before anything existing is touched.
//! 2. Probe the target. If it exists, either drop it or rename it to a backup name.
//! 3. Promote: rename the temp table to the target name.
//!
//! A failed build leaves nothing behind. A failure in step 2 leaves the temp table
//! and an untouched target. A failed promote after step 2 leaves the target name
//! empty, which the result reports explicitly.

use itertools::Itertools;
use tracing::{error, info, warn};

use crate::client::{DbError, QuestDb};
use crate::ddl::{self, PartitionBy};
use crate::naming::{new_scratch_name, ScratchKind};

use super::executor::{DdlExecutor, ExistenceOracle};
use super::{PartialFailure, WorkflowError, WorkflowResult, WorkflowStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    Query(String),
    /// Copy every row of an existing table
    Table(String),
}

impl QuerySource {
    pub fn to_sql(&self) -> String {
        match self {
            Self::Query(query) => query.clone(),
            Self::Table(table) => ddl::select_all_from(table),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackupPolicy {
    /// Back the existing target up under a generated name
    #[default]
    Generated,
    Named(String),
    /// Drop the existing target
    NoBackup,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    pub timestamp: Option<String>,
    pub partition_by: Option<PartitionBy>,
    pub upsert_keys: Vec<String>,
    pub backup: BackupPolicy,
    pub statement_timeout: Option<u64>,
}

fn validate(
    target: &str,
    query: &str,
    options: &ReplaceOptions,
) -> Result<(), WorkflowError> {
    if target.trim().is_empty() {
        return Err(WorkflowError::validation("Target table name is empty"));
    }
    if query.trim().trim_end_matches(';').trim().is_empty() {
        return Err(WorkflowError::validation("Query is empty"));
    }

    let partitioned = !matches!(options.partition_by, None | Some(PartitionBy::None));
    if partitioned && options.timestamp.is_none() {
        return Err(WorkflowError::validation(format!(
            "PARTITION BY {} requires a designated timestamp column",
            options.partition_by.unwrap_or_default()
        )));
    }

    if !options.upsert_keys.is_empty() {
        let Some(timestamp) = &options.timestamp else {
            return Err(WorkflowError::validation(
                "UPSERT KEYS require a designated timestamp column",
            ));
        };
        if !options
            .upsert_keys
            .iter()
            .any(|k| k.eq_ignore_ascii_case(timestamp))
        {
            return Err(WorkflowError::validation(format!(
                "UPSERT KEYS ({}) must include the designated timestamp column '{timestamp}'",
                options.upsert_keys.iter().join(", ")
            )));
        }
    }

    if let BackupPolicy::Named(backup) = &options.backup {
        if backup.trim().is_empty() {
            return Err(WorkflowError::validation("Backup table name is empty"));
        }
        if backup == target {
            return Err(WorkflowError::validation(
                "Backup table name must differ from the target table name",
            ));
        }
    }

    Ok(())
}

/// State changes made so far, so a failure can report exactly what is left
struct Progress<'a> {
    target: &'a str,
    temp: String,
    temp_unconfirmed: bool,
    backup: Option<String>,
    dropped: bool,
}

impl<'a> Progress<'a> {
    fn fail(self, step: &str, err: WorkflowError) -> WorkflowResult {
        let target_cleared = self.backup.is_some() || self.dropped;
        let partial = PartialFailure {
            temp_table: Some(self.temp),
            temp_table_unconfirmed: self.temp_unconfirmed,
            backup_table: self.backup.clone(),
            target_missing: target_cleared,
            original_dropped: self.dropped,
        };

        let mut message = format!("{step} failed: {err}. {}", partial.describe(self.target));
        if !target_cleared {
            message.push_str(&format!(" Table '{}' was not modified.", self.target));
        }

        if target_cleared {
            error!("{message}");
        } else {
            warn!("{message}");
        }

        WorkflowResult {
            status: WorkflowStatus::Error,
            target_table: self.target.to_string(),
            backup_table: self.backup,
            original_dropped_no_backup: self.dropped,
            message,
            partial_failure: Some(partial),
            error: Some(err),
        }
    }

    fn succeed(self) -> WorkflowResult {
        let message = match (&self.backup, self.dropped) {
            (Some(backup), _) => format!(
                "Replaced table '{}'; previous data backed up to '{backup}'",
                self.target
            ),
            (None, true) => format!(
                "Replaced table '{}'; previous data dropped without backup",
                self.target
            ),
            (None, false) => format!("Created table '{}'", self.target),
        };
        info!("{message}");

        WorkflowResult {
            status: WorkflowStatus::Ok,
            target_table: self.target.to_string(),
            backup_table: self.backup,
            original_dropped_no_backup: self.dropped,
            message,
            partial_failure: None,
            error: None,
        }
    }
}

pub async fn replace_table_from_query(
    db: &dyn QuestDb,
    target: &str,
    source: &QuerySource,
    options: &ReplaceOptions,
) -> WorkflowResult {
    let query = source.to_sql();
    if let Err(err) = validate(target, &query, options) {
        return WorkflowResult::clean_failure(target, err);
    }

    let executor = DdlExecutor::new(db, options.statement_timeout);
    let oracle = ExistenceOracle::new(db);

    // Build
    let temp = new_scratch_name(ScratchKind::Temp, target);
    // CREATE ... IF NOT EXISTS would silently keep a stale table under this name
    match oracle.exists(&temp).await {
        Ok(false) => {}
        Ok(true) => {
            return WorkflowResult::clean_failure(
                target,
                WorkflowError::validation(format!(
                    "Temporary table '{temp}' unexpectedly exists already"
                )),
            )
        }
        Err(err) => return WorkflowResult::clean_failure(target, err.into()),
    }

    let create = ddl::create_table_as(
        &temp,
        &query,
        options.timestamp.as_deref(),
        options.partition_by,
        &options.upsert_keys,
    );
    if let Err(err) = executor.execute(&create).await {
        // Without an answer from the server the temp table may exist anyway
        if !matches!(err, DbError::Api { .. }) {
            let progress = Progress {
                target,
                temp,
                temp_unconfirmed: true,
                backup: None,
                dropped: false,
            };
            return progress.fail("Creating the new table", err.into());
        }

        let message =
            format!("Creating the new table failed: {err}. Table '{target}' was not modified.");
        return WorkflowResult::clean_failure_with_message(target, err.into(), message);
    }

    let mut progress = Progress {
        target,
        temp,
        temp_unconfirmed: false,
        backup: None,
        dropped: false,
    };

    // Probe target
    let target_exists = match oracle.exists(target).await {
        Ok(exists) => exists,
        Err(err) => return progress.fail("Checking the target table", err.into()),
    };

    if target_exists {
        match &options.backup {
            BackupPolicy::NoBackup => {
                if let Err(err) = executor.execute(&ddl::drop_table(target)).await {
                    return progress.fail("Dropping the original table", err.into());
                }
                progress.dropped = true;
            }
            policy => {
                let backup = match policy {
                    BackupPolicy::Named(name) => name.clone(),
                    _ => new_scratch_name(ScratchKind::Backup, target),
                };

                match oracle.exists(&backup).await {
                    Ok(false) => {}
                    Ok(true) => {
                        return progress.fail(
                            "Backing up the original table",
                            WorkflowError::validation(format!(
                                "backup table '{backup}' already exists and will not be overwritten"
                            )),
                        )
                    }
                    Err(err) => {
                        return progress.fail("Checking the backup table", err.into())
                    }
                }

                if let Err(err) = executor.execute(&ddl::rename_table(target, &backup)).await
                {
                    return progress.fail("Backing up the original table", err.into());
                }
                progress.backup = Some(backup);
            }
        }
    }

    // Promote
    if let Err(err) = executor
        .execute(&ddl::rename_table(&progress.temp, target))
        .await
    {
        return progress.fail("Renaming the new table into place", err.into());
    }

    progress.succeed()
}
