//! Rename a table, backing up whatever already sits under the new name.
//!
//! No temp table is needed since there is no query to run: if `new` exists it is
//! first renamed to a backup name (unless the caller opted out, in which case the
//! database's own error about the conflict is surfaced), then `old` becomes `new`.

use tracing::{error, info, warn};

use crate::client::QuestDb;
use crate::ddl;
use crate::naming::{new_scratch_name, ScratchKind};

use super::executor::{DdlExecutor, ExistenceOracle};
use super::{PartialFailure, WorkflowError, WorkflowResult, WorkflowStatus};

#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Skip backing up an existing table under the new name
    pub no_backup_if_exists: bool,
    /// Explicit backup name, used instead of a generated one
    pub backup_name: Option<String>,
    pub statement_timeout: Option<u64>,
}

fn validate(old: &str, new: &str, options: &RenameOptions) -> Result<(), WorkflowError> {
    if old.trim().is_empty() || new.trim().is_empty() {
        return Err(WorkflowError::validation("Table names must not be empty"));
    }
    if old == new {
        return Err(WorkflowError::validation(format!(
            "Cannot rename '{old}' to itself"
        )));
    }
    if let Some(backup) = &options.backup_name {
        if backup == old || backup == new {
            return Err(WorkflowError::validation(format!(
                "Backup name '{backup}' must differ from both table names"
            )));
        }
    }
    Ok(())
}

pub async fn rename_table(
    db: &dyn QuestDb,
    old: &str,
    new: &str,
    options: &RenameOptions,
) -> WorkflowResult {
    if let Err(err) = validate(old, new, options) {
        return WorkflowResult::clean_failure(new, err);
    }

    let executor = DdlExecutor::new(db, options.statement_timeout);
    let oracle = ExistenceOracle::new(db);

    match oracle.exists(old).await {
        Ok(true) => {}
        Ok(false) => {
            return WorkflowResult::clean_failure(
                new,
                WorkflowError::validation(format!("Table '{old}' does not exist")),
            )
        }
        Err(err) => return WorkflowResult::clean_failure(new, err.into()),
    }

    let new_exists = match oracle.exists(new).await {
        Ok(exists) => exists,
        Err(err) => return WorkflowResult::clean_failure(new, err.into()),
    };

    let mut backup_table = None;
    if new_exists && !options.no_backup_if_exists {
        let backup = match &options.backup_name {
            Some(name) => name.clone(),
            None => new_scratch_name(ScratchKind::Backup, new),
        };

        match oracle.exists(&backup).await {
            Ok(false) => {}
            Ok(true) => {
                return WorkflowResult::clean_failure(
                    new,
                    WorkflowError::validation(format!(
                        "Backup table '{backup}' already exists and will not be overwritten"
                    )),
                )
            }
            Err(err) => return WorkflowResult::clean_failure(new, err.into()),
        }

        if let Err(err) = executor.execute(&ddl::rename_table(new, &backup)).await {
            let message =
                format!("Backing up '{new}' to '{backup}' failed: {err}. Nothing was renamed.");
            return WorkflowResult::clean_failure_with_message(new, err.into(), message);
        }
        backup_table = Some(backup);
    } else if new_exists {
        info!("Table '{new}' exists and will not be backed up; the database decides whether the rename may proceed");
    }

    if let Err(err) = executor.execute(&ddl::rename_table(old, new)).await {
        let partial = backup_table.as_ref().map(|backup| PartialFailure {
            temp_table: None,
            temp_table_unconfirmed: false,
            backup_table: Some(backup.clone()),
            target_missing: true,
            original_dropped: false,
        });
        let mut message = format!("Renaming '{old}' to '{new}' failed: {err}.");
        match &partial {
            Some(partial) => {
                message.push_str(&format!(
                    " {} Table '{old}' still holds its data.",
                    partial.describe(new)
                ));
                error!("{message}");
            }
            None => warn!("{message}"),
        }

        return WorkflowResult {
            status: WorkflowStatus::Error,
            target_table: new.to_string(),
            backup_table,
            original_dropped_no_backup: false,
            message,
            partial_failure: partial,
            error: Some(err.into()),
        };
    }

    let message = match &backup_table {
        Some(backup) => {
            format!("Renamed '{old}' to '{new}'; previous '{new}' backed up to '{backup}'")
        }
        None => format!("Renamed '{old}' to '{new}'"),
    };
    info!("{message}");

    WorkflowResult {
        status: WorkflowStatus::Ok,
        target_table: new.to_string(),
        backup_table,
        original_dropped_no_backup: false,
        message,
        partial_failure: None,
        error: None,
    }
}
