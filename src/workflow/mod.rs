//! Multi-statement table workflows.
//!
//! The server has no transactional "replace table", so each workflow is a fixed
//! sequence of single statements, issued one at a time, each depending on what the
//! previous one observed. Nothing is retried and nothing is rolled back: when a step
//! fails, the returned [`WorkflowResult`] records exactly which objects were left in
//! a non-final state so they can be resolved by hand.
//!
//! There is no cross-invocation locking. Two invocations against the same table
//! can race between an existence probe and the statement that relies on it; the
//! random scratch names only keep their temporary objects apart.

pub mod dedupe;
pub mod executor;
pub mod rename;
pub mod replace;

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::client::DbError;
use crate::ddl::ParseError;

pub use dedupe::{dedupe, DedupeAction, DedupeResult};
pub use rename::{rename_table, RenameOptions};
pub use replace::{replace_table_from_query, BackupPolicy, QuerySource, ReplaceOptions};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    // Client-side precondition failures: nothing was sent for the failing step
    #[error("{reason}")]
    Validation { reason: String },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl WorkflowError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Db(_) => "database",
            Self::Parse(_) => "parse",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    Ok,
    Error,
}

/// Objects a failed workflow left behind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialFailure {
    /// Scratch table holding the new data that was never renamed into place
    pub temp_table: Option<String>,
    /// The request creating `temp_table` got no answer, so it may or may not exist
    pub temp_table_unconfirmed: bool,
    /// Table now holding the target's previous data
    pub backup_table: Option<String>,
    /// Nothing is left under the target name
    pub target_missing: bool,
    /// The target's previous data was dropped without a backup
    pub original_dropped: bool,
}

impl PartialFailure {
    pub fn leftover_tables(&self) -> Vec<&str> {
        self.temp_table
            .iter()
            .chain(self.backup_table.iter())
            .map(String::as_str)
            .collect()
    }

    pub(crate) fn describe(&self, target: &str) -> String {
        let mut lines = vec![];
        if self.target_missing {
            lines.push(format!(
                "Table '{target}' is now MISSING: neither the old nor the new data is under that name."
            ));
        }
        if let (Some(temp), true) = (&self.temp_table, self.temp_table_unconfirmed) {
            lines.push(format!(
                "Temporary table '{temp}' may have been created; check for it and drop it or rename it to '{target}'."
            ));
        } else if let Some(temp) = &self.temp_table {
            lines.push(format!(
                "New data is in temporary table '{temp}', which still needs to be renamed to '{target}' or dropped."
            ));
        }
        if let Some(backup) = &self.backup_table {
            lines.push(format!(
                "Previous data of '{target}' is in backup table '{backup}'."
            ));
        }
        if self.original_dropped {
            lines.push(format!(
                "Previous data of '{target}' was dropped without a backup."
            ));
        }
        lines.join(" ")
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<WorkflowError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct ErrorRepr<'a> {
        kind: &'a str,
        message: String,
    }

    error
        .as_ref()
        .map(|e| ErrorRepr {
            kind: e.kind(),
            message: e.to_string(),
        })
        .serialize(serializer)
}

/// Outcome of a replace or rename: what actually changed in the database
#[derive(Debug, Serialize)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub target_table: String,
    pub backup_table: Option<String>,
    pub original_dropped_no_backup: bool,
    pub message: String,
    pub partial_failure: Option<PartialFailure>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<WorkflowError>,
}

impl WorkflowResult {
    pub fn is_ok(&self) -> bool {
        self.status == WorkflowStatus::Ok
    }

    /// A failure that left the database untouched
    pub(crate) fn clean_failure(target: &str, error: WorkflowError) -> Self {
        let message = error.to_string();
        Self::clean_failure_with_message(target, error, message)
    }

    pub(crate) fn clean_failure_with_message(
        target: &str,
        error: WorkflowError,
        message: String,
    ) -> Self {
        warn!("{message}");
        Self {
            status: WorkflowStatus::Error,
            target_table: target.to_string(),
            backup_table: None,
            original_dropped_no_backup: false,
            message,
            partial_failure: None,
            error: Some(error),
        }
    }
}
