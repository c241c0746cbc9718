mod commands;

pub use commands::{Args, Command, DedupeArgs, RenameArgs, ReplaceArgs};

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::client::{DbError, QuestDb};
use crate::ddl::parse_create_table;
use crate::workflow::{self, WorkflowStatus};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Parse(#[from] crate::ddl::ParseError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub struct QdbCli {
    db: Arc<dyn QuestDb>,
}

impl QdbCli {
    pub fn new(db: Arc<dyn QuestDb>) -> Self {
        QdbCli { db }
    }

    /// Run one sub-command, printing its result to `out`. Workflow failures are
    /// part of the printed result; only failures of the thin read commands and of
    /// writing the output itself come back as `Err`.
    pub async fn handle_command<W: Write>(
        &self,
        cmd: &Command,
        out: &mut W,
    ) -> Result<WorkflowStatus, CliError> {
        let now = Instant::now();
        let db = self.db.as_ref();

        let status = match cmd {
            Command::CreateOrReplace(args) => {
                let result = workflow::replace_table_from_query(
                    db,
                    &args.table,
                    &args.source(),
                    &args.options(),
                )
                .await;
                print_json(out, &result)?;
                result.status
            }
            Command::Rename(args) => {
                let result =
                    workflow::rename_table(db, &args.old, &args.new, &args.options()).await;
                print_json(out, &result)?;
                result.status
            }
            Command::Dedupe(args) => {
                match workflow::dedupe(
                    db,
                    &args.table,
                    args.action(),
                    &args.upsert_keys,
                    args.statement_timeout,
                )
                .await
                {
                    Ok(result) => {
                        print_json(out, &result)?;
                        WorkflowStatus::Ok
                    }
                    Err(e) => {
                        error!("{e}");
                        print_json(
                            out,
                            &json!({
                                "status": WorkflowStatus::Error,
                                "table": args.table,
                                "action": args.action(),
                                "error": {"kind": e.kind(), "message": e.to_string()},
                            }),
                        )?;
                        WorkflowStatus::Error
                    }
                }
            }
            Command::Chk { table } => {
                let exists = db.table_exists(table).await?;
                print_json(out, &json!({"table": table, "exists": exists}))?;
                WorkflowStatus::Ok
            }
            Command::Schema { table, parsed } => {
                let ddl = db.fetch_schema_text(table).await?;
                if *parsed {
                    print_json(out, &parse_create_table(&ddl)?)?;
                } else {
                    writeln!(out, "{ddl}")?;
                }
                WorkflowStatus::Ok
            }
        };

        debug!("Time: {:.3}s", now.elapsed().as_secs_f64());
        Ok(status)
    }
}
