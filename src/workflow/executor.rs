use tracing::{debug, info};

use crate::client::{DbError, QuestDb};
use crate::ddl::{parse_create_table, TableSchema};

use super::WorkflowError;

/// Issues single statements, forwarding the caller's statement timeout to each one
pub struct DdlExecutor<'a> {
    db: &'a dyn QuestDb,
    statement_timeout: Option<u64>,
}

impl<'a> DdlExecutor<'a> {
    pub fn new(db: &'a dyn QuestDb, statement_timeout: Option<u64>) -> Self {
        Self {
            db,
            statement_timeout,
        }
    }

    pub async fn execute(&self, sql: &str) -> Result<(), DbError> {
        info!("Executing: {sql}");
        self.db
            .run_ddl(sql, self.statement_timeout)
            .await
            .map_err(|e| {
                debug!("Statement failed: {sql}: {e}");
                e
            })
    }
}

/// The answer is only good for the decision that asked for it
pub struct ExistenceOracle<'a> {
    db: &'a dyn QuestDb,
}

impl<'a> ExistenceOracle<'a> {
    pub fn new(db: &'a dyn QuestDb) -> Self {
        Self { db }
    }

    pub async fn exists(&self, name: &str) -> Result<bool, DbError> {
        let exists = self.db.table_exists(name).await?;
        debug!("Table '{name}' exists: {exists}");
        Ok(exists)
    }
}

pub async fn fetch_schema(
    db: &dyn QuestDb,
    table: &str,
) -> Result<TableSchema, WorkflowError> {
    let ddl = db.fetch_schema_text(table).await?;
    debug!("Schema of '{table}': {ddl}");
    Ok(parse_create_table(&ddl)?)
}
