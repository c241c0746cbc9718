use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{QuestDb, Result};

/// Reads go to the wrapped database; statements are only logged. Running a
/// workflow through this prints the exact sequence it would issue.
#[derive(Debug)]
pub struct DryRunQuestDb {
    inner: Arc<dyn QuestDb>,
}

impl DryRunQuestDb {
    pub fn new(inner: Arc<dyn QuestDb>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl QuestDb for DryRunQuestDb {
    async fn run_ddl(&self, sql: &str, timeout_ms: Option<u64>) -> Result<()> {
        match timeout_ms {
            Some(timeout_ms) => {
                info!("[DRY-RUN] would execute (timeout {timeout_ms}ms): {sql}")
            }
            None => info!("[DRY-RUN] would execute: {sql}"),
        }
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        self.inner.table_exists(name).await
    }

    async fn fetch_schema_text(&self, name: &str) -> Result<String> {
        self.inner.fetch_schema_text(name).await
    }
}
