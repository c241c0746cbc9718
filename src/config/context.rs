use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::dry_run::DryRunQuestDb;
use crate::client::http::{Credentials, HttpQuestDb};
use crate::client::{DbError, QuestDb};

use super::schema::QdbCliConfig;

// Build the database handle every command runs against
pub fn build_questdb(cfg: &QdbCliConfig) -> Result<Arc<dyn QuestDb>, DbError> {
    let base_url = cfg.base_url()?;
    let credentials = cfg.user.clone().map(|user| Credentials {
        user,
        password: cfg.password.clone(),
    });

    debug!(
        "Connecting to {base_url} (auth: {}, timeout: {}s)",
        credentials.is_some(),
        cfg.timeout
    );
    let http: Arc<dyn QuestDb> = Arc::new(HttpQuestDb::try_new(
        base_url,
        Duration::from_secs(cfg.timeout),
        credentials,
    )?);

    if cfg.dry_run {
        info!("Dry run: statements will be logged, not executed");
        Ok(Arc::new(DryRunQuestDb::new(http)))
    } else {
        Ok(http)
    }
}
