//! The three primitives every workflow is built on, plus their implementations:
//! [`http::HttpQuestDb`] talks to a live server and [`dry_run::DryRunQuestDb`]
//! forwards reads while only logging writes.

pub mod dry_run;
pub mod http;

use std::fmt::Debug;

use async_trait::async_trait;

/// Wrapper for everything that can go wrong talking to the database
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    // The server answered, but with an error. The message is the database's own text.
    #[error("{}", api_error_display(*status, message, *position))]
    Api {
        status: Option<u16>,
        message: String,
        position: Option<u32>,
    },

    #[error("Could not reach QuestDB: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from QuestDB: {reason}")]
    Decode { reason: String },

    #[error("Invalid QuestDB URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

fn api_error_display(status: Option<u16>, message: &str, position: Option<u32>) -> String {
    let mut out = match status {
        Some(status) => format!("HTTP {status}: {message}"),
        None => message.to_string(),
    };
    if let Some(position) = position {
        out.push_str(&format!(" (at position {position})"));
    }
    out
}

impl DbError {
    /// The raw database error text, if the server produced one
    pub fn db_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[async_trait]
pub trait QuestDb: Send + Sync + Debug {
    /// Run one mutating or query-defining statement. `timeout_ms` is forwarded to the
    /// server as the per-statement timeout.
    async fn run_ddl(&self, sql: &str, timeout_ms: Option<u64>) -> Result<()>;

    async fn table_exists(&self, name: &str) -> Result<bool>;

    /// The `CREATE TABLE ...` text the server reports for `name`
    async fn fetch_schema_text(&self, name: &str) -> Result<String>;
}
