//! QuestDb implementation over the server's REST endpoints (`/exec` and `/chk`)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::ddl::show_create_table;

use super::{DbError, QuestDb, Result};

pub const STATEMENT_TIMEOUT_HEADER: &str = "Statement-Timeout";
const CHK_EXISTS: &str = "Exists";
// Bodies echoed into logs and decode errors are cut to this many characters
const MAX_BODY_ECHO: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct HttpQuestDb {
    client: Client,
    exec_url: Url,
    chk_url: Url,
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
struct ExecResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    position: Option<u32>,
    #[serde(default)]
    dataset: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Deserialize)]
struct ChkResponse {
    status: String,
}

impl HttpQuestDb {
    pub fn try_new(
        base_url: Url,
        timeout: Duration,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("qdb-cli/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            exec_url: base_url.join("exec")?,
            chk_url: base_url.join("chk")?,
            credentials,
        })
    }

    fn request_builder(&self, url: &Url) -> RequestBuilder {
        let builder = self.client.get(url.clone());
        match &self.credentials {
            Some(Credentials { user, password }) => {
                builder.basic_auth(user, password.as_ref())
            }
            None => builder,
        }
    }

    async fn exec(&self, sql: &str, timeout_ms: Option<u64>) -> Result<ExecResponse> {
        let mut request = self.request_builder(&self.exec_url).query(&[("query", sql)]);
        if let Some(timeout_ms) = timeout_ms {
            request = request.header(STATEMENT_TIMEOUT_HEADER, timeout_ms.to_string());
        }

        debug!("GET {} query={sql:?} timeout_ms={timeout_ms:?}", self.exec_url);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Response status: {status}");

        decode_exec_response(status, &body)
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_ECHO) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn decode_exec_response(status: StatusCode, body: &str) -> Result<ExecResponse> {
    let parsed = serde_json::from_str::<ExecResponse>(body).ok();

    match (status.is_success(), parsed) {
        (true, Some(response)) if response.error.is_none() => Ok(response),
        (_, Some(response)) => Err(DbError::Api {
            status: Some(status.as_u16()),
            message: response
                .error
                .or(response.message)
                .unwrap_or_else(|| status.to_string()),
            position: response.position,
        }),
        (true, None) => Err(DbError::Decode {
            reason: format!("expected JSON from /exec, got: {}", truncate(body)),
        }),
        (false, None) => {
            let text = body.trim();
            debug!("Non-JSON error body: {}", truncate(text));
            Err(DbError::Api {
                status: Some(status.as_u16()),
                message: if text.is_empty() {
                    status.to_string()
                } else {
                    text.to_string()
                },
                position: None,
            })
        }
    }
}

fn first_cell_as_string(response: ExecResponse) -> Result<String> {
    let cell = response
        .dataset
        .and_then(|rows| rows.into_iter().next())
        .and_then(|row| row.into_iter().next());

    match cell {
        Some(Value::String(ddl)) => Ok(ddl),
        Some(other) => Err(DbError::Decode {
            reason: format!("expected DDL text, got {other}"),
        }),
        None => Err(DbError::Decode {
            reason: "SHOW CREATE TABLE returned no rows".to_string(),
        }),
    }
}

#[async_trait]
impl QuestDb for HttpQuestDb {
    async fn run_ddl(&self, sql: &str, timeout_ms: Option<u64>) -> Result<()> {
        self.exec(sql, timeout_ms).await.map(|_| ())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let request = self.request_builder(&self.chk_url).query(&[
            ("f", "json"),
            ("j", name),
            ("version", "2"),
        ]);

        debug!("GET {} j={name:?}", self.chk_url);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!("/chk failed with {status}: {}", truncate(body.trim()));
            return Err(DbError::Api {
                status: Some(status.as_u16()),
                message: body.trim().to_string(),
                position: None,
            });
        }

        let parsed: ChkResponse =
            serde_json::from_str(&body).map_err(|e| DbError::Decode {
                reason: format!("{e} in /chk response: {}", truncate(&body)),
            })?;
        debug!("Table {name:?} status: {}", parsed.status);

        Ok(parsed.status == CHK_EXISTS)
    }

    async fn fetch_schema_text(&self, name: &str) -> Result<String> {
        let response = self.exec(&show_create_table(name), None).await?;
        first_cell_as_string(response)
    }
}
