use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::client::{DbError, QuestDb, Result};

lazy_static! {
    static ref CREATE_AS: Regex =
        Regex::new(r"(?s)^CREATE TABLE IF NOT EXISTS '((?:[^']|'')*)' AS \((.*?)\n\)( timestamp| PARTITION| DEDUP|;)")
            .unwrap();
    static ref RENAME: Regex =
        Regex::new(r"^RENAME TABLE '((?:[^']|'')*)' TO '((?:[^']|'')*)';$").unwrap();
    static ref DROP: Regex = Regex::new(r"^DROP TABLE '((?:[^']|'')*)';$").unwrap();
    static ref ALTER: Regex = Regex::new(r"^ALTER TABLE '((?:[^']|'')*)' DEDUP").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Ddl(String),
    Exists(String),
    Schema(String),
}

fn unquote(name: &str) -> String {
    name.replace("''", "'")
}

fn api_error(message: impl Into<String>) -> DbError {
    DbError::Api {
        status: Some(400),
        message: message.into(),
        position: None,
    }
}

/// In-memory stand-in for the database: keeps a table namespace (name -> content
/// tag) and applies the statements the workflows generate to it, so tests can
/// check both the statement sequence and the resulting state.
#[derive(Debug, Default)]
pub struct FakeQuestDb {
    tables: Mutex<BTreeMap<String, String>>,
    schemas: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Call>>,
    timeouts: Mutex<Vec<Option<u64>>>,
    failing_prefixes: Mutex<Vec<(String, String)>>,
    lost_prefixes: Mutex<Vec<String>>,
}

impl FakeQuestDb {
    pub fn with_tables(names: &[&str]) -> Self {
        names
            .iter()
            .fold(Self::default(), |db, name| db.with_table(name, "rows"))
    }

    pub fn with_table(self, name: &str, content: &str) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), content.to_string());
        self
    }

    pub fn with_schema(self, name: &str, ddl: &str) -> Self {
        self.schemas
            .lock()
            .unwrap()
            .insert(name.to_string(), ddl.to_string());
        self.with_table(name, "rows")
    }

    /// Statements starting with `prefix` fail with `message` and change nothing
    pub fn fail_statements_starting_with(self, prefix: &str, message: &str) -> Self {
        self.failing_prefixes
            .lock()
            .unwrap()
            .push((prefix.to_string(), message.to_string()));
        self
    }

    /// Statements starting with `prefix` take effect, but the caller never sees the answer
    pub fn lose_responses_starting_with(self, prefix: &str) -> Self {
        self.lost_prefixes.lock().unwrap().push(prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Ddl(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn timeouts(&self) -> Vec<Option<u64>> {
        self.timeouts.lock().unwrap().clone()
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.lock().unwrap().keys().cloned().collect()
    }

    pub fn content(&self, name: &str) -> Option<String> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    fn apply(&self, sql: &str) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();

        if let Some(c) = CREATE_AS.captures(sql) {
            tables
                .entry(unquote(&c[1]))
                .or_insert_with(|| c[2].to_string());
        } else if let Some(c) = RENAME.captures(sql) {
            let (from, to) = (unquote(&c[1]), unquote(&c[2]));
            if tables.contains_key(&to) {
                return Err(api_error(format!("table already exists [table={to}]")));
            }
            let content = tables
                .remove(&from)
                .ok_or_else(|| api_error(format!("table does not exist [table={from}]")))?;
            tables.insert(to, content);
        } else if let Some(c) = DROP.captures(sql) {
            let name = unquote(&c[1]);
            tables
                .remove(&name)
                .ok_or_else(|| api_error(format!("table does not exist [table={name}]")))?;
        } else if let Some(c) = ALTER.captures(sql) {
            let name = unquote(&c[1]);
            if !tables.contains_key(&name) {
                return Err(api_error(format!("table does not exist [table={name}]")));
            }
        } else {
            return Err(api_error(format!("unexpected statement: {sql}")));
        }
        Ok(())
    }
}

#[async_trait]
impl QuestDb for FakeQuestDb {
    async fn run_ddl(&self, sql: &str, timeout_ms: Option<u64>) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Ddl(sql.to_string()));
        self.timeouts.lock().unwrap().push(timeout_ms);

        let failure = self
            .failing_prefixes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, message)| message.clone());
        if let Some(message) = failure {
            return Err(api_error(message));
        }

        self.apply(sql)?;

        let lost = self
            .lost_prefixes
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()));
        if lost {
            return Err(DbError::Decode {
                reason: "connection closed before a response was read".to_string(),
            });
        }
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Exists(name.to_string()));
        Ok(self.tables.lock().unwrap().contains_key(name))
    }

    async fn fetch_schema_text(&self, name: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Schema(name.to_string()));
        self.schemas
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| api_error(format!("table does not exist [table={name}]")))
    }
}
