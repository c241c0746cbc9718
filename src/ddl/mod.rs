//! SQL text the workflows send, and the parser for the `CREATE TABLE` text the
//! server dumps back.
//!
//! Table names are always single-quoted with embedded quotes doubled, so scratch
//! names (which contain hyphens) and user names with odd characters are safe.
//! Column names inside `timestamp(...)` and `UPSERT KEYS(...)` are passed through
//! as given.

pub mod parser;

use serde::Serialize;
use strum_macros::{Display, EnumString};

pub use parser::{parse_create_table, ColumnDef, ParseError, TableSchema};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionBy {
    #[default]
    None,
    Year,
    Month,
    Day,
    Hour,
    Week,
}

pub fn quote_ident(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

// Queries are wrapped in parentheses: a trailing semicolon would end the statement early,
// and the closing parenthesis goes on its own line so a trailing `--` comment can't swallow it
fn strip_statement_end(query: &str) -> &str {
    query.trim().trim_end_matches(';').trim_end()
}

pub fn select_all_from(table: &str) -> String {
    format!("SELECT * FROM {}", quote_ident(table))
}

pub fn create_table_as(
    name: &str,
    query: &str,
    timestamp: Option<&str>,
    partition_by: Option<PartitionBy>,
    upsert_keys: &[String],
) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} AS ({}\n)",
        quote_ident(name),
        strip_statement_end(query)
    );
    if let Some(timestamp) = timestamp {
        sql.push_str(&format!(" timestamp({timestamp})"));
    }
    if let Some(partition_by) = partition_by {
        sql.push_str(&format!(" PARTITION BY {partition_by}"));
    }
    if !upsert_keys.is_empty() {
        sql.push_str(&format!(" DEDUP UPSERT KEYS({})", upsert_keys.join(",")));
    }
    sql.push(';');
    sql
}

pub fn rename_table(from: &str, to: &str) -> String {
    format!("RENAME TABLE {} TO {};", quote_ident(from), quote_ident(to))
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE {};", quote_ident(name))
}

pub fn dedup_enable(table: &str, upsert_keys: &[String]) -> String {
    format!(
        "ALTER TABLE {} DEDUP ENABLE UPSERT KEYS({});",
        quote_ident(table),
        upsert_keys.join(",")
    )
}

pub fn dedup_disable(table: &str) -> String {
    format!("ALTER TABLE {} DEDUP DISABLE;", quote_ident(table))
}

pub fn show_create_table(table: &str) -> String {
    format!("SHOW CREATE TABLE {};", quote_ident(table))
}
