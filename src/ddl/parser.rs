//! Parser for the `CREATE TABLE` text returned by `SHOW CREATE TABLE`.
//!
//! This only understands the shape the server itself emits:
//!
//! ```text
//! CREATE TABLE 'name' ( col TYPE, ... )
//!   [timestamp(col)] [PARTITION BY X] [TTL n UNIT] [WAL | BYPASS WAL]
//!   [WITH key=value, ...] [IN VOLUME 'v'] [DEDUP UPSERT KEYS(a,b)] [;]
//! ```
//!
//! Clauses must appear in that order. Anything the parser doesn't recognize is an
//! error rather than being skipped: a silently dropped DEDUP clause would make the
//! dedup validation report the wrong thing.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::PartitionBy;

lazy_static! {
    static ref BARE_WORD: Regex = Regex::new(r#"^[^\s(),;='"]+"#).unwrap();
}

// How much of the remaining input to echo back in errors
const CONTEXT_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Could not parse table DDL at offset {offset}: {reason} (near {near:?})")]
pub struct ParseError {
    pub reason: String,
    pub offset: usize,
    pub near: String,
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub type_def: String,
}

/// Read-only view of a table's DDL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub designated_timestamp: Option<String>,
    pub partition_by: PartitionBy,
    pub wal: bool,
    pub dedup_enabled: bool,
    pub upsert_keys: Vec<String>,
}

impl TableSchema {
    // Column names are case-insensitive on the server
    pub fn has_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn error<T>(&self, reason: impl Into<String>) -> Result<T> {
        Err(ParseError {
            reason: reason.into(),
            offset: self.pos,
            near: self.rest().chars().take(CONTEXT_LEN).collect(),
        })
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest().is_empty()
    }

    fn eat_char(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.eat_char(c) {
            Ok(())
        } else {
            self.error(format!("expected '{c}'"))
        }
    }

    /// Consume `keyword` (case-insensitive) if it's the next whole word
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        let Some(candidate) = rest.get(..keyword.len()) else {
            return false;
        };
        let boundary = rest[keyword.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));

        if boundary && candidate.eq_ignore_ascii_case(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(format!("expected {keyword}"))
        }
    }

    /// A bare word, or a single/double-quoted identifier with doubled-quote escapes
    fn identifier(&mut self) -> Result<String> {
        self.skip_ws();
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('\'' | '"')) => {
                let mut out = String::new();
                let mut chars = rest.char_indices().skip(1).peekable();
                while let Some((idx, c)) = chars.next() {
                    if c != quote {
                        out.push(c);
                        continue;
                    }
                    if matches!(chars.peek(), Some((_, next)) if *next == quote) {
                        chars.next();
                        out.push(quote);
                        continue;
                    }
                    self.pos += idx + 1;
                    return Ok(out);
                }
                self.error("unterminated quoted identifier")
            }
            _ => match BARE_WORD.find(rest) {
                Some(m) => {
                    self.pos += m.end();
                    Ok(m.as_str().to_string())
                }
                None => self.error("expected an identifier"),
            },
        }
    }

    /// Text up to the parenthesis matching one that was just consumed
    fn balanced_group(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let mut depth = 1usize;
        let mut quote: Option<char> = None;

        for (idx, c) in self.rest().char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, '(') => depth += 1,
                (None, ')') => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos = start + idx + 1;
                        return Ok(&self.input[start..start + idx]);
                    }
                }
                _ => {}
            }
        }
        self.error("unbalanced parentheses")
    }
}

/// Split on commas that aren't nested in parentheses or quotes
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_columns(cursor: &Cursor, body: &str) -> Result<Vec<ColumnDef>> {
    let mut columns = vec![];
    for part in split_top_level(body) {
        if part.trim().is_empty() {
            return cursor.error("empty column definition");
        }
        let mut column = Cursor::new(part);
        let name = column.identifier()?;
        let type_def = column.rest().trim().to_string();
        if type_def.is_empty() {
            return cursor.error(format!("column {name:?} has no type"));
        }
        columns.push(ColumnDef { name, type_def });
    }
    Ok(columns)
}

fn parse_identifier_list(cursor: &mut Cursor) -> Result<Vec<String>> {
    cursor.expect_char('(')?;
    let mut names = vec![];
    if cursor.eat_char(')') {
        return Ok(names);
    }
    loop {
        names.push(cursor.identifier()?);
        if cursor.eat_char(')') {
            return Ok(names);
        }
        cursor.expect_char(',')?;
    }
}

fn parse_with_options(cursor: &mut Cursor) -> Result<()> {
    loop {
        cursor.identifier()?;
        cursor.expect_char('=')?;
        cursor.identifier()?;
        if !cursor.eat_char(',') {
            return Ok(());
        }
    }
}

pub fn parse_create_table(ddl: &str) -> Result<TableSchema> {
    let mut cursor = Cursor::new(ddl);

    cursor.expect_keyword("CREATE")?;
    cursor.expect_keyword("TABLE")?;
    let table_name = cursor.identifier()?;

    cursor.expect_char('(')?;
    let body = cursor.balanced_group()?;
    let columns = parse_columns(&cursor, body)?;

    let designated_timestamp = if cursor.eat_keyword("timestamp") {
        cursor.expect_char('(')?;
        let column = cursor.identifier()?;
        cursor.expect_char(')')?;
        Some(column)
    } else {
        None
    };

    let partition_by = if cursor.eat_keyword("PARTITION") {
        cursor.expect_keyword("BY")?;
        let strategy = cursor.identifier()?;
        match PartitionBy::from_str(&strategy) {
            Ok(partition_by) => partition_by,
            Err(_) => return cursor.error(format!("unknown partition strategy {strategy:?}")),
        }
    } else {
        PartitionBy::None
    };

    if cursor.eat_keyword("TTL") {
        cursor.identifier()?;
        cursor.identifier()?;
    }

    let wal = if cursor.eat_keyword("BYPASS") {
        cursor.expect_keyword("WAL")?;
        false
    } else {
        cursor.eat_keyword("WAL")
    };

    if cursor.eat_keyword("WITH") {
        parse_with_options(&mut cursor)?;
    }

    if cursor.eat_keyword("IN") {
        cursor.expect_keyword("VOLUME")?;
        cursor.identifier()?;
    }

    let upsert_keys = if cursor.eat_keyword("DEDUP") {
        cursor.expect_keyword("UPSERT")?;
        cursor.expect_keyword("KEYS")?;
        let keys = parse_identifier_list(&mut cursor)?;
        if keys.is_empty() {
            return cursor.error("DEDUP clause with no UPSERT KEYS");
        }
        keys
    } else {
        vec![]
    };

    cursor.eat_char(';');
    if !cursor.at_end() {
        return cursor.error("unexpected trailing text");
    }

    Ok(TableSchema {
        table_name,
        columns,
        designated_timestamp,
        partition_by,
        wal,
        dedup_enabled: !upsert_keys.is_empty(),
        upsert_keys,
    })
}
