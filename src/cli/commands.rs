use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::schema::ConfigOverrides;
use crate::ddl::PartitionBy;
use crate::workflow::{BackupPolicy, DedupeAction, QuerySource, RenameOptions, ReplaceOptions};

fn parse_partition_by(s: &str) -> Result<PartitionBy, String> {
    PartitionBy::from_str(s).map_err(|_| {
        format!("'{s}' is not one of NONE, YEAR, MONTH, DAY, HOUR, WEEK")
    })
}

/// Safe table replacement, rename and dedup management over the QuestDB REST API.
/// Logs go to stderr; results are printed to stdout as JSON.
#[derive(Debug, Parser)]
#[clap(name = "qdb-cli", author, version)]
pub struct Args {
    /// QuestDB server host
    #[clap(short = 'H', long)]
    pub host: Option<String>,

    /// QuestDB REST API port
    #[clap(long, value_parser)]
    pub port: Option<u16>,

    /// Username for basic authentication
    #[clap(short, long)]
    pub user: Option<String>,

    /// Password for basic authentication
    #[clap(short, long)]
    pub password: Option<String>,

    /// HTTP request timeout in seconds
    #[clap(long, value_parser)]
    pub timeout: Option<u32>,

    /// Use warning level logging
    #[clap(short = 'W', long, conflicts_with = "debug")]
    pub warning: bool,

    /// Enable debug level logging
    #[clap(short = 'D', long)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[clap(long)]
    pub json_logs: bool,

    /// Log the statements that would run instead of running them
    #[clap(short = 'R', long)]
    pub dry_run: bool,

    /// Path to a TOML or JSON config file
    #[clap(short, long, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.warning {
            "warn"
        } else {
            "info"
        }
    }

    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            timeout: self.timeout,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a table from a query and swap it in under TABLE, backing up any existing table
    #[clap(name = "create-or-replace-table-from-query", visible_alias = "cor")]
    CreateOrReplace(ReplaceArgs),

    /// Rename a table, backing up an existing table under the new name
    Rename(RenameArgs),

    /// Check, enable or disable deduplication on a table
    Dedupe(DedupeArgs),

    /// Check whether a table exists
    Chk { table: String },

    /// Print a table's CREATE TABLE statement
    Schema {
        table: String,

        /// Print the parsed schema as JSON instead of the raw DDL
        #[clap(long)]
        parsed: bool,
    },
}

#[derive(Debug, ClapArgs)]
pub struct ReplaceArgs {
    /// Table to create or replace
    pub table: String,

    /// Query defining the new table's content
    #[clap(required_unless_present = "from-table", conflicts_with = "from-table")]
    pub query: Option<String>,

    /// Copy the content of an existing table instead of running a query
    #[clap(long)]
    pub from_table: Option<String>,

    /// Designated timestamp column
    #[clap(short, long)]
    pub timestamp: Option<String>,

    /// Partitioning strategy
    #[clap(short = 'P', long = "partitionBy", value_parser = parse_partition_by)]
    pub partition_by: Option<PartitionBy>,

    /// Comma-separated UPSERT KEYS; must include the designated timestamp
    #[clap(short = 'k', long, use_value_delimiter = true, value_delimiter = ',')]
    pub upsert_keys: Vec<String>,

    /// Name for the backup of the existing table (generated if omitted)
    #[clap(short = 'B', long, conflicts_with = "no-backup-original-table")]
    pub backup_table_name: Option<String>,

    /// Drop the existing table instead of backing it up
    #[clap(long)]
    pub no_backup_original_table: bool,

    /// Per-statement timeout in milliseconds
    #[clap(long, value_parser)]
    pub statement_timeout: Option<u64>,
}

impl ReplaceArgs {
    pub fn source(&self) -> QuerySource {
        match (&self.query, &self.from_table) {
            (Some(query), _) => QuerySource::Query(query.clone()),
            (None, Some(table)) => QuerySource::Table(table.clone()),
            // clap requires one of the two
            (None, None) => QuerySource::Query(String::new()),
        }
    }

    pub fn options(&self) -> ReplaceOptions {
        let backup = if self.no_backup_original_table {
            BackupPolicy::NoBackup
        } else if let Some(name) = &self.backup_table_name {
            BackupPolicy::Named(name.clone())
        } else {
            BackupPolicy::Generated
        };

        ReplaceOptions {
            timestamp: self.timestamp.clone(),
            partition_by: self.partition_by,
            upsert_keys: self.upsert_keys.clone(),
            backup,
            statement_timeout: self.statement_timeout,
        }
    }
}

#[derive(Debug, ClapArgs)]
pub struct RenameArgs {
    pub old: String,
    pub new: String,

    /// Let the database reject the rename if NEW exists instead of backing it up
    #[clap(long)]
    pub no_backup_if_new_exists: bool,

    /// Name for the backup of an existing NEW table (generated if omitted)
    #[clap(short = 'B', long, conflicts_with = "no-backup-if-new-exists")]
    pub backup_table_name: Option<String>,

    /// Per-statement timeout in milliseconds
    #[clap(long, value_parser)]
    pub statement_timeout: Option<u64>,
}

impl RenameArgs {
    pub fn options(&self) -> RenameOptions {
        RenameOptions {
            no_backup_if_exists: self.no_backup_if_new_exists,
            backup_name: self.backup_table_name.clone(),
            statement_timeout: self.statement_timeout,
        }
    }
}

#[derive(Debug, ClapArgs)]
pub struct DedupeArgs {
    pub table: String,

    /// Enable deduplication with the given UPSERT KEYS
    #[clap(long, conflicts_with = "disable", requires = "upsert-keys")]
    pub enable: bool,

    /// Disable deduplication
    #[clap(long)]
    pub disable: bool,

    /// Comma-separated UPSERT KEYS; must include the designated timestamp
    #[clap(short = 'k', long, use_value_delimiter = true, value_delimiter = ',')]
    pub upsert_keys: Vec<String>,

    /// Per-statement timeout in milliseconds
    #[clap(long, value_parser)]
    pub statement_timeout: Option<u64>,
}

impl DedupeArgs {
    pub fn action(&self) -> DedupeAction {
        match (self.enable, self.disable) {
            (true, _) => DedupeAction::Enable,
            (_, true) => DedupeAction::Disable,
            _ => DedupeAction::Check,
        }
    }
}
