//! Scratch table names. Uniqueness is statistical (a v4 UUID per name), so callers
//! that need certainty still have to probe the database.

use uuid::Uuid;

pub const TEMP_PREFIX: &str = "__qdb_cli_temp_";
pub const BACKUP_PREFIX: &str = "qdb_cli_backup_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    Temp,
    Backup,
}

impl ScratchKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Temp => TEMP_PREFIX,
            Self::Backup => BACKUP_PREFIX,
        }
    }
}

pub fn new_scratch_name(kind: ScratchKind, base_name: &str) -> String {
    format!("{}{}_{}", kind.prefix(), base_name, Uuid::new_v4())
}

pub fn is_scratch_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) || name.starts_with(BACKUP_PREFIX)
}
