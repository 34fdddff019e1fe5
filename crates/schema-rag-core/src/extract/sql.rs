//! SQL statement classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Statement kind of a SQL segment, decided by its first keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Other,
}

impl SqlKind {
    /// Classify `sql` by its first keyword, case-insensitively.
    ///
    /// Leading whitespace and SQL comments (`-- …` and `/* … */`) are
    /// skipped. Anything outside the known set is [`SqlKind::Other`].
    pub fn classify(sql: &str) -> Self {
        let keyword: String = skip_trivia(sql)
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();

        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" => SqlKind::Select,
            "INSERT" => SqlKind::Insert,
            "UPDATE" => SqlKind::Update,
            "DELETE" => SqlKind::Delete,
            "CREATE" => SqlKind::Create,
            "ALTER" => SqlKind::Alter,
            "DROP" => SqlKind::Drop,
            _ => SqlKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SqlKind::Select => "SELECT",
            SqlKind::Insert => "INSERT",
            SqlKind::Update => "UPDATE",
            SqlKind::Delete => "DELETE",
            SqlKind::Create => "CREATE",
            SqlKind::Alter => "ALTER",
            SqlKind::Drop => "DROP",
            SqlKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for SqlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn skip_trivia(mut s: &str) -> &str {
    loop {
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            s = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
        } else if let Some(rest) = s.strip_prefix("/*") {
            s = rest.split_once("*/").map(|(_, r)| r).unwrap_or("");
        } else {
            return s;
        }
    }
}
