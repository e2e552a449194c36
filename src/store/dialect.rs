//! SQL dialect strategy.
//!
//! The only dialect-specific concern at this layer is placeholder syntax;
//! everything else is plain ANSI INSERT/SELECT text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// PostgreSQL: `$1`, `$2`, ...
    Postgres,
    /// SQLite: `?` positional placeholders.
    Sqlite,
}

impl SqlDialect {
    /// Infer the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> StoreResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(StoreError::UnknownDialect(url.to_string())),
        }
    }

    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite => "?".to_string(),
        }
    }

    /// Comma-joined placeholder list for `count` parameters.
    pub fn placeholders(&self, count: usize) -> String {
        (1..=count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_syntax() {
        assert_eq!(SqlDialect::Postgres.placeholder(3), "$3");
        assert_eq!(SqlDialect::Sqlite.placeholder(3), "?");
    }

    #[test]
    fn test_placeholder_lists() {
        assert_eq!(SqlDialect::Postgres.placeholders(3), "$1, $2, $3");
        assert_eq!(SqlDialect::Sqlite.placeholders(2), "?, ?");
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            SqlDialect::from_url("postgres://u:p@localhost/db").unwrap(),
            SqlDialect::Postgres
        );
        assert_eq!(
            SqlDialect::from_url("postgresql://localhost/db").unwrap(),
            SqlDialect::Postgres
        );
        assert_eq!(
            SqlDialect::from_url("sqlite::memory:").unwrap(),
            SqlDialect::Sqlite
        );
        assert!(matches!(
            SqlDialect::from_url("mysql://localhost/db"),
            Err(StoreError::UnknownDialect(_))
        ));
    }
}
