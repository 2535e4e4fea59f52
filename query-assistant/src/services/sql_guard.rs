//! Validation of model-generated SQL before it reaches the database.
//!
//! Generated SQL is untrusted input. The guard parses it, requires exactly one
//! statement, and only lets through the statement kinds the configured
//! [`ExecutionMode`] permits. Schema changes are never permitted.

use serde::Deserialize;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which statements generated SQL may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Queries only; the database is also opened read-only.
    #[default]
    ReadOnly,
    /// Queries plus INSERT, UPDATE and DELETE.
    ReadWrite,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::ReadOnly => "read_only",
            ExecutionMode::ReadWrite => "read_write",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "read_only" | "readonly" => Ok(ExecutionMode::ReadOnly),
            "read_write" | "readwrite" => Ok(ExecutionMode::ReadWrite),
            other => Err(format!("unknown SQL execution mode '{}'", other)),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GuardError {
    #[error("SQL is empty")]
    Empty,

    #[error("SQL could not be parsed: {0}")]
    Unparseable(String),

    #[error("expected a single statement, found {0}")]
    MultipleStatements(usize),

    #[error("{statement} statements are not permitted in {mode} mode")]
    NotPermitted {
        statement: String,
        mode: ExecutionMode,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct SqlGuard {
    mode: ExecutionMode,
}

impl SqlGuard {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Check `sql` and return it unchanged when it may be executed.
    pub fn check<'a>(&self, sql: &'a str) -> Result<&'a str, GuardError> {
        if sql.trim().trim_end_matches(';').trim().is_empty() {
            return Err(GuardError::Empty);
        }

        let statements = Parser::parse_sql(&SQLiteDialect {}, sql)
            .map_err(|e| GuardError::Unparseable(e.to_string()))?;

        let statement = match statements.as_slice() {
            [] => return Err(GuardError::Empty),
            [single] => single,
            many => return Err(GuardError::MultipleStatements(many.len())),
        };

        if self.permits(statement) {
            Ok(sql)
        } else {
            Err(GuardError::NotPermitted {
                statement: statement_keyword(statement),
                mode: self.mode,
            })
        }
    }

    fn permits(&self, statement: &Statement) -> bool {
        match (self.mode, statement) {
            (ExecutionMode::ReadOnly, Statement::Query(query)) => is_read_only(query),
            (
                ExecutionMode::ReadWrite,
                Statement::Query(_)
                | Statement::Insert { .. }
                | Statement::Update { .. }
                | Statement::Delete { .. },
            ) => true,
            _ => false,
        }
    }
}

/// A query reads only when every CTE and every branch of its body does.
/// `WITH ... INSERT` and `WITH ... UPDATE` parse as queries with a write body.
fn is_read_only(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .map_or(true, |with| with.cte_tables.iter().all(|cte| is_read_only(&cte.query)));

    ctes_read_only && is_read_only_body(&query.body)
}

fn is_read_only_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => is_read_only(query),
        SetExpr::SetOperation { left, right, .. } => {
            is_read_only_body(left) && is_read_only_body(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
        _ => false,
    }
}

fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_ascii_uppercase()
}
