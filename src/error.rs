use std::path::PathBuf;

use thiserror::Error;

use crate::models::ColumnRole;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("unreadable workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook has no sheet named {0:?}")]
    MissingSheet(String),
    #[error("unsupported file type {0:?}; expected .csv, .xlsx, .xlsm, .xls, .xlsb or .ods")]
    UnsupportedFormat(String),
    #[error("table has no header row")]
    Empty,
    #[error("column {0:?} appears more than once")]
    DuplicateColumn(String),
}

/// Mandatory roles that neither detection nor overrides could fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteAssignment {
    pub missing: Vec<ColumnRole>,
}

impl std::fmt::Display for IncompleteAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.missing.iter().map(|role| role.to_string()).collect();
        write!(f, "could not resolve column for {}", names.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{0}; pass the column explicitly (e.g. --name-col/--date-col/--status-col)")]
    IncompleteRoles(IncompleteAssignment),
    #[error("override names column {column:?} for {role}, but the table has no such column")]
    UnknownColumn { role: ColumnRole, column: String },
    #[error("unrecognized status values in report: {}", .0.join(", "))]
    UnrecognizedStatus(Vec<String>),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("failed to read column selection: {0}")]
    Prompt(#[source] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("no student with roll number {0:?}")]
    UnknownStudent(String),
    #[error("no date column {0:?} in report")]
    UnknownDate(String),
    #[error("invalid attendance code {0:?}; expected P, A, I or -")]
    InvalidCode(String),
    #[error("malformed edit {0:?}; expected ROLL@DATE=CODE")]
    Malformed(String),
}
