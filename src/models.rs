use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::LoadError;

/// A single scalar cell as handed over by the tabular loader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Cell {
    /// Empty cells and whitespace-only text are both treated as missing.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(value) => write!(f, "{}", value.trim()),
            Cell::Number(value) => {
                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::Date(value) => {
                if value.time() == NaiveTime::MIN {
                    write!(f, "{}", value.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn non_empty(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| !cell.is_empty())
    }
}

/// Column-major table produced by the loader. Never mutated after load.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    columns: Vec<Column>,
    rows: usize,
}

impl RawTable {
    /// Builds a table from a header row and row-major cells. Short rows are
    /// padded with empty cells, surplus cells are dropped.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, LoadError> {
        if headers.is_empty() {
            return Err(LoadError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(LoadError::DuplicateColumn(header.clone()));
            }
        }

        let row_count = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                cells: Vec::with_capacity(row_count),
            })
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.cells.push(cells.next().unwrap_or(Cell::Empty));
            }
        }

        Ok(Self {
            columns,
            rows: row_count,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColumnRole {
    Name,
    Roll,
    Date,
    Status,
    Time,
    Unclassified,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnRole::Name => "name",
            ColumnRole::Roll => "roll",
            ColumnRole::Date => "date",
            ColumnRole::Status => "status",
            ColumnRole::Time => "time",
            ColumnRole::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}

/// Column name per role. Each role is held by at most one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub name: Option<String>,
    pub roll: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub time: Option<String>,
}

impl RoleAssignment {
    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        match role {
            ColumnRole::Name => self.name.as_deref(),
            ColumnRole::Roll => self.roll.as_deref(),
            ColumnRole::Date => self.date.as_deref(),
            ColumnRole::Status => self.status.as_deref(),
            ColumnRole::Time => self.time.as_deref(),
            ColumnRole::Unclassified => None,
        }
    }

    fn slot(&mut self, role: ColumnRole) -> Option<&mut Option<String>> {
        match role {
            ColumnRole::Name => Some(&mut self.name),
            ColumnRole::Roll => Some(&mut self.roll),
            ColumnRole::Date => Some(&mut self.date),
            ColumnRole::Status => Some(&mut self.status),
            ColumnRole::Time => Some(&mut self.time),
            ColumnRole::Unclassified => None,
        }
    }

    /// Assigns `column` to `role`, releasing any other role the column held.
    pub fn set(&mut self, role: ColumnRole, column: &str) {
        for other in ColumnRole::ASSIGNABLE {
            if other != role && self.get(other) == Some(column) {
                if let Some(slot) = self.slot(other) {
                    *slot = None;
                }
            }
        }
        if let Some(slot) = self.slot(role) {
            *slot = Some(column.to_string());
        }
    }

    pub fn is_set(&self, role: ColumnRole) -> bool {
        self.get(role).is_some()
    }

    pub fn role_of(&self, column: &str) -> ColumnRole {
        ColumnRole::ASSIGNABLE
            .into_iter()
            .find(|role| self.get(*role) == Some(column))
            .unwrap_or(ColumnRole::Unclassified)
    }

    pub fn is_claimed(&self, column: &str) -> bool {
        self.role_of(column) != ColumnRole::Unclassified
    }

    /// Applies every role set in `overrides` on top of this assignment.
    pub fn merge(&mut self, overrides: &RoleAssignment) {
        for role in ColumnRole::ASSIGNABLE {
            if let Some(column) = overrides.get(role) {
                self.set(role, column);
            }
        }
    }
}

impl ColumnRole {
    pub const ASSIGNABLE: [ColumnRole; 5] = [
        ColumnRole::Name,
        ColumnRole::Roll,
        ColumnRole::Date,
        ColumnRole::Status,
        ColumnRole::Time,
    ];
}

/// Layout of the incoming sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shape {
    /// One row per attendance event (student, date, status).
    Long,
    /// One row per student with a column per date.
    Wide,
}

impl Shape {
    pub fn mandatory_roles(self) -> &'static [ColumnRole] {
        match self {
            Shape::Long => &[ColumnRole::Name, ColumnRole::Date, ColumnRole::Status],
            Shape::Wide => &[ColumnRole::Name],
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Long => f.write_str("long"),
            Shape::Wide => f.write_str("wide"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttendanceCode {
    Present,
    Absent,
    Incomplete,
    NoData,
    /// Unrecognised token kept verbatim so it stays visible in the output.
    Other(String),
}

impl AttendanceCode {
    pub fn as_str(&self) -> &str {
        match self {
            AttendanceCode::Present => "P",
            AttendanceCode::Absent => "A",
            AttendanceCode::Incomplete => "I",
            AttendanceCode::NoData => "-",
            AttendanceCode::Other(token) => token,
        }
    }

    /// Parses one of the four canonical codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "P" => Some(AttendanceCode::Present),
            "A" => Some(AttendanceCode::Absent),
            "I" => Some(AttendanceCode::Incomplete),
            "-" => Some(AttendanceCode::NoData),
            _ => None,
        }
    }
}

impl fmt::Display for AttendanceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the wide matrix. `attendance` is aligned with the report's
/// date labels.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRecord {
    pub roll: String,
    pub name: String,
    pub total_present: usize,
    pub total_absent: usize,
    pub attendance: Vec<AttendanceCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentStats {
    pub roll: String,
    pub name: String,
    pub present: usize,
    pub absent: usize,
    pub total_days: usize,
    pub attendance_pct: f64,
}
