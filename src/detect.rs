use std::collections::HashSet;

use serde::Serialize;

use crate::dates;
use crate::error::IncompleteAssignment;
use crate::models::{Cell, Column, ColumnRole, RawTable, RoleAssignment, Shape};
use crate::status;

const STATUS_TOKENS: [&str; 6] = ["P", "A", "PRESENT", "ABSENT", "1", "0"];
const STATUS_SAMPLE: usize = 10;

/// A header-name heuristic. Rules are tried in declaration order and the
/// first one that accepts a column (and whose role is still free) wins.
struct HeaderRule {
    role: ColumnRole,
    matches: fn(&str) -> bool,
}

/// A cell-content heuristic used for roles the headers did not settle.
struct ContentRule {
    role: ColumnRole,
    min_columns: usize,
    matches: fn(&Column) -> bool,
}

const HEADER_RULES: &[HeaderRule] = &[
    HeaderRule {
        role: ColumnRole::Name,
        matches: header_is_name,
    },
    HeaderRule {
        role: ColumnRole::Roll,
        matches: header_is_roll,
    },
    HeaderRule {
        role: ColumnRole::Time,
        matches: header_is_time,
    },
    HeaderRule {
        role: ColumnRole::Date,
        matches: header_is_date,
    },
    HeaderRule {
        role: ColumnRole::Status,
        matches: header_is_status,
    },
];

fn header_is_name(header: &str) -> bool {
    header.contains("name")
}

fn header_is_roll(header: &str) -> bool {
    header.contains("roll")
}

fn header_is_time(header: &str) -> bool {
    header.contains("time") && !header.contains("date")
}

fn header_is_date(header: &str) -> bool {
    header.contains("date") || header.contains("time") || dates::looks_like_date_header(header)
}

fn header_is_status(header: &str) -> bool {
    ["status", "present", "absent", "attendance"]
        .iter()
        .any(|keyword| header.contains(keyword))
}

const CONTENT_RULES: &[ContentRule] = &[
    ContentRule {
        role: ColumnRole::Name,
        min_columns: 2,
        matches: is_text_column,
    },
    ContentRule {
        role: ColumnRole::Date,
        min_columns: 1,
        matches: starts_with_date,
    },
    ContentRule {
        role: ColumnRole::Status,
        min_columns: 1,
        matches: has_status_tokens,
    },
];

fn is_text_column(column: &Column) -> bool {
    column.non_empty().any(|cell| match cell {
        Cell::Text(value) => !status::is_numeric_shaped(value),
        _ => false,
    })
}

fn starts_with_date(column: &Column) -> bool {
    column
        .non_empty()
        .next()
        .and_then(dates::parse_date)
        .is_some()
}

fn has_status_tokens(column: &Column) -> bool {
    let mut seen = HashSet::new();
    column
        .cells
        .iter()
        .map(|cell| cell.text().trim().to_uppercase())
        .filter(|value| seen.insert(value.clone()))
        .take(STATUS_SAMPLE)
        .any(|value| STATUS_TOKENS.contains(&value.as_str()))
}

/// Outcome of role detection. Never an error: missing mandatory roles are
/// reported through [`Detection::require`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub roles: RoleAssignment,
    pub numeric_status: bool,
}

impl Detection {
    pub fn missing(&self, shape: Shape) -> Vec<ColumnRole> {
        shape
            .mandatory_roles()
            .iter()
            .copied()
            .filter(|role| !self.roles.is_set(*role))
            .collect()
    }

    pub fn require(&self, shape: Shape) -> Result<(), IncompleteAssignment> {
        let missing = self.missing(shape);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IncompleteAssignment { missing })
        }
    }

    /// Applies manual overrides after detection and refreshes the
    /// numeric-status flag for the (possibly new) status column.
    pub fn with_overrides(mut self, table: &RawTable, overrides: &RoleAssignment) -> Self {
        self.roles.merge(overrides);
        self.numeric_status = numeric_status(table, &self.roles);
        self
    }
}

/// Classifies the columns of `table`. Roles given in `overrides` are taken
/// as-is and their columns are not considered for any other role.
pub fn detect(table: &RawTable, overrides: &RoleAssignment) -> Detection {
    let mut roles = overrides.clone();

    for column in table.columns() {
        if roles.is_claimed(&column.name) {
            continue;
        }
        let header = column.name.to_lowercase();
        if let Some(rule) = HEADER_RULES
            .iter()
            .find(|rule| !roles.is_set(rule.role) && (rule.matches)(&header))
        {
            roles.set(rule.role, &column.name);
        }
    }

    for rule in CONTENT_RULES {
        if roles.is_set(rule.role) || table.columns().len() < rule.min_columns {
            continue;
        }
        if let Some(column) = table
            .columns()
            .iter()
            .find(|column| !roles.is_claimed(&column.name) && (rule.matches)(column))
        {
            tracing::debug!(column = %column.name, role = %rule.role, "role inferred from content");
            roles.set(rule.role, &column.name);
        }
    }

    if !roles.is_set(ColumnRole::Date) && !overrides.is_set(ColumnRole::Time) {
        if let Some(column) = roles
            .time
            .as_deref()
            .and_then(|name| table.column(name))
            .filter(|column| starts_with_date(column))
        {
            tracing::debug!(column = %column.name, "time column holds dates; using it as date");
            roles.set(ColumnRole::Date, &column.name);
        }
    }

    let numeric_status = numeric_status(table, &roles);
    Detection {
        roles,
        numeric_status,
    }
}

fn numeric_status(table: &RawTable, roles: &RoleAssignment) -> bool {
    roles
        .status
        .as_deref()
        .and_then(|name| table.column(name))
        .map(status::is_numeric_status)
        .unwrap_or(false)
}
