use std::collections::{HashMap, HashSet};

use crate::dates::{self, DateLabel};
use crate::error::{ConvertError, IncompleteAssignment};
use crate::models::{AttendanceCode, Column, ColumnRole, RawTable, RoleAssignment, WideRecord};
use crate::status::StatusNormalizer;
use crate::totals;

/// Students × dates matrix. Every record carries one cell per label, in
/// label order.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub date_labels: Vec<String>,
    pub records: Vec<WideRecord>,
}

/// Looks up the column assigned to `role`.
pub fn role_column<'a>(
    table: &'a RawTable,
    roles: &RoleAssignment,
    role: ColumnRole,
) -> Result<Option<&'a Column>, ConvertError> {
    match roles.get(role) {
        None => Ok(None),
        Some(name) => table
            .column(name)
            .map(Some)
            .ok_or_else(|| ConvertError::UnknownColumn {
                role,
                column: name.to_string(),
            }),
    }
}

fn required_column<'a>(
    table: &'a RawTable,
    roles: &RoleAssignment,
    role: ColumnRole,
) -> Result<&'a Column, ConvertError> {
    role_column(table, roles, role)?.ok_or_else(|| {
        ConvertError::IncompleteRoles(IncompleteAssignment {
            missing: vec![role],
        })
    })
}

#[derive(Debug)]
struct StudentEntry {
    roll: Option<String>,
    name: String,
    cells: HashMap<String, AttendanceCode>,
}

/// Pivots one-row-per-event records into one row per student.
///
/// Students keep the order in which they first appear. When the same
/// student has several rows for one date, the first row wins.
pub fn reshape_long(
    table: &RawTable,
    roles: &RoleAssignment,
    normalizer: StatusNormalizer,
    display_format: &str,
) -> Result<WideTable, ConvertError> {
    let name_col = required_column(table, roles, ColumnRole::Name)?;
    let date_col = required_column(table, roles, ColumnRole::Date)?;
    let status_col = required_column(table, roles, ColumnRole::Status)?;
    let roll_col = role_column(table, roles, ColumnRole::Roll)?;

    let mut students: Vec<StudentEntry> = Vec::new();
    let mut index: HashMap<(Option<String>, String), usize> = HashMap::new();
    let mut labels: Vec<DateLabel> = Vec::new();
    let mut seen_labels: HashSet<String> = HashSet::new();
    let mut duplicates = 0usize;

    for row in 0..table.row_count() {
        let name = name_col.cells[row].text();
        if name.is_empty() {
            tracing::debug!(row, "skipping row without a student name");
            continue;
        }

        let label = DateLabel::from_cell(&date_col.cells[row], display_format);
        if label.label.is_empty() {
            tracing::debug!(row, "skipping row without a date");
            continue;
        }
        if seen_labels.insert(label.label.clone()) {
            labels.push(label.clone());
        }

        let roll = roll_col.map(|column| column.cells[row].text());
        let key = (roll.clone(), name.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            students.push(StudentEntry {
                roll,
                name,
                cells: HashMap::new(),
            });
            students.len() - 1
        });

        let code = normalizer.normalize(&status_col.cells[row]);
        let cells = &mut students[slot].cells;
        if cells.contains_key(&label.label) {
            duplicates += 1;
        } else {
            cells.insert(label.label, code);
        }
    }

    if duplicates > 0 {
        tracing::debug!(duplicates, "kept first status for repeated student/date pairs");
    }

    let date_labels = dates::order_labels(labels);
    let mut records: Vec<WideRecord> = students
        .into_iter()
        .enumerate()
        .map(|(position, mut student)| WideRecord {
            roll: student
                .roll
                .unwrap_or_else(|| (position + 1).to_string()),
            name: student.name,
            total_present: 0,
            total_absent: 0,
            attendance: date_labels
                .iter()
                .map(|label| {
                    student
                        .cells
                        .remove(label)
                        .unwrap_or(AttendanceCode::NoData)
                })
                .collect(),
        })
        .collect();

    totals::recompute_all(&mut records);
    Ok(WideTable {
        date_labels,
        records,
    })
}

/// Builds the matrix from a sheet that already has one column per date.
pub fn reshape_wide(
    table: &RawTable,
    roles: &RoleAssignment,
    date_columns: &[String],
) -> Result<WideTable, ConvertError> {
    let name_col = required_column(table, roles, ColumnRole::Name)?;
    let roll_col = role_column(table, roles, ColumnRole::Roll)?;
    let date_cols: Vec<&Column> = date_columns
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    let normalizer = StatusNormalizer::default();

    let mut records = Vec::new();
    for row in 0..table.row_count() {
        let name = name_col.cells[row].text();
        if name.is_empty() {
            tracing::debug!(row, "skipping row without a student name");
            continue;
        }

        let roll = match roll_col {
            Some(column) => column.cells[row].text(),
            None => (records.len() + 1).to_string(),
        };

        records.push(WideRecord {
            roll,
            name,
            total_present: 0,
            total_absent: 0,
            attendance: date_cols
                .iter()
                .map(|column| normalizer.normalize(&column.cells[row]))
                .collect(),
        });
    }

    totals::recompute_all(&mut records);
    Ok(WideTable {
        date_labels: date_cols.iter().map(|column| column.name.clone()).collect(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DEFAULT_DISPLAY_FORMAT;
    use crate::models::Cell;
    use AttendanceCode::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|value| Cell::from(*value)).collect())
                .collect(),
        )
        .unwrap()
    }

    fn long_roles(roll: bool) -> RoleAssignment {
        RoleAssignment {
            name: Some("Name".to_string()),
            roll: roll.then(|| "Roll".to_string()),
            date: Some("Date".to_string()),
            status: Some("Status".to_string()),
            time: None,
        }
    }

    #[test]
    fn first_status_wins_for_repeated_rows() {
        let input = table(
            &["Roll", "Name", "Date", "Status"],
            &[
                &["1", "John", "2025-01-01", "P"],
                &["1", "John", "2025-01-01", "A"],
            ],
        );
        let wide = reshape_long(
            &input,
            &long_roles(true),
            StatusNormalizer::default(),
            DEFAULT_DISPLAY_FORMAT,
        )
        .unwrap();
        assert_eq!(wide.records.len(), 1);
        assert_eq!(wide.records[0].attendance, vec![Present]);
    }

    #[test]
    fn missing_pairs_become_no_data() {
        let input = table(
            &["Name", "Date", "Status"],
            &[
                &["John", "2025-01-01", "P"],
                &["Jane", "2025-01-01", "P"],
                &["Jane", "2025-01-02", "P"],
            ],
        );
        let wide = reshape_long(
            &input,
            &long_roles(false),
            StatusNormalizer::default(),
            DEFAULT_DISPLAY_FORMAT,
        )
        .unwrap();
        assert_eq!(wide.date_labels, vec!["2025-01-01", "2025-01-02"]);
        let john = &wide.records[0];
        assert_eq!(john.attendance, vec![Present, NoData]);
        assert_eq!(john.total_absent, 1);
        assert!(wide
            .records
            .iter()
            .all(|record| record.attendance.len() == wide.date_labels.len()));
    }

    #[test]
    fn rolls_are_synthesised_in_first_appearance_order() {
        let input = table(
            &["Name", "Date", "Status"],
            &[
                &["Zed", "2025-01-01", "P"],
                &["Amy", "2025-01-01", "A"],
                &["Zed", "2025-01-02", "P"],
            ],
        );
        let wide = reshape_long(
            &input,
            &long_roles(false),
            StatusNormalizer::default(),
            DEFAULT_DISPLAY_FORMAT,
        )
        .unwrap();
        let keys: Vec<(&str, &str)> = wide
            .records
            .iter()
            .map(|record| (record.roll.as_str(), record.name.as_str()))
            .collect();
        assert_eq!(keys, vec![("1", "Zed"), ("2", "Amy")]);
    }

    #[test]
    fn dates_are_ordered_and_relabelled() {
        let input = table(
            &["Name", "Date", "Status"],
            &[
                &["John", "01/03/2025", "P"],
                &["John", "Orientation", "P"],
                &["John", "01/02/2025", "A"],
            ],
        );
        let wide = reshape_long(
            &input,
            &long_roles(false),
            StatusNormalizer::default(),
            DEFAULT_DISPLAY_FORMAT,
        )
        .unwrap();
        assert_eq!(
            wide.date_labels,
            vec!["2025-01-02", "2025-01-03", "Orientation"]
        );
        assert_eq!(wide.records[0].attendance, vec![Absent, Present, Present]);
    }

    #[test]
    fn same_name_with_different_rolls_are_different_students() {
        let input = table(
            &["Roll", "Name", "Date", "Status"],
            &[
                &["7", "Sam", "2025-01-01", "P"],
                &["8", "Sam", "2025-01-01", "A"],
            ],
        );
        let wide = reshape_long(
            &input,
            &long_roles(true),
            StatusNormalizer::default(),
            DEFAULT_DISPLAY_FORMAT,
        )
        .unwrap();
        assert_eq!(wide.records.len(), 2);
        assert_eq!(wide.records[1].roll, "8");
    }

    #[test]
    fn missing_status_role_is_reported() {
        let input = table(&["Name", "Date"], &[]);
        let roles = RoleAssignment {
            status: None,
            ..long_roles(false)
        };
        let err = reshape_long(&input, &roles, StatusNormalizer::default(), DEFAULT_DISPLAY_FORMAT)
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::IncompleteRoles(IncompleteAssignment { missing })
                if missing == vec![ColumnRole::Status]
        ));
    }

    #[test]
    fn wide_sheets_are_normalised_cell_by_cell() {
        let input = table(
            &["Name", "01/06/2025", "01/07/2025"],
            &[
                &["Avery", "present", ""],
                &["Jules", "I", "a"],
            ],
        );
        let roles = RoleAssignment {
            name: Some("Name".to_string()),
            ..RoleAssignment::default()
        };
        let wide = reshape_wide(
            &input,
            &roles,
            &["01/06/2025".to_string(), "01/07/2025".to_string()],
        )
        .unwrap();
        assert_eq!(wide.date_labels, vec!["01/06/2025", "01/07/2025"]);
        assert_eq!(wide.records[0].roll, "1");
        assert_eq!(wide.records[0].attendance, vec![Present, NoData]);
        assert_eq!(wide.records[1].attendance, vec![Incomplete, Absent]);
        assert_eq!(wide.records[1].total_absent, 1);
    }
}
