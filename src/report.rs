use std::fmt::Write;
use std::str::FromStr;

use serde::Serialize;

use crate::error::EditError;
use crate::models::{AttendanceCode, StudentStats, WideRecord};
use crate::reshape::WideTable;
use crate::totals;

pub const FIXED_COLUMNS: [&str; 4] = ["RollNo", "StudentName", "TotalPresent", "TotalAbsent"];

/// Final projection: fixed leading columns followed by one column per date.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub date_labels: Vec<String>,
    pub records: Vec<WideRecord>,
}

/// One output cell. Counts stay numeric so writers can emit them as numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    Text(String),
    Count(usize),
}

impl std::fmt::Display for ReportValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportValue::Text(value) => f.write_str(value),
            ReportValue::Count(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    columns: Vec<&'a str>,
    rows: Vec<Vec<ReportValue>>,
}

/// Moves the reshaped matrix into report form. Records and date labels are
/// taken as-is; the canonical column order comes from [`Report::columns`].
pub fn assemble(wide: WideTable) -> Report {
    Report {
        date_labels: wide.date_labels,
        records: wide.records,
    }
}

impl Report {
    pub fn columns(&self) -> Vec<&str> {
        FIXED_COLUMNS
            .iter()
            .copied()
            .chain(self.date_labels.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> Vec<Vec<ReportValue>> {
        self.records
            .iter()
            .map(|record| {
                let mut row = vec![
                    ReportValue::Text(record.roll.clone()),
                    ReportValue::Text(record.name.clone()),
                    ReportValue::Count(record.total_present),
                    ReportValue::Count(record.total_absent),
                ];
                row.extend(
                    record
                        .attendance
                        .iter()
                        .map(|code| ReportValue::Text(code.as_str().to_string())),
                );
                row
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ReportDocument {
            columns: self.columns(),
            rows: self.rows(),
        })
    }

    /// Replaces one attendance cell and recomputes every student's totals.
    pub fn set_cell(
        &mut self,
        roll: &str,
        date_label: &str,
        code: AttendanceCode,
    ) -> Result<(), EditError> {
        let column = self
            .date_labels
            .iter()
            .position(|label| label == date_label)
            .ok_or_else(|| EditError::UnknownDate(date_label.to_string()))?;
        let record = self
            .records
            .iter_mut()
            .find(|record| record.roll == roll)
            .ok_or_else(|| EditError::UnknownStudent(roll.to_string()))?;

        record.attendance[column] = code;
        totals::recompute_all(&mut self.records);
        Ok(())
    }

    pub fn apply(&mut self, edit: &CellEdit) -> Result<(), EditError> {
        self.set_cell(&edit.roll, &edit.date_label, edit.code.clone())
    }

    /// Distinct status tokens that did not map onto a canonical code.
    pub fn unrecognized(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for code in self.records.iter().flat_map(|record| record.attendance.iter()) {
            if let AttendanceCode::Other(token) = code {
                if !tokens.contains(token) {
                    tokens.push(token.clone());
                }
            }
        }
        tokens
    }

    pub fn student_stats(&self) -> Vec<StudentStats> {
        self.records.iter().map(totals::student_stats).collect()
    }
}

/// A manual correction in `ROLL@DATE=CODE` form.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEdit {
    pub roll: String,
    pub date_label: String,
    pub code: AttendanceCode,
}

impl FromStr for CellEdit {
    type Err = EditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (roll, rest) = value
            .split_once('@')
            .ok_or_else(|| EditError::Malformed(value.to_string()))?;
        let (date_label, code) = rest
            .rsplit_once('=')
            .ok_or_else(|| EditError::Malformed(value.to_string()))?;
        let code = AttendanceCode::from_code(code)
            .ok_or_else(|| EditError::InvalidCode(code.to_string()))?;

        Ok(Self {
            roll: roll.trim().to_string(),
            date_label: date_label.trim().to_string(),
            code,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTotals {
    pub students: usize,
    pub present: usize,
    pub absent: usize,
    pub date_columns: usize,
}

pub fn summarize(report: &Report) -> ReportTotals {
    ReportTotals {
        students: report.records.len(),
        present: report.records.iter().map(|record| record.total_present).sum(),
        absent: report.records.iter().map(|record| record.total_absent).sum(),
        date_columns: report.date_labels.len(),
    }
}

pub fn build_summary(source: &str, report: &Report) -> String {
    let totals = summarize(report);
    let stats = report.student_stats();

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report Summary");
    let _ = writeln!(output, "Generated from {source}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Report Statistics");
    let _ = writeln!(output, "- Total students: {}", totals.students);
    let _ = writeln!(output, "- Total present: {}", totals.present);
    let _ = writeln!(output, "- Total absent (incl. no data): {}", totals.absent);
    let _ = writeln!(output, "- Date columns: {}", totals.date_columns);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Student Statistics");

    if stats.is_empty() {
        let _ = writeln!(output, "No students found in this sheet.");
    } else {
        let _ = writeln!(
            output,
            "| Roll No | Student Name | Present Days | Absent Days | Total Days | Attendance % |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for student in stats.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {:.2} |",
                student.roll,
                student.name,
                student.present,
                student.absent,
                student.total_days,
                student.attendance_pct
            );
        }
    }

    let unrecognized = report.unrecognized();
    if !unrecognized.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Unrecognized Status Values");
        for token in unrecognized.iter() {
            let _ = writeln!(output, "- {token}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttendanceCode::*;

    fn sample_record(roll: &str, name: &str, attendance: Vec<AttendanceCode>) -> WideRecord {
        totals::recompute(WideRecord {
            roll: roll.to_string(),
            name: name.to_string(),
            total_present: 0,
            total_absent: 0,
            attendance,
        })
    }

    fn sample_report() -> Report {
        assemble(WideTable {
            date_labels: vec!["2025-01-01".to_string(), "2025-01-02".to_string()],
            records: vec![
                sample_record("1", "John Doe", vec![Present, Absent]),
                sample_record("2", "Jane Smith", vec![Present, Present]),
            ],
        })
    }

    #[test]
    fn columns_follow_canonical_order() {
        assert_eq!(
            sample_report().columns(),
            vec!["RollNo", "StudentName", "TotalPresent", "TotalAbsent", "2025-01-01", "2025-01-02"]
        );
    }

    #[test]
    fn rows_carry_totals_then_codes() {
        let rows = sample_report().rows();
        assert_eq!(
            rows[0],
            vec![
                ReportValue::Text("1".to_string()),
                ReportValue::Text("John Doe".to_string()),
                ReportValue::Count(1),
                ReportValue::Count(1),
                ReportValue::Text("P".to_string()),
                ReportValue::Text("A".to_string()),
            ]
        );
    }

    #[test]
    fn editing_a_cell_only_moves_that_students_totals() {
        let mut report = sample_report();
        report.set_cell("2", "2025-01-02", Absent).unwrap();

        let jane = &report.records[1];
        assert_eq!((jane.total_present, jane.total_absent), (1, 1));
        let john = &report.records[0];
        assert_eq!((john.total_present, john.total_absent), (1, 1));
    }

    #[test]
    fn edits_reject_unknown_targets() {
        let mut report = sample_report();
        assert_eq!(
            report.set_cell("9", "2025-01-01", Present),
            Err(EditError::UnknownStudent("9".to_string()))
        );
        assert_eq!(
            report.set_cell("1", "2025-02-01", Present),
            Err(EditError::UnknownDate("2025-02-01".to_string()))
        );
    }

    #[test]
    fn parses_cell_edits() {
        let edit: CellEdit = "12@2025-01-02=a".parse().unwrap();
        assert_eq!(edit.roll, "12");
        assert_eq!(edit.date_label, "2025-01-02");
        assert_eq!(edit.code, Absent);

        assert_eq!(
            "12@2025-01-02=late".parse::<CellEdit>(),
            Err(EditError::InvalidCode("late".to_string()))
        );
        assert!(matches!(
            "12=P".parse::<CellEdit>(),
            Err(EditError::Malformed(_))
        ));
    }

    #[test]
    fn summary_lists_percentages() {
        let summary = build_summary("sheet.csv", &sample_report());
        assert!(summary.contains("- Total present: 3"));
        assert!(summary.contains("| 1 | John Doe | 1 | 1 | 2 | 50.00 |"));
        assert!(summary.contains("| 2 | Jane Smith | 2 | 0 | 2 | 100.00 |"));
        assert!(!summary.contains("Unrecognized"));
    }

    #[test]
    fn json_keeps_column_order() {
        let json = sample_report().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["columns"][4], "2025-01-01");
        assert_eq!(value["rows"][1][2], 2);
        assert_eq!(value["rows"][1][5], "P");
    }
}
