use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::{Cell, ColumnRole, RawTable, RoleAssignment};

static DATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,4}[/.\-]\d{1,2}[/.\-]\d{1,4}").expect("date pattern compiles")
});
static YEAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year pattern compiles"));
static LEADING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\D").expect("leading year pattern compiles"));
static FULL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("full year pattern compiles"));

/// Month-first before day-first, matching how ambiguous US-style sheets are
/// usually exported.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

pub const DEFAULT_DISPLAY_FORMAT: &str = "%Y-%m-%d";

/// chrono's `%Y` also accepts one or two digits, so `%Y` layouts are only
/// tried when the value has four year digits where the layout expects them.
fn year_fits(format: &str, value: &str) -> bool {
    if format.starts_with("%Y") {
        LEADING_YEAR.is_match(value)
    } else if format.contains("%Y") {
        FULL_YEAR.is_match(value)
    } else {
        true
    }
}

pub fn parse_date_str(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .filter(|format| year_fits(format, value))
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|datetime| datetime.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .filter(|format| year_fits(format, value))
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        })
}

pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(datetime) => Some(datetime.date()),
        Cell::Text(value) => parse_date_str(value),
        _ => None,
    }
}

/// Canonical label for a date cell plus the parsed date used for ordering.
/// Unparseable values keep their own text as the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLabel {
    pub label: String,
    pub date: Option<NaiveDate>,
}

impl DateLabel {
    pub fn from_cell(cell: &Cell, display_format: &str) -> Self {
        match parse_date(cell) {
            Some(date) => Self {
                label: date.format(display_format).to_string(),
                date: Some(date),
            },
            None => {
                let label = cell.text();
                tracing::debug!(value = %label, "date did not parse; keeping raw label");
                Self { label, date: None }
            }
        }
    }
}

/// Orders labels: parsed dates ascending, then unparsed labels in the order
/// they were first seen.
pub fn order_labels(labels: Vec<DateLabel>) -> Vec<String> {
    let (mut parsed, unparsed): (Vec<DateLabel>, Vec<DateLabel>) =
        labels.into_iter().partition(|label| label.date.is_some());
    parsed.sort_by_key(|label| label.date);
    parsed
        .into_iter()
        .chain(unparsed)
        .map(|label| label.label)
        .collect()
}

/// True for headers such as `2025-01-01`, `01/02`, or `Week 3 2025`.
pub fn looks_like_date_header(header: &str) -> bool {
    parse_date_str(header).is_some()
        || DATE_SHAPE.is_match(header)
        || YEAR_TOKEN.is_match(header)
        || header.contains('/')
        || header.contains('-')
}

fn is_totals_header(header: &str) -> bool {
    let lower = header.trim().to_lowercase();
    lower == "present" || lower == "absent" || lower.starts_with("total")
}

/// Finds the per-date attendance columns of a sheet that is already wide.
/// Columns holding the name, roll, status or time role never count.
pub fn collect_date_columns(table: &RawTable, roles: &RoleAssignment) -> Vec<String> {
    table
        .column_names()
        .filter(|name| {
            matches!(
                roles.role_of(name),
                ColumnRole::Date | ColumnRole::Unclassified
            )
        })
        .filter(|name| !is_totals_header(name))
        .filter(|name| looks_like_date_header(name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 2);
        assert_eq!(parse_date_str("2025-01-02"), expected);
        assert_eq!(parse_date_str("01/02/2025"), expected);
        assert_eq!(parse_date_str("2025-01-02 09:30:00"), expected);
        assert_eq!(parse_date_str("2 Jan 2025"), expected);
        assert_eq!(parse_date_str("Monday"), None);
    }

    #[test]
    fn two_digit_years_are_not_read_as_four_digit_ones() {
        assert_eq!(parse_date_str("01/02/25"), NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(parse_date_str("1/2/2025"), NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(parse_date_str("25-01-02"), None);
    }

    #[test]
    fn labels_fall_back_to_raw_text() {
        let parsed = DateLabel::from_cell(&Cell::from("01/02/2025"), DEFAULT_DISPLAY_FORMAT);
        assert_eq!(parsed.label, "2025-01-02");

        let raw = DateLabel::from_cell(&Cell::from("Week 1"), DEFAULT_DISPLAY_FORMAT);
        assert_eq!(raw.label, "Week 1");
        assert_eq!(raw.date, None);
    }

    #[test]
    fn parsed_labels_sort_before_raw_ones() {
        let labels = vec![
            DateLabel::from_cell(&Cell::from("Week 1"), DEFAULT_DISPLAY_FORMAT),
            DateLabel::from_cell(&Cell::from("2025-01-03"), DEFAULT_DISPLAY_FORMAT),
            DateLabel::from_cell(&Cell::from("2025-01-01"), DEFAULT_DISPLAY_FORMAT),
            DateLabel::from_cell(&Cell::from("Make-up"), DEFAULT_DISPLAY_FORMAT),
        ];
        assert_eq!(
            order_labels(labels),
            vec!["2025-01-01", "2025-01-03", "Week 1", "Make-up"]
        );
    }

    #[test]
    fn collects_wide_date_headers() {
        let headers = [
            "Roll",
            "Name",
            "01/06/2025",
            "2025-01-07",
            "Present",
            "Absent",
            "Total Present",
        ];
        let table = RawTable::from_rows(headers.iter().map(|h| h.to_string()).collect(), vec![])
            .unwrap();
        let roles = RoleAssignment {
            name: Some("Name".to_string()),
            roll: Some("Roll".to_string()),
            ..RoleAssignment::default()
        };
        assert_eq!(
            collect_date_columns(&table, &roles),
            vec!["01/06/2025", "2025-01-07"]
        );
    }

    #[test]
    fn status_and_time_columns_are_not_date_columns() {
        let headers = ["Name", "Date", "Status", "Time-In", "Time-Out", "2025-01-07"];
        let table = RawTable::from_rows(headers.iter().map(|h| h.to_string()).collect(), vec![])
            .unwrap();
        let roles = RoleAssignment {
            name: Some("Name".to_string()),
            date: Some("Date".to_string()),
            status: Some("Status".to_string()),
            time: Some("Time-In".to_string()),
            ..RoleAssignment::default()
        };
        assert_eq!(
            collect_date_columns(&table, &roles),
            vec!["Time-Out", "2025-01-07"]
        );
    }

    #[test]
    fn year_tokens_mark_date_headers() {
        assert!(looks_like_date_header("Term 1 2024"));
        assert!(!looks_like_date_header("Attendance"));
        assert!(!looks_like_date_header("Batch 12345"));
    }
}
