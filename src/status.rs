use std::sync::LazyLock;

use regex::Regex;

use crate::models::{AttendanceCode, Cell, Column};

static NUMERIC_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)$").expect("numeric pattern compiles"));

const SAMPLE_SIZE: usize = 10;

/// Maps raw status cells onto attendance codes.
///
/// In numeric mode (status column filled with ids or counts rather than
/// words) any numeric-looking value means the student was there and
/// everything else means they were not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusNormalizer {
    pub numeric: bool,
}

impl StatusNormalizer {
    pub fn new(numeric: bool) -> Self {
        Self { numeric }
    }

    pub fn normalize(&self, raw: &Cell) -> AttendanceCode {
        let token = raw.text().trim().to_uppercase();

        match token.as_str() {
            "P" | "PRESENT" | "TRUE" | "1" => return AttendanceCode::Present,
            "A" | "ABSENT" | "FALSE" | "0" => return AttendanceCode::Absent,
            "I" | "INCOMPLETE" => return AttendanceCode::Incomplete,
            _ => {}
        }

        if self.numeric {
            return if is_numeric_shaped(&token) {
                AttendanceCode::Present
            } else {
                AttendanceCode::Absent
            };
        }

        match token.as_str() {
            "" | "-" => AttendanceCode::NoData,
            _ => AttendanceCode::Other(token),
        }
    }
}

pub fn is_numeric_shaped(value: &str) -> bool {
    NUMERIC_SHAPE.is_match(value.trim())
}

/// Samples up to ten non-empty values; the column is numeric when every
/// sample is a number or the literal `NAN`.
pub fn is_numeric_status(column: &Column) -> bool {
    let samples: Vec<String> = column
        .non_empty()
        .take(SAMPLE_SIZE)
        .map(|cell| cell.text().trim().to_uppercase())
        .collect();

    !samples.is_empty()
        && samples
            .iter()
            .all(|value| value == "NAN" || is_numeric_shaped(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[&str]) -> Column {
        Column {
            name: "Status".to_string(),
            cells: values.iter().map(|value| Cell::from(*value)).collect(),
        }
    }

    #[test]
    fn text_tokens_map_to_canonical_codes() {
        let normalizer = StatusNormalizer::default();
        for raw in ["p", "P", "present", "PRESENT", "true", "1", " Present "] {
            assert_eq!(normalizer.normalize(&Cell::from(raw)), AttendanceCode::Present, "{raw}");
        }
        for raw in ["a", "A", "absent", "ABSENT", "false", "0"] {
            assert_eq!(normalizer.normalize(&Cell::from(raw)), AttendanceCode::Absent, "{raw}");
        }
        for raw in ["i", "I", "incomplete", "Incomplete"] {
            assert_eq!(normalizer.normalize(&Cell::from(raw)), AttendanceCode::Incomplete, "{raw}");
        }
    }

    #[test]
    fn typed_cells_go_through_their_text_form() {
        let normalizer = StatusNormalizer::default();
        assert_eq!(normalizer.normalize(&Cell::Bool(true)), AttendanceCode::Present);
        assert_eq!(normalizer.normalize(&Cell::Number(0.0)), AttendanceCode::Absent);
    }

    #[test]
    fn unknown_tokens_pass_through_upper_cased() {
        let normalizer = StatusNormalizer::default();
        assert_eq!(
            normalizer.normalize(&Cell::from("late")),
            AttendanceCode::Other("LATE".to_string())
        );
        assert_eq!(normalizer.normalize(&Cell::Empty), AttendanceCode::NoData);
        assert_eq!(normalizer.normalize(&Cell::from("-")), AttendanceCode::NoData);
    }

    #[test]
    fn id_columns_are_detected_as_numeric() {
        let status = column(&["101", "102", "nan", "103"]);
        assert!(is_numeric_status(&status));

        let normalizer = StatusNormalizer::new(is_numeric_status(&status));
        assert_eq!(normalizer.normalize(&Cell::from("nan")), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::from("101")), AttendanceCode::Present);
        assert_eq!(normalizer.normalize(&Cell::Empty), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::from("none")), AttendanceCode::Absent);
    }

    #[test]
    fn numeric_mode_checks_the_lookup_before_the_number_shape() {
        let normalizer = StatusNormalizer::new(true);
        assert_eq!(normalizer.normalize(&Cell::from("0")), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::Number(0.0)), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::from("1")), AttendanceCode::Present);
        assert_eq!(normalizer.normalize(&Cell::from("5")), AttendanceCode::Present);
        assert_eq!(normalizer.normalize(&Cell::from("P")), AttendanceCode::Present);
        assert_eq!(normalizer.normalize(&Cell::from("absent")), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::from("I")), AttendanceCode::Incomplete);
    }

    #[test]
    fn numeric_mode_treats_placeholders_as_absent() {
        let normalizer = StatusNormalizer::new(true);
        assert_eq!(normalizer.normalize(&Cell::from("-")), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::from("NAN")), AttendanceCode::Absent);
        assert_eq!(normalizer.normalize(&Cell::from("NaN")), AttendanceCode::Absent);
    }

    #[test]
    fn word_columns_are_not_numeric() {
        assert!(!is_numeric_status(&column(&["P", "A", "101"])));
        assert!(!is_numeric_status(&column(&["", ""])));
    }

    #[test]
    fn numeric_shape_allows_one_decimal_point_and_leading_minus() {
        assert!(is_numeric_shaped("101"));
        assert!(is_numeric_shaped("101.0"));
        assert!(is_numeric_shaped("-3"));
        assert!(!is_numeric_shaped("1.2.3"));
        assert!(!is_numeric_shaped("1-2"));
        assert!(!is_numeric_shaped(""));
    }
}
