use crate::dates::{self, DEFAULT_DISPLAY_FORMAT};
use crate::detect::{self, Detection};
use crate::error::ConvertError;
use crate::models::{ColumnRole, RawTable, RoleAssignment, Shape};
use crate::report::{self, CellEdit, Report};
use crate::reshape;
use crate::resolve::OverrideSource;
use crate::status::StatusNormalizer;

/// Per-date headers needed before a sheet is treated as already wide.
const WIDE_MIN_DATE_COLUMNS: usize = 2;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub overrides: RoleAssignment,
    /// `None` picks the shape from the headers.
    pub shape: Option<Shape>,
    pub display_format: String,
    pub strict: bool,
    pub edits: Vec<CellEdit>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            overrides: RoleAssignment::default(),
            shape: None,
            display_format: DEFAULT_DISPLAY_FORMAT.to_string(),
            strict: false,
            edits: Vec::new(),
        }
    }
}

/// What the pipeline would do with a table, before any reshaping.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Plan {
    pub detection: Detection,
    pub shape: Shape,
    pub date_columns: Vec<String>,
    pub missing: Vec<ColumnRole>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub detection: Detection,
    pub shape: Shape,
    pub report: Report,
}

fn check_overrides(table: &RawTable, overrides: &RoleAssignment) -> Result<(), ConvertError> {
    for role in ColumnRole::ASSIGNABLE {
        if let Some(column) = overrides.get(role) {
            if table.column(column).is_none() {
                return Err(ConvertError::UnknownColumn {
                    role,
                    column: column.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// A resolved status column next to a plain `Date` header means one row per
/// event, whatever else the headers look like.
fn choose_shape(
    requested: Option<Shape>,
    roles: &RoleAssignment,
    date_columns: &[String],
) -> Shape {
    if let Some(shape) = requested {
        return shape;
    }

    let event_rows = roles.status.is_some()
        && roles
            .date
            .as_deref()
            .is_some_and(|header| !dates::looks_like_date_header(header));
    if !event_rows && date_columns.len() >= WIDE_MIN_DATE_COLUMNS {
        Shape::Wide
    } else {
        Shape::Long
    }
}

pub fn plan(table: &RawTable, options: &ConvertOptions) -> Result<Plan, ConvertError> {
    check_overrides(table, &options.overrides)?;

    let detection = detect::detect(table, &options.overrides);
    let date_columns = dates::collect_date_columns(table, &detection.roles);
    let shape = choose_shape(options.shape, &detection.roles, &date_columns);
    let missing = detection.missing(shape);

    Ok(Plan {
        detection,
        shape,
        date_columns,
        missing,
    })
}

/// Runs detection, reshape, totals and assembly for one table.
///
/// Missing mandatory roles are first offered to `overrides`; if they are
/// still open afterwards the conversion stops with
/// [`ConvertError::IncompleteRoles`].
pub fn convert(
    table: &RawTable,
    options: &ConvertOptions,
    overrides: &mut dyn OverrideSource,
) -> Result<Conversion, ConvertError> {
    let plan = plan(table, options)?;
    let shape = plan.shape;
    let mut detection = plan.detection;

    if !plan.missing.is_empty() {
        tracing::warn!(missing = ?plan.missing, "role detection incomplete; asking for overrides");
        let extra = overrides
            .resolve(table, &detection, &plan.missing)
            .map_err(ConvertError::Prompt)?;
        check_overrides(table, &extra)?;
        detection = detection.with_overrides(table, &extra);
    }
    detection
        .require(shape)
        .map_err(ConvertError::IncompleteRoles)?;

    tracing::info!(
        shape = %shape,
        name = ?detection.roles.name,
        roll = ?detection.roles.roll,
        date = ?detection.roles.date,
        status = ?detection.roles.status,
        numeric_status = detection.numeric_status,
        "resolved column roles"
    );

    let wide = match shape {
        Shape::Long => reshape::reshape_long(
            table,
            &detection.roles,
            StatusNormalizer::new(detection.numeric_status),
            &options.display_format,
        )?,
        Shape::Wide => {
            let date_columns = dates::collect_date_columns(table, &detection.roles);
            if date_columns.is_empty() {
                tracing::warn!("no per-date columns found in wide sheet");
            }
            reshape::reshape_wide(table, &detection.roles, &date_columns)?
        }
    };

    let mut report = report::assemble(wide);
    for edit in &options.edits {
        report.apply(edit)?;
    }

    let unrecognized = report.unrecognized();
    if !unrecognized.is_empty() {
        if options.strict {
            return Err(ConvertError::UnrecognizedStatus(unrecognized));
        }
        tracing::warn!(tokens = ?unrecognized, "unrecognized status values kept as-is");
    }

    tracing::info!(
        students = report.records.len(),
        dates = report.date_labels.len(),
        "report assembled"
    );

    Ok(Conversion {
        detection,
        shape,
        report,
    })
}
