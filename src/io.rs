use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, XlsxError};

use crate::error::LoadError;
use crate::models::{Cell, RawTable};
use crate::report::{Report, ReportValue};

const SHEET_NAME: &str = "Attendance Report";
const MAX_COLUMN_WIDTH: usize = 20;

/// Loads the first row as headers and the rest as cells. The container is
/// picked from the file extension.
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<RawTable, LoadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            read_csv(file)
        }
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => load_workbook(path, sheet),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}

pub fn read_csv<R: std::io::Read>(input: R) -> Result<RawTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from).collect());
    }

    RawTable::from_rows(unique_headers(headers), rows)
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|name| name.as_str() == wanted)
            .cloned()
            .ok_or_else(|| LoadError::MissingSheet(wanted.to_string()))?,
        None => names.first().cloned().ok_or(LoadError::Empty)?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(LoadError::Empty)?
        .iter()
        .map(|cell| data_to_cell(cell).text())
        .collect();
    let body: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect();

    tracing::debug!(sheet = %sheet_name, rows = body.len(), "read worksheet");
    RawTable::from_rows(unique_headers(headers), body)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(value) => Cell::from(value.as_str()),
        Data::Float(value) => Cell::Number(*value),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Bool(value) => Cell::Bool(*value),
        Data::DateTime(value) => value
            .as_datetime()
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Number(value.as_f64())),
        Data::DateTimeIso(value) | Data::DurationIso(value) => Cell::from(value.as_str()),
    }
}

/// Blank headers become `Unnamed: <index>` and repeats get a `.N` suffix,
/// the way spreadsheet exports are usually read back.
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(index, header)| {
            let base = match header.trim() {
                "" => format!("Unnamed: {index}"),
                trimmed => trimmed.to_string(),
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Xlsx,
    Json,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "xlsx" => Some(OutputFormat::Xlsx),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

/// `<input stem>_attendance_report.<ext>` next to the input file.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("attendance");
    input.with_file_name(format!("{stem}_attendance_report.{}", format.extension()))
}

pub fn write_report(report: &Report, path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => write_csv(report, path),
        OutputFormat::Json => {
            let json = report.to_json().context("failed to serialize report")?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))
        }
        OutputFormat::Xlsx => write_xlsx(report, path)
            .with_context(|| format!("failed to write workbook {}", path.display())),
    }
}

fn write_csv(report: &Report, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(report.columns())?;
    for row in report.rows() {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn code_format(code: &str) -> Option<Format> {
    let (fill, font) = match code {
        "P" => (0xD4EDDA, 0x155724),
        "A" => (0xF8D7DA, 0x721C24),
        "I" => (0xFFF3CD, 0x856404),
        "-" => (0xE2E3E5, 0x383D41),
        _ => return None,
    };
    Some(
        Format::new()
            .set_background_color(Color::RGB(fill))
            .set_font_color(Color::RGB(font))
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter),
    )
}

/// Styled workbook: blue header row, colour-coded attendance cells and
/// column widths capped at twenty characters.
fn write_xlsx(report: &Report, path: &Path) -> Result<(), XlsxError> {
    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x4472C4))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let centered = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let code_formats: Vec<(&str, Format)> = ["P", "A", "I", "-"]
        .into_iter()
        .filter_map(|code| code_format(code).map(|format| (code, format)))
        .collect();
    let first_date_column = crate::report::FIXED_COLUMNS.len();

    let columns = report.columns();
    let rows = report.rows();
    let mut widths: Vec<usize> = columns.iter().map(|name| name.chars().count()).collect();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            let col_num = col as u16;
            let text = value.to_string();
            widths[col] = widths[col].max(text.chars().count());

            match value {
                ReportValue::Count(count) => {
                    worksheet.write_number(row_num, col_num, *count as f64)?;
                }
                ReportValue::Text(text) if col >= first_date_column => {
                    match code_formats.iter().find(|(code, _)| *code == text.as_str()) {
                        Some((_, format)) => {
                            worksheet.write_string_with_format(row_num, col_num, text, format)?;
                        }
                        None => {
                            worksheet.write_string_with_format(row_num, col_num, text, &centered)?;
                        }
                    }
                }
                ReportValue::Text(text) => match text.parse::<f64>() {
                    Ok(number) if col == 0 => {
                        worksheet.write_number(row_num, col_num, number)?;
                    }
                    _ => {
                        worksheet.write_string(row_num, col_num, text)?;
                    }
                },
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        worksheet.set_column_width(col as u16, width as f64)?;
    }

    workbook.save(path)?;
    Ok(())
}
