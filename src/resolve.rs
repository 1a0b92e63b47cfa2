use std::io::{BufRead, Write};

use crate::detect::Detection;
use crate::models::{ColumnRole, RawTable, RoleAssignment};

/// Supplies columns for mandatory roles that detection left open.
pub trait OverrideSource {
    fn resolve(
        &mut self,
        table: &RawTable,
        detection: &Detection,
        missing: &[ColumnRole],
    ) -> std::io::Result<RoleAssignment>;
}

/// Supplies nothing, so an incomplete assignment surfaces as an error.
#[derive(Debug, Default)]
pub struct NoOverrides;

impl OverrideSource for NoOverrides {
    fn resolve(
        &mut self,
        _table: &RawTable,
        _detection: &Detection,
        _missing: &[ColumnRole],
    ) -> std::io::Result<RoleAssignment> {
        Ok(RoleAssignment::default())
    }
}

/// Fills gaps by convention: name in the first column, date in the second,
/// status in the third. A column already holding another role is skipped in
/// favour of the next free one.
#[derive(Debug, Default)]
pub struct PositionalDefaults;

fn preferred_index(role: ColumnRole) -> usize {
    match role {
        ColumnRole::Name => 0,
        ColumnRole::Date => 1,
        ColumnRole::Status => 2,
        ColumnRole::Roll => 3,
        ColumnRole::Time | ColumnRole::Unclassified => 4,
    }
}

impl OverrideSource for PositionalDefaults {
    fn resolve(
        &mut self,
        table: &RawTable,
        detection: &Detection,
        missing: &[ColumnRole],
    ) -> std::io::Result<RoleAssignment> {
        let mut claimed = detection.roles.clone();
        let mut picked = RoleAssignment::default();
        let names: Vec<&str> = table.column_names().collect();

        for role in missing {
            let start = preferred_index(*role).min(names.len());
            let choice = names[start..]
                .iter()
                .chain(names[..start].iter())
                .find(|name| !claimed.is_claimed(name));
            if let Some(name) = choice {
                tracing::info!(role = %role, column = %name, "using positional default");
                claimed.set(*role, name);
                picked.set(*role, name);
            }
        }

        Ok(picked)
    }
}

/// Asks on `output` and reads a column number or name per missing role from
/// `input`. An empty answer leaves the role open.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> OverrideSource for Prompt<R, W> {
    fn resolve(
        &mut self,
        table: &RawTable,
        detection: &Detection,
        missing: &[ColumnRole],
    ) -> std::io::Result<RoleAssignment> {
        let names: Vec<&str> = table.column_names().collect();
        let mut picked = RoleAssignment::default();

        writeln!(self.output, "Could not detect every required column. Columns:")?;
        for (index, name) in names.iter().enumerate() {
            let role = detection.roles.role_of(name);
            if role == ColumnRole::Unclassified {
                writeln!(self.output, "  {}. {name}", index + 1)?;
            } else {
                writeln!(self.output, "  {}. {name} ({role})", index + 1)?;
            }
        }

        for role in missing {
            write!(self.output, "Select {role} column (number or name): ")?;
            self.output.flush()?;

            let mut answer = String::new();
            self.input.read_line(&mut answer)?;
            let answer = answer.trim();
            if answer.is_empty() {
                continue;
            }

            let choice = answer
                .parse::<usize>()
                .ok()
                .and_then(|number| number.checked_sub(1))
                .and_then(|index| names.get(index).copied())
                .or_else(|| names.iter().copied().find(|name| *name == answer));
            match choice {
                Some(name) => picked.set(*role, name),
                None => writeln!(self.output, "No column {answer:?}; leaving {role} unset.")?,
            }
        }

        Ok(picked)
    }
}
