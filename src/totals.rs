use crate::models::{AttendanceCode, StudentStats, WideRecord};

/// Present and absent counts for a row of attendance cells. Missing data
/// counts as absent; incomplete and unrecognised cells count toward neither.
pub fn tally(cells: &[AttendanceCode]) -> (usize, usize) {
    cells.iter().fold((0, 0), |(present, absent), cell| match cell {
        AttendanceCode::Present => (present + 1, absent),
        AttendanceCode::Absent | AttendanceCode::NoData => (present, absent + 1),
        AttendanceCode::Incomplete | AttendanceCode::Other(_) => (present, absent),
    })
}

pub fn recompute(mut record: WideRecord) -> WideRecord {
    let (present, absent) = tally(&record.attendance);
    record.total_present = present;
    record.total_absent = absent;
    record
}

/// Full pass over every record, run after the initial build and after
/// each manual edit.
pub fn recompute_all(records: &mut Vec<WideRecord>) {
    *records = std::mem::take(records).into_iter().map(recompute).collect();
}

/// Share of attended days in percent, rounded to two decimals.
pub fn attendance_pct(present: usize, absent: usize) -> f64 {
    let total = present + absent;
    if total == 0 {
        return 0.0;
    }
    (present as f64 / total as f64 * 10_000.0).round() / 100.0
}

pub fn student_stats(record: &WideRecord) -> StudentStats {
    let (present, absent) = tally(&record.attendance);
    StudentStats {
        roll: record.roll.clone(),
        name: record.name.clone(),
        present,
        absent,
        total_days: present + absent,
        attendance_pct: attendance_pct(present, absent),
    }
}
