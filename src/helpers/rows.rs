use crate::helpers::columns::ColumnMap;
use crate::helpers::serial_date;
use crate::models::cell::CellValue;
use crate::models::timesheet::{TaskItem, TimeEntry};

static EMPTY: CellValue = CellValue::Empty;

/// Cell at `idx`, or an empty cell when the row is shorter than that.
pub fn cell(row: &[CellValue], idx: usize) -> &CellValue {
    row.get(idx).unwrap_or(&EMPTY)
}

/// Turns one raw row into an entry holding exactly one task item.
/// Start and end are set only for numeric (serial) cells.
pub fn parse_row(row: &[CellValue], columns: &ColumnMap) -> TimeEntry {
    TimeEntry::new(
        cell(row, columns.invoice).to_string(),
        serial_date::from_cell(cell(row, columns.start)),
        serial_date::from_cell(cell(row, columns.end)),
        vec![TaskItem::new(
            cell(row, columns.issue).to_string(),
            cell(row, columns.description).to_string(),
        )],
    )
}

/// True when none of the configured cells carries a value.
pub fn is_blank(row: &[CellValue], columns: &ColumnMap) -> bool {
    [
        columns.start,
        columns.end,
        columns.invoice,
        columns.description,
        columns.issue,
    ]
    .into_iter()
    .all(|idx| cell(row, idx).is_blank())
}
