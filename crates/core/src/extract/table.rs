//! Strategy B: direct traversal of the rendered timetable table. Used only
//! when the script-literal strategy yields nothing; some deployments
//! server-render the grid without the inline data block. The rendered view
//! carries no per-week bitstring, so occurrences default to the full term.

use crate::dom::DomNode;
use crate::schedule::RawOccurrence;

use super::MAX_SECTION;

/// Columns: 0 is the period-label column, 1..=7 are Monday..Sunday.
const MAX_DAY_COLUMN: usize = 7;

/// Reconstruct course occurrences from the first plausible timetable table
/// (preferring the `kbcontent` container). Course cells are the ones
/// carrying an explicit rowspan; the rowspan is the section count and the
/// body row index the start section.
pub fn extract_table_occurrences(doc: &DomNode, term_weeks: u32) -> Vec<RawOccurrence> {
    let root = doc.find_by_id("kbcontent").unwrap_or(doc);
    let table = match root.find_first_tag("table") {
        Some(table) => table,
        None => return Vec::new(),
    };

    let rows = table.collect_tag("tr");
    let header_rows = leading_header_rows(&rows);

    // Rowspan carry per column: how many further rows each column is
    // still occupied by a cell from an earlier row. Without this, a cell
    // after a multi-period block would be attributed to the wrong weekday.
    let mut carry: Vec<u32> = Vec::new();
    let mut occurrences = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        let cells = row
            .children
            .iter()
            .filter(|child| child.tag == "td" || child.tag == "th");

        let mut column = 0usize;
        for cell in cells {
            while column < carry.len() && carry[column] > 0 {
                column += 1;
            }
            if carry.len() <= column {
                carry.resize(column + 1, 0);
            }

            // Clamped: a garbage rowspan must not blow up the section run.
            let rowspan: u32 = cell
                .get_attr("rowspan")
                .and_then(|value| value.parse().ok())
                .unwrap_or(1)
                .clamp(1, MAX_SECTION);
            carry[column] = rowspan;

            if cell.tag == "td"
                && cell.get_attr("rowspan").is_some()
                && (1..=MAX_DAY_COLUMN).contains(&column)
                && row_index >= header_rows
            {
                let section = (row_index - header_rows + 1) as u32;
                if let Some(occurrence) =
                    occurrence_from_cell(cell, column as u8, section, rowspan, term_weeks)
                {
                    occurrences.push(occurrence);
                }
            }

            column += 1;
        }

        for pending in carry.iter_mut() {
            if *pending > 0 {
                *pending -= 1;
            }
        }
    }

    occurrences
}

/// Header rows carry `th` cells (or nothing useful); the first body row is
/// section 1. Only the first 3 rows are candidates, so grids whose
/// period-label column uses `th` cells keep their body rows.
fn leading_header_rows(rows: &[&DomNode]) -> usize {
    rows.iter()
        .take(3)
        .take_while(|row| row.children.iter().any(|cell| cell.tag == "th"))
        .count()
}

/// Cell text stacks name / teacher / room on separate lines; the teacher
/// and room lines may carry a `教师：`-style label before a full-width
/// colon.
fn occurrence_from_cell(
    cell: &DomNode,
    day: u8,
    start_section: u32,
    rowspan: u32,
    term_weeks: u32,
) -> Option<RawOccurrence> {
    let lines = cell.text_lines();
    let name = lines.first()?.clone();
    let teacher = lines.get(1).map(|line| value_after_label(line)).unwrap_or_default();
    let room = lines.get(2).map(|line| value_after_label(line)).unwrap_or_default();

    Some(
        RawOccurrence {
            name,
            teacher,
            room,
            day,
            sections: (start_section..start_section + rowspan.max(1)).collect(),
            weeks: (1..=term_weeks).collect(),
        }
        .normalized(),
    )
}

fn value_after_label(line: &str) -> String {
    match line.split_once('：') {
        Some((_, value)) => value.trim().to_string(),
        None => line.trim().to_string(),
    }
}
