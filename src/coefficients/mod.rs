/// Coefficient table extraction.
///
/// The IHM publishes the yearly coefficients as a single-page PDF. Each row
/// is a day of the month; the first block of rows covers January to June,
/// the second block July to December. Every month takes two values per day
/// (morning and evening), which the PDF renders either in one cell or
/// spread over neighbouring cells.
///
/// `pdf::extract_table` turns the page into a grid of text cells;
/// `extract_coefficients` walks that grid. There is no validation pass: a
/// reflowed layout silently produces wrong values, so callers should check
/// `CoefficientTable::incomplete_dates` on the result.

pub mod pdf;

use crate::logging::{self, Source};
use crate::model::{CoefficientTable, TideError};

/// Months covered by one semester block of the table.
pub const MONTHS_PER_SEMESTER: u32 = 6;

/// Values per day and month (morning, evening).
const VALUES_PER_MONTH: usize = 2;

const PLACEHOLDER: &str = "0";

/// Builds the coefficient table for `year` from the cell grid of the PDF.
///
/// Rows whose first cell is not a day number are skipped. The semester
/// flips each time a row's day is 1, so the first block maps to months
/// 1–6 and the second to 7–12.
pub fn extract_coefficients(
    grid: &[Vec<String>],
    year: i32,
) -> Result<CoefficientTable, TideError> {
    let mut table = CoefficientTable::new();
    let mut first_semester = false;

    for row in grid {
        let Some(day) = row.first().and_then(|cell| parse_day(cell)) else {
            continue;
        };
        if day == 1 {
            first_semester = !first_semester;
        }
        let first_month = if first_semester { 1 } else { 1 + MONTHS_PER_SEMESTER };
        let last_month = first_month + MONTHS_PER_SEMESTER - 1;

        let mut month = first_month;
        let mut slot = 0;

        for token in row_tokens(&row[1..]) {
            if month > last_month {
                logging::debug(
                    Source::Coefficients,
                    None,
                    &format!("day {}: ignoring extra value '{}'", day, token),
                );
                continue;
            }
            let value: f64 = token.parse().map_err(|_| {
                TideError::Parse(format!("coefficient '{}' on day {} is not a number", token, day))
            })?;
            table.push(format!("{}-{:02}-{:02}", year, month, day), value);

            slot += 1;
            if slot == VALUES_PER_MONTH {
                slot = 0;
                month += 1;
            }
        }
    }

    Ok(table)
}

fn parse_day(cell: &str) -> Option<u32> {
    cell.trim().parse::<u32>().ok().filter(|d| (1..=31).contains(d))
}

/// Splits the value cells of one row into tokens, in reading order.
///
/// An empty cell yields a single placeholder `0`. The row's last cells go
/// through `repair_ragged_row` first.
pub fn row_tokens(cells: &[String]) -> Vec<String> {
    let mut tokens: Vec<Vec<String>> = cells
        .iter()
        .map(|cell| cell.split_whitespace().map(str::to_string).collect())
        .collect();
    repair_ragged_row(&mut tokens);

    tokens
        .into_iter()
        .flat_map(|cell| {
            if cell.is_empty() {
                vec![PLACEHOLDER.to_string()]
            } else {
                cell
            }
        })
        .collect()
}

/// Pads a ragged end of row.
///
/// Near the month boundary the PDF sometimes splits the last pair
/// inconsistently. When the second-to-last cell holds fewer than two values:
/// an empty last cell means a `0` goes after its value; otherwise an empty
/// cell three from the end means a `0` goes before it.
///
/// Only derived from the published layout. Do not extend it without
/// re-checking against an actual PDF.
pub fn repair_ragged_row(cells: &mut [Vec<String>]) {
    let n = cells.len();
    if n < 2 || cells[n - 2].len() >= VALUES_PER_MONTH {
        return;
    }
    if cells[n - 1].is_empty() {
        cells[n - 2].push(PLACEHOLDER.to_string());
    } else if n >= 3 && cells[n - 3].is_empty() {
        cells[n - 2].insert(0, PLACEHOLDER.to_string());
    }
}
