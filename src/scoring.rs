//! Scoring transform: turns tabular rows into a ranked record sequence.
//!
//! Pure function from rows to ranked output; persistence is the caller's
//! responsibility. Scores come from the row's numeric columns:
//! - exactly one numeric column → its raw value is the score;
//! - several numeric columns → each is min-max normalized to [0, 1] and
//!   the normalized values are summed per row;
//! - no numeric columns → every row gets a uniform-random score in
//!   [0, 100). The fallback is seed-configurable so reprocessing the
//!   same input can be made reproducible.
//!
//! Rows are sorted by score descending (stable, so equal scores keep
//! their original order) and assigned dense 1-based ranks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Number, Value};

use crate::models::RankedRow;

/// Compute scores and dense 1-based ranks for a set of rows.
///
/// `seed` controls the random-score fallback used when no numeric
/// columns exist; `None` seeds from the OS.
///
/// Missing/empty cells are normalized to JSON null; cells in numeric
/// columns are coerced to JSON numbers in the returned data.
pub fn compute_rankings(rows: Vec<Map<String, Value>>, seed: Option<u64>) -> Vec<RankedRow> {
    if rows.is_empty() {
        return Vec::new();
    }

    // Column order: first-seen across all rows.
    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let numeric_columns: Vec<String> = columns
        .iter()
        .filter(|col| is_numeric_column(&rows, col))
        .cloned()
        .collect();

    let scores: Vec<f64> = match numeric_columns.len() {
        0 => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_os_rng(),
            };
            rows.iter().map(|_| rng.random_range(0.0..100.0)).collect()
        }
        1 => {
            let col = &numeric_columns[0];
            rows.iter()
                .map(|row| cell_value(row, col).unwrap_or(0.0))
                .collect()
        }
        _ => {
            // Per-column min/max over the full row set, then sum of
            // normalized contributions. A constant column (max == min)
            // contributes 0 for every row.
            let ranges: Vec<(String, f64, f64)> = numeric_columns
                .iter()
                .map(|col| {
                    let values: Vec<f64> =
                        rows.iter().filter_map(|row| cell_value(row, col)).collect();
                    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    (col.clone(), min, max)
                })
                .collect();

            rows.iter()
                .map(|row| {
                    ranges
                        .iter()
                        .map(|(col, min, max)| {
                            let range = max - min;
                            if range <= 0.0 {
                                return 0.0;
                            }
                            match cell_value(row, col) {
                                Some(v) => (v - min) / range,
                                None => 0.0,
                            }
                        })
                        .sum()
                })
                .collect()
        }
    };

    let mut ranked: Vec<(Map<String, Value>, f64)> = rows
        .into_iter()
        .zip(scores)
        .map(|(row, score)| (normalize_row(row, &columns, &numeric_columns), score))
        .collect();

    // Stable sort keeps insertion order for equal scores.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .into_iter()
        .enumerate()
        .map(|(idx, (data, score))| RankedRow {
            data,
            score,
            rank: (idx + 1) as i64,
        })
        .collect()
}

/// A column is numeric when it has at least one non-null cell and every
/// non-null cell parses as a finite number.
fn is_numeric_column(rows: &[Map<String, Value>], col: &str) -> bool {
    let mut seen_value = false;
    for row in rows {
        match row.get(col) {
            None | Some(Value::Null) => continue,
            Some(v) if is_empty_cell(v) => continue,
            Some(v) => {
                if parse_numeric(v).is_none() {
                    return false;
                }
                seen_value = true;
            }
        }
    }
    seen_value
}

fn is_empty_cell(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

fn parse_numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // "NaN"/"inf" parse as f64 but are not usable scores
    parsed.filter(|v| v.is_finite())
}

/// Numeric value of a cell, or `None` for null/missing cells.
fn cell_value(row: &Map<String, Value>, col: &str) -> Option<f64> {
    row.get(col).and_then(parse_numeric)
}

/// Normalize a row for storage: missing/empty cells become explicit
/// nulls, and cells in numeric columns are coerced to JSON numbers.
fn normalize_row(
    mut row: Map<String, Value>,
    columns: &[String],
    numeric_columns: &[String],
) -> Map<String, Value> {
    let mut out = Map::new();
    for col in columns {
        let value = match row.remove(col) {
            None | Some(Value::Null) => Value::Null,
            Some(v) if is_empty_cell(&v) => Value::Null,
            Some(v) => {
                if numeric_columns.iter().any(|c| c == col) {
                    match parse_numeric(&v).and_then(Number::from_f64) {
                        Some(n) => Value::Number(n),
                        None => Value::Null,
                    }
                } else {
                    v
                }
            }
        };
        out.insert(col.clone(), value);
    }
    out
}
