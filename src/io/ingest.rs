//! CSV ingest for measured data.
//!
//! Turns a `x,y[,y_err]` CSV into a `FitRequest`'s data columns.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **No fitting logic here**

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::{AppError, EXIT_INPUT};

/// Accepted spellings of the optional uncertainty column.
const ERROR_COLUMNS: [&str; 5] = ["y_err", "yerr", "sigma", "dy", "y_error"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Measured columns read from a CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Present only when the CSV carries an uncertainty column.
    pub y_err: Option<Vec<f64>>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Open and read a measurement CSV.
pub fn load_csv(path: &Path) -> Result<Measurements, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_csv(file)
}

pub fn read_csv<R: Read>(source: R) -> Result<Measurements, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let x_idx = required_column(&header_map, "x")?;
    let y_idx = required_column(&header_map, "y")?;
    let err_idx = ERROR_COLUMNS.iter().find_map(|name| header_map.get(*name).copied());

    let mut out = Measurements {
        y_err: err_idx.map(|_| Vec::new()),
        ..Measurements::default()
    };

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }

        let parsed = parse_field(&record, x_idx, "x").and_then(|x| {
            let y = parse_field(&record, y_idx, "y")?;
            let err = err_idx.map(|i| parse_field(&record, i, "y_err")).transpose()?;
            Ok((x, y, err))
        });
        match parsed {
            Ok((x, y, err)) => {
                out.x.push(x);
                out.y.push(y);
                if let (Some(errs), Some(e)) = (out.y_err.as_mut(), err) {
                    errs.push(e);
                }
            }
            Err(message) => out.row_errors.push(RowError { line, message }),
        }
    }

    if out.x.is_empty() {
        return Err(AppError::new(EXIT_INPUT, "No valid rows found in CSV."));
    }
    Ok(out)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn required_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| AppError::new(EXIT_INPUT, format!("Missing required column: `{name}`")))
}

fn parse_field(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record.get(idx).unwrap_or("");
    if raw.is_empty() {
        return Err(format!("missing `{name}`"));
    }
    let v: f64 = raw
        .parse()
        .map_err(|_| format!("invalid `{name}` value '{raw}'"))?;
    if !v.is_finite() {
        return Err(format!("non-finite `{name}` value '{raw}'"));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_required_columns_in_any_order() {
        let csv = "y,x\n1.5,0\n3.5,1\n";
        let m = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(m.x, vec![0.0, 1.0]);
        assert_eq!(m.y, vec![1.5, 3.5]);
        assert!(m.y_err.is_none());
        assert_eq!(m.rows_read, 2);
    }

    #[test]
    fn picks_up_error_column_aliases() {
        let csv = "\u{feff}X, Y ,Sigma\n0,1,0.1\n1,2,0.2\n";
        let m = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(m.y_err, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = "x,y\n0,1\n1,abc\n2\n3,4\n,\n";
        let m = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(m.x, vec![0.0, 3.0]);
        assert_eq!(m.row_errors.len(), 2);
        assert_eq!(m.row_errors[0].line, 3);
        assert!(m.row_errors[0].message.contains("invalid `y`"));
        assert_eq!(m.row_errors[1].line, 4);
        assert!(m.row_errors[1].message.contains("missing `y`"));
    }

    #[test]
    fn missing_column_is_an_input_error() {
        let err = read_csv("x,value\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert_eq!(err.to_string(), "Missing required column: `y`");
    }

    #[test]
    fn no_rows_is_an_input_error() {
        let err = read_csv("x,y\n".as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "No valid rows found in CSV.");
    }
}
