//! Tabular Reader (spec §4.1 / C1).
//!
//! Reads delimited text and spreadsheet uploads into [`RawRow`]s, preserving
//! column order and the row's `original_index`. Delimited files go through an
//! encoding fallback cascade (UTF-8 -> Latin-1 -> Windows-1252 -> ISO-8859-1);
//! spreadsheets are read with `calamine`, which handles their own encoding.

use crate::error::{PipelineError, Result};
use crate::models::RawRow;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static ALPHA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{3,}").unwrap());

// encoding_rs follows the WHATWG label spec, which maps the "latin-1" and
// "iso-8859-1" labels onto windows-1252 (its superset) rather than exposing
// them separately, so the fallback cascade collapses to these two steps.
const ENCODINGS: &[&encoding_rs::Encoding] = &[encoding_rs::UTF_8, encoding_rs::WINDOWS_1252];

/// A header is treated as synthetic (i.e. the file has no real header row)
/// when a majority of its cells look like positional placeholders rather
/// than field names, as produced by spreadsheet tools that re-export
/// headerless data ("Unnamed: 0", "Column1", "F1", bare integers...).
fn looks_synthetic(headers: &[String]) -> bool {
    if headers.is_empty() {
        return false;
    }
    let synthetic_count = headers
        .iter()
        .filter(|h| {
            let h = h.trim();
            h.is_empty()
                || h.starts_with("Unnamed")
                || h.parse::<f64>().is_ok()
                || h.to_lowercase().starts_with("column")
                || (h.len() <= 3 && h.chars().next().map(|c| c == 'F' || c == 'f').unwrap_or(false))
        })
        .count();
    synthetic_count * 2 > headers.len()
}

/// The other half of the headerless-file heuristic (spec §4.1): the first
/// row also has to look like data, not just have synthetic-looking column
/// names, or a file with a genuinely blank header row would be misread.
/// True when at least 3 of the first 5 non-empty cells (fewer if the row
/// has fewer than 3 cells to begin with) contain an alphabetic run of 3+
/// characters.
fn row_looks_like_data(cells: &[String]) -> bool {
    let considered: Vec<&str> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .take(5)
        .collect();
    if considered.is_empty() {
        return false;
    }
    let hits = considered.iter().filter(|c| ALPHA_RUN.is_match(c)).count();
    hits >= considered.len().min(3)
}

fn positional_headers(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("Column_{i}")).collect()
}

fn decode_bytes(path: &str, bytes: &[u8]) -> Result<String> {
    for encoding in ENCODINGS {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return Ok(decoded.into_owned());
        }
    }
    // Fall back to the last encoding in the cascade, accepting replacement
    // characters rather than declaring the file unreadable outright.
    if let Some(last) = ENCODINGS.last() {
        let (decoded, _, _) = last.decode(bytes);
        if !decoded.trim().is_empty() {
            return Ok(decoded.into_owned());
        }
    }
    Err(PipelineError::InputUnreadable {
        path: path.to_string(),
    })
}

fn read_delimited(path: &str, bytes: &[u8]) -> Result<Vec<RawRow>> {
    let text = decode_bytes(path, bytes)?;
    if text.trim().is_empty() {
        return Err(PipelineError::InputUnreadable {
            path: path.to_string(),
        });
    }

    let delimiter = if path.ends_with(".tsv") { b'\t' } else { b',' };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|_| PipelineError::InputUnreadable {
            path: path.to_string(),
        })?
        .iter()
        .map(|s| s.to_string())
        .collect();

    if looks_synthetic(&headers) && row_looks_like_data(&headers) {
        // Re-read treating the first row as data, using positional names.
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(false)
            .from_reader(text.as_bytes());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|_| PipelineError::InputUnreadable {
                path: path.to_string(),
            })?;
            let names = positional_headers(record.len());
            let cells = names
                .into_iter()
                .zip(record.iter().map(|s| s.to_string()))
                .collect();
            rows.push(RawRow { cells });
        }
        return Ok(rows);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|_| PipelineError::InputUnreadable {
            path: path.to_string(),
        })?;
        let cells = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|s| s.to_string()))
            .collect();
        rows.push(RawRow { cells });
    }

    if rows.is_empty() {
        return Err(PipelineError::InputUnreadable {
            path: path.to_string(),
        });
    }
    Ok(rows)
}

fn read_spreadsheet(path: &str) -> Result<Vec<RawRow>> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path).map_err(|_| PipelineError::InputUnreadable {
        path: path.to_string(),
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::InputUnreadable {
            path: path.to_string(),
        })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|_| PipelineError::InputUnreadable {
            path: path.to_string(),
        })?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or_else(|| PipelineError::InputUnreadable {
        path: path.to_string(),
    })?;

    let headers: Vec<String> = header_row.iter().map(|c| c.to_string()).collect();
    let synthetic = looks_synthetic(&headers) && row_looks_like_data(&headers);
    let effective_headers = if synthetic {
        positional_headers(headers.len())
    } else {
        headers
    };

    let mut rows = Vec::new();
    if synthetic {
        // The "header" row was actually the first data row; include it.
        let cells = effective_headers
            .iter()
            .cloned()
            .zip(header_row.iter().map(|c| c.to_string()))
            .collect();
        rows.push(RawRow { cells });
    }
    for data_row in rows_iter {
        let cells = effective_headers
            .iter()
            .cloned()
            .zip(data_row.iter().map(|c| c.to_string()))
            .collect();
        rows.push(RawRow { cells });
    }

    if rows.is_empty() {
        return Err(PipelineError::InputUnreadable {
            path: path.to_string(),
        });
    }
    Ok(rows)
}

/// Read a CSV/TSV/XLS/XLSX file into rows, tagging each with its stable
/// `original_index` (spec §3 invariant: original_index never changes once
/// assigned).
pub fn read_file(path: &str) -> Result<Vec<(usize, RawRow)>> {
    let is_spreadsheet = path.ends_with(".xlsx") || path.ends_with(".xls");

    let rows = if is_spreadsheet {
        read_spreadsheet(path)?
    } else {
        let bytes = std::fs::read(path)?;
        read_delimited(path, &bytes)?
    };

    Ok(rows.into_iter().enumerate().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_synthetic_header() {
        let headers = vec!["Unnamed: 0".to_string(), "Unnamed: 1".to_string(), "Unnamed: 2".to_string()];
        assert!(looks_synthetic(&headers));
    }

    #[test]
    fn real_header_is_not_synthetic() {
        let headers = vec!["Owner Name 1".to_string(), "House Number".to_string(), "City Name".to_string()];
        assert!(!looks_synthetic(&headers));
    }

    #[test]
    fn reads_basic_csv_with_original_index() {
        let dir = std::env::temp_dir().join(format!("reader-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.csv");
        std::fs::write(&path, "Owner Name 1,City Name\nJOHN SMITH,MIAMI\nJANE DOE,TAMPA\n").unwrap();

        let rows = read_file(path.to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 0);
        assert_eq!(rows[1].0, 1);
        assert_eq!(rows[0].1.get("Owner Name 1"), Some("JOHN SMITH"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_file_is_unreadable() {
        let dir = std::env::temp_dir().join(format!("reader-test-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.csv");
        std::fs::write(&path, "").unwrap();

        let result = read_file(path.to_str().unwrap());
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn blank_header_row_is_not_mistaken_for_data() {
        // Synthetic-looking names, but the cells are empty, so the
        // data-look condition must block the re-read.
        assert!(looks_synthetic(&[String::new(), String::new(), String::new()]));
        assert!(!row_looks_like_data(&[String::new(), String::new(), String::new()]));
    }

    #[test]
    fn synthetic_header_csv_is_treated_as_headerless() {
        let dir = std::env::temp_dir().join(format!("reader-test-synth-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("headerless.csv");
        std::fs::write(&path, "Unnamed: 0,Unnamed: 1\nJOHN SMITH,123 MAIN ST\n").unwrap();

        let rows = read_file(path.to_str().unwrap()).unwrap();
        // the "header" row is itself data, so both rows survive
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.get("Column_1"), Some("Unnamed: 0"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
