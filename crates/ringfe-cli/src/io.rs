//! Textual vector and matrix files.
//!
//! Integers separated by whitespace or commas, one matrix row per line;
//! blank lines are ignored. A vector file may spread its entries over any
//! number of lines.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;

fn parse_line(line: &str) -> io::Result<Vec<i64>> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("bad integer {s:?}: {e}")))
        })
        .collect()
}

/// All integers of the file, flattened across lines.
pub fn read_vector(path: &Path) -> io::Result<Vec<i64>> {
    let text = fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in text.lines() {
        out.extend(parse_line(line)?);
    }
    Ok(out)
}

/// One row of integers per non-blank line.
pub fn read_matrix(path: &Path) -> io::Result<Vec<Vec<i64>>> {
    let text = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in text.lines() {
        let row = parse_line(line)?;
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Space-separated entries on a single line.
pub fn write_vector<T: Display>(path: &Path, vector: &[T]) -> io::Result<()> {
    let line = vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    fs::write(path, line)
}

/// Space-separated rows, one per line.
pub fn write_matrix<T: Display>(path: &Path, matrix: &[Vec<T>]) -> io::Result<()> {
    let mut text = String::new();
    for row in matrix {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        text.push_str(&line);
        text.push('\n');
    }
    fs::write(path, text)
}
