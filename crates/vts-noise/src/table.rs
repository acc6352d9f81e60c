//! Keyed text archives.
//!
//! Three entry layouts are supported, one entry per key:
//!
//! ```text
//! utt1 [ 0.5 -1 2.25 ]          # real vector
//! utt1 3 3 4 4 4 5              # integer vector (brackets optional)
//! utt1 [                        # matrix, one row per line
//!   1 2 3
//!   4 5 6 ]
//! ```
//!
//! Feature matrices are streamed in file order; vectors are loaded into
//! keyed tables for random access.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Write};
use std::str::FromStr;

use ndarray::Array2;
use vts_common::from_rows;

/// Errors raised while reading or writing an archive.
#[derive(Debug)]
pub enum TableError {
    Io(std::io::Error),
    /// Malformed entry; `line` is 1-based.
    Parse { line: usize, message: String },
    /// A key appears twice in a random-access table.
    DuplicateKey(String),
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "archive I/O error: {e}"),
            Self::Parse { line, message } => write!(f, "line {line}: {message}"),
            Self::DuplicateKey(key) => write!(f, "duplicate key {key}"),
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TableError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Stream of `(key, features)` pairs in archive order.
pub trait UtteranceSource: Iterator<Item = Result<(String, Array2<f64>), TableError>> {}

impl<I> UtteranceSource for I where I: Iterator<Item = Result<(String, Array2<f64>), TableError>> {}

/// Random-access lookup by key.
pub trait KeyedTable<T> {
    fn get(&self, key: &str) -> Option<&T>;
}

impl<T> KeyedTable<T> for HashMap<String, T> {
    fn get(&self, key: &str) -> Option<&T> {
        HashMap::get(self, key)
    }
}

impl<T> KeyedTable<T> for BTreeMap<String, T> {
    fn get(&self, key: &str) -> Option<&T> {
        BTreeMap::get(self, key)
    }
}

/// Destination for keyed real vectors.
pub trait VectorSink {
    fn write_vector(&mut self, key: &str, value: &[f64]) -> Result<(), TableError>;
}

impl VectorSink for BTreeMap<String, Vec<f64>> {
    fn write_vector(&mut self, key: &str, value: &[f64]) -> Result<(), TableError> {
        self.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

/// Writes real vectors as `key [ v0 v1 ... ]` lines.
#[derive(Debug)]
pub struct VectorWriter<W: Write> {
    inner: W,
}

impl<W: Write> VectorWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, TableError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> VectorSink for VectorWriter<W> {
    fn write_vector(&mut self, key: &str, value: &[f64]) -> Result<(), TableError> {
        write_vector_entry(&mut self.inner, key, value)
    }
}

/// Writes one real-vector entry.
pub fn write_vector_entry(w: &mut impl Write, key: &str, value: &[f64]) -> Result<(), TableError> {
    write!(w, "{key} [")?;
    for v in value {
        write!(w, " {v}")?;
    }
    writeln!(w, " ]")?;
    Ok(())
}

/// Writes one integer-vector entry.
pub fn write_int_vector_entry(
    w: &mut impl Write,
    key: &str,
    value: &[i32],
) -> Result<(), TableError> {
    write!(w, "{key}")?;
    for v in value {
        write!(w, " {v}")?;
    }
    writeln!(w)?;
    Ok(())
}

/// Writes one matrix entry.
pub fn write_matrix_entry(
    w: &mut impl Write,
    key: &str,
    value: &Array2<f64>,
) -> Result<(), TableError> {
    write!(w, "{key} [")?;
    for row in value.rows() {
        write!(w, "\n ")?;
        for v in row {
            write!(w, " {v}")?;
        }
    }
    writeln!(w, " ]")?;
    Ok(())
}

/// Reads a real-vector archive into a table.
pub fn read_vector_table(reader: impl BufRead) -> Result<HashMap<String, Vec<f64>>, TableError> {
    read_vector_lines(reader)
}

/// Reads an integer-vector archive (e.g. alignments) into a table.
pub fn read_int_vector_table(reader: impl BufRead) -> Result<HashMap<String, Vec<i32>>, TableError> {
    read_vector_lines(reader)
}

fn read_vector_lines<T: FromStr>(
    reader: impl BufRead,
) -> Result<HashMap<String, Vec<T>>, TableError> {
    let mut table = HashMap::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = parse_vector_line(&line, index + 1)?;
        if table.contains_key(key) {
            return Err(TableError::DuplicateKey(key.to_owned()));
        }
        table.insert(key.to_owned(), value);
    }
    Ok(table)
}

/// Parses `key [ v0 v1 ... ]` or `key v0 v1 ...`.
fn parse_vector_line<T: FromStr>(line: &str, line_no: usize) -> Result<(&str, Vec<T>), TableError> {
    let mut tokens = line.split_whitespace();
    let key = tokens.next().ok_or_else(|| parse_error(line_no, "missing key"))?;
    let mut rest: Vec<&str> = tokens.collect();
    if rest.first() == Some(&"[") {
        if rest.last() != Some(&"]") || rest.len() < 2 {
            return Err(parse_error(line_no, format!("unterminated vector for {key}")));
        }
        rest = rest[1..rest.len() - 1].to_vec();
    }
    let values = parse_numbers(&rest, line_no)?;
    Ok((key, values))
}

fn parse_numbers<T: FromStr>(tokens: &[&str], line_no: usize) -> Result<Vec<T>, TableError> {
    tokens
        .iter()
        .map(|t| {
            t.parse()
                .map_err(|_| parse_error(line_no, format!("invalid number {t:?}")))
        })
        .collect()
}

fn parse_error(line: usize, message: impl Into<String>) -> TableError {
    TableError::Parse {
        line,
        message: message.into(),
    }
}

/// Streams matrix entries from a text archive in file order.
#[derive(Debug)]
pub struct MatrixArchiveReader<R> {
    reader: R,
    line_no: usize,
    buf: String,
    failed: bool,
}

impl<R: BufRead> MatrixArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
            failed: false,
        }
    }

    /// Reads the next line into `buf`; `false` at end of input.
    fn advance(&mut self) -> Result<bool, TableError> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    fn read_entry(&mut self) -> Result<Option<(String, Array2<f64>)>, TableError> {
        let (key, mut rows, mut done) = loop {
            if !self.advance()? {
                return Ok(None);
            }
            let mut tokens = self.buf.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let key = key.to_owned();
            if tokens.next() != Some("[") {
                return Err(parse_error(
                    self.line_no,
                    format!("expected '[' after key {key}"),
                ));
            }
            let rest: Vec<&str> = tokens.collect();
            let mut rows = Vec::new();
            let done = push_row(&mut rows, &rest, self.line_no)?;
            break (key, rows, done);
        };

        while !done {
            if !self.advance()? {
                return Err(parse_error(
                    self.line_no + 1,
                    format!("unexpected end of input inside matrix {key}"),
                ));
            }
            let tokens: Vec<&str> = self.buf.split_whitespace().collect();
            done = push_row(&mut rows, &tokens, self.line_no)?;
        }

        let matrix = from_rows(&rows).map_err(|_| {
            parse_error(self.line_no, format!("rows of matrix {key} differ in length"))
        })?;
        Ok(Some((key, matrix)))
    }
}

/// Appends the row in `tokens` (if any) and reports whether it closed the
/// matrix.
fn push_row(rows: &mut Vec<Vec<f64>>, tokens: &[&str], line_no: usize) -> Result<bool, TableError> {
    let (values, closed) = match tokens.split_last() {
        Some((&"]", values)) => (values, true),
        _ => (tokens, false),
    };
    if !values.is_empty() {
        rows.push(parse_numbers(values, line_no)?);
    }
    Ok(closed)
}

impl<R: BufRead> Iterator for MatrixArchiveReader<R> {
    type Item = Result<(String, Array2<f64>), TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let entry = self.read_entry().transpose();
        if matches!(entry, Some(Err(_))) {
            self.failed = true;
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    #[test]
    fn reads_matrices_in_order() {
        let text = "a [\n  1 2\n  3 4 ]\n\nb [ 5 6 ]\nempty [ ]\n";
        let entries: Vec<_> = MatrixArchiveReader::new(text.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[0].1, arr2(&[[1.0, 2.0], [3.0, 4.0]]));
        assert_eq!(entries[1].1, arr2(&[[5.0, 6.0]]));
        assert_eq!(entries[2].1.nrows(), 0);
    }

    #[test]
    fn ragged_matrix_is_an_error() {
        let text = "a [\n 1 2\n 3 ]\n";
        let mut reader = MatrixArchiveReader::new(text.as_bytes());
        assert!(matches!(reader.next(), Some(Err(TableError::Parse { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_matrix_reports_line() {
        let text = "a [\n 1 2\n";
        let err = MatrixArchiveReader::new(text.as_bytes())
            .next()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, TableError::Parse { line: 3, .. }), "{err}");
    }

    #[test]
    fn reads_alignments_with_and_without_brackets() {
        let text = "u1 1 1 2 3\nu2 [ 4 5 ]\n";
        let table = read_int_vector_table(text.as_bytes()).unwrap();
        assert_eq!(table["u1"], vec![1, 1, 2, 3]);
        assert_eq!(table["u2"], vec![4, 5]);
    }

    #[test]
    fn keyed_lookup_over_either_map() {
        let table = read_int_vector_table("u1 1 2\n".as_bytes()).unwrap();
        let sorted: BTreeMap<_, _> = table.clone().into_iter().collect();
        for lookup in [&table as &dyn KeyedTable<Vec<i32>>, &sorted] {
            assert_eq!(lookup.get("u1"), Some(&vec![1, 2]));
            assert_eq!(lookup.get("u2"), None);
        }
    }

    #[test]
    fn rejects_duplicate_keys() {
        let text = "k [ 1 ]\nk [ 2 ]\n";
        assert!(matches!(
            read_vector_table(text.as_bytes()),
            Err(TableError::DuplicateKey(k)) if k == "k"
        ));
    }

    #[test]
    fn writer_output_reads_back() {
        let mut writer = VectorWriter::new(Vec::new());
        writer.write_vector("u_mu_h", &[0.1, -2.5, 1e-12]).unwrap();
        writer.write_vector("u_var_z", &[]).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "u_mu_h [ 0.1 -2.5 0.000000000001 ]\nu_var_z [ ]\n"
        );
        let table = read_vector_table(bytes.as_slice()).unwrap();
        assert_eq!(table["u_mu_h"], vec![0.1, -2.5, 1e-12]);
        assert!(table["u_var_z"].is_empty());
    }

    #[test]
    fn matrix_writer_output_reads_back() {
        let m = arr2(&[[1.5, -2.0], [0.25, 8.0]]);
        let mut bytes = Vec::new();
        write_matrix_entry(&mut bytes, "x", &m).unwrap();
        let (key, read) = MatrixArchiveReader::new(bytes.as_slice())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(key, "x");
        assert_eq!(read, m);
    }
}
