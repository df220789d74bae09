//! Delimited-text parser with encoding and delimiter auto-detection.
//!
//! Produces a [`Table`] of raw string cells. Typed access goes through
//! [`Table::parse`], which reports the line, column and value on failure.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::str::FromStr;

/// CSV parsing error with context
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A parsed delimited file: header row plus raw string rows.
#[derive(Debug, Clone)]
pub struct Table {
    /// Column headers, trimmed
    pub headers: Vec<String>,
    /// Data rows in file order (blank lines skipped)
    pub rows: Vec<StringRecord>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

impl Table {
    /// Index of a column, matching headers case-insensitively.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw cell text; missing trailing cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or("")
    }

    /// Non-empty cell text, or an error naming the column.
    pub fn text(&self, row: usize, col: usize) -> Result<String, CsvError> {
        let raw = self.cell(row, col);
        if raw.is_empty() {
            return Err(CsvError::new(line_of(row), "empty value")
                .with_column(self.header(col)));
        }
        Ok(raw.to_string())
    }

    /// Parse a cell into `T`.
    pub fn parse<T>(&self, row: usize, col: usize) -> Result<T, CsvError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.cell(row, col);
        raw.parse::<T>().map_err(|e| {
            CsvError::new(line_of(row), e.to_string())
                .with_column(self.header(col))
                .with_value(raw)
        })
    }

    /// Parse an integer cell, accepting spreadsheet exports such as `2020.0`.
    pub fn parse_integer(&self, row: usize, col: usize) -> Result<i64, CsvError> {
        let raw = self.cell(row, col);
        if let Ok(v) = raw.parse::<i64>() {
            return Ok(v);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
            _ => Err(CsvError::new(line_of(row), "expected an integer")
                .with_column(self.header(col))
                .with_value(raw)),
        }
    }

    fn header(&self, col: usize) -> String {
        self.headers.get(col).cloned().unwrap_or_else(|| format!("#{}", col))
    }
}

/// Line number in the source file for a data row (header is line 1).
fn line_of(row: usize) -> usize {
    row + 2
}

/// Detect the encoding of raw bytes using chardet
///
/// Valid UTF-8 is taken as is. Other bytes come from Latin-1 or Windows-1252
/// exports, so a label chardet guesses outside that family decodes as
/// Windows-1252.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let (charset, _confidence, _language) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        _ => "windows-1252".to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        // UTF-8, ASCII and anything unrecognized: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text with an explicit delimiter.
pub fn parse_table(content: &str, delimiter: char, encoding: String) -> Result<Table, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CsvError::new(1, format!("Cannot read header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
            CsvError::new(line, format!("Cannot read line: {}", e))
        })?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(record);
    }

    Ok(Table {
        headers,
        rows,
        encoding,
        delimiter,
    })
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<Table, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_table(&content, delimiter, encoding)
}
