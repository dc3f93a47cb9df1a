//! Spreadsheet parsing: first worksheet (or the CSV body) into a header list
//! plus one JSON object per data row, keyed by header.

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::io::Cursor;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug)]
pub enum SheetError {
    Unsupported(String),
    Empty,
    Csv(csv::Error),
    Workbook(String),
}

impl std::fmt::Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetError::Unsupported(ext) => write!(f, "Unsupported file type: {ext}"),
            SheetError::Empty => write!(f, "Spreadsheet is empty"),
            SheetError::Csv(e) => write!(f, "CSV error: {e}"),
            SheetError::Workbook(e) => write!(f, "Workbook error: {e}"),
        }
    }
}

impl std::error::Error for SheetError {}

/// Parse `bytes` according to `ext` (`.csv`, `.xlsx`, `.xls`, with or without the dot).
pub fn parse(bytes: &[u8], ext: &str) -> Result<Table, SheetError> {
    let ext = ext.trim_start_matches('.').to_lowercase();
    match ext.as_str() {
        "csv" => parse_csv(bytes),
        "xlsx" | "xls" => parse_workbook(bytes),
        other => Err(SheetError::Unsupported(other.to_string())),
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Table, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(SheetError::Csv)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if raw_headers.iter().all(String::is_empty) {
        return Err(SheetError::Empty);
    }
    let headers = dedupe_headers(raw_headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(SheetError::Csv)?;
        let cells = record.iter().map(csv_cell);
        if let Some(row) = build_row(&headers, cells) {
            rows.push(row);
        }
    }

    Ok(Table { headers, rows })
}

fn parse_workbook(bytes: &[u8]) -> Result<Table, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SheetError::Workbook(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::Empty)?
        .map_err(|e| SheetError::Workbook(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let header_row = sheet_rows.next().ok_or(SheetError::Empty)?;
    let raw_headers: Vec<String> = header_row
        .iter()
        .map(|c| match c {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        })
        .collect();
    if raw_headers.iter().all(String::is_empty) {
        return Err(SheetError::Empty);
    }
    let headers = dedupe_headers(raw_headers);

    let rows = sheet_rows
        .filter_map(|r| build_row(&headers, r.iter().map(workbook_cell)))
        .collect();

    Ok(Table { headers, rows })
}

/// Blank headers become `__EMPTY`, `__EMPTY_1`, ...; repeats get `_1`, `_2`, ... suffixes.
fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for h in raw {
        let base = if h.is_empty() { "__EMPTY".to_string() } else { h };
        let mut candidate = base.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// `None` when every cell in the row is empty.
fn build_row(headers: &[String], cells: impl Iterator<Item = Option<Value>>) -> Option<Row> {
    let mut row = Map::new();
    for (header, cell) in headers.iter().zip(cells) {
        if let Some(value) = cell {
            row.insert(header.clone(), value);
        }
    }
    (!row.is_empty()).then_some(row)
}

fn csv_cell(raw: &str) -> Option<Value> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    if let Ok(f) = s.parse::<f64>()
        && let Some(n) = Number::from_f64(f)
    {
        return Some(Value::Number(n));
    }
    if s.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if s.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    Some(Value::String(s.to_string()))
}

fn workbook_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::Int(i) => Some(Value::Number((*i).into())),
        Data::Float(f) => Some(float_value(*f)),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        other => Some(Value::String(other.to_string())),
    }
}

/// Whole floats come back as integers so `3.0` in a sheet reads as `3`.
fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Value::Number((f as i64).into());
    }
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_rows_are_keyed_by_header() {
        let table = parse(b"month,sales,region\nJan,10,North\nFeb,12.5,South\n", ".csv").unwrap();
        assert_eq!(table.headers, vec!["month", "sales", "region"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(Value::Object(table.rows[0].clone()), json!({"month": "Jan", "sales": 10, "region": "North"}));
        assert_eq!(table.rows[1]["sales"], json!(12.5));
    }

    #[test]
    fn csv_skips_blank_rows_and_omits_empty_cells() {
        let table = parse(b"a,b\n1,\n,\n,2\n", "csv").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(Value::Object(table.rows[0].clone()), json!({"a": 1}));
        assert_eq!(Value::Object(table.rows[1].clone()), json!({"b": 2}));
    }

    #[test]
    fn csv_booleans_and_ragged_rows() {
        let table = parse(b"flag,n\nTRUE,1,extra\nfalse\n", ".CSV").unwrap();
        assert_eq!(table.rows[0]["flag"], json!(true));
        assert_eq!(table.rows[0]["n"], json!(1));
        assert_eq!(table.rows[1]["flag"], json!(false));
        assert!(!table.rows[1].contains_key("n"));
    }

    #[test]
    fn csv_header_only_has_no_rows() {
        let table = parse(b"x,y\n", ".csv").unwrap();
        assert_eq!(table.headers, vec!["x", "y"]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn empty_csv_is_an_error() {
        assert!(matches!(parse(b"", ".csv"), Err(SheetError::Empty)));
    }

    #[test]
    fn unsupported_extension() {
        assert!(matches!(parse(b"whatever", ".txt"), Err(SheetError::Unsupported(e)) if e == "txt"));
    }

    #[test]
    fn duplicate_and_blank_headers_are_renamed() {
        assert_eq!(
            dedupe_headers(vec!["a".into(), "a".into(), "".into(), "".into(), "a".into()]),
            vec!["a", "a_1", "__EMPTY", "__EMPTY_1", "a_2"]
        );
    }

    #[test]
    fn xlsx_first_sheet_is_parsed() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "city").unwrap();
        sheet.write_string(0, 1, "temp").unwrap();
        sheet.write_string(1, 0, "Oslo").unwrap();
        sheet.write_number(1, 1, 4.0).unwrap();
        sheet.write_string(2, 0, "Rome").unwrap();
        sheet.write_number(2, 1, 17.5).unwrap();
        let second = workbook.add_worksheet();
        second.write_string(0, 0, "ignored").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = parse(&bytes, ".xlsx").unwrap();
        assert_eq!(table.headers, vec!["city", "temp"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(Value::Object(table.rows[0].clone()), json!({"city": "Oslo", "temp": 4}));
        assert_eq!(table.rows[1]["temp"], json!(17.5));
    }

    #[test]
    fn garbage_workbook_is_an_error() {
        assert!(matches!(
            parse(b"definitely not a zip", ".xlsx"),
            Err(SheetError::Workbook(_))
        ));
    }
}
