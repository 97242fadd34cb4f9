//! Named-column tables built from a single record or an uploaded CSV file.

use std::fmt;

use crate::error::{ParseError, SchemaError};
use crate::models::{StarRecord, REQUIRED_COLUMNS};

/// A scalar cell. Values are kept as uploaded; nothing is coerced here.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Zero-based position in the submitted table.
    pub index: usize,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StarTable {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl StarTable {
    pub fn from_record(record: &StarRecord) -> Self {
        Self {
            columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: vec![TableRow {
                index: 0,
                cells: record.features().into_iter().map(Cell::Number).collect(),
            }],
        }
    }

    /// Parses comma-separated bytes with a header row. Header names are kept
    /// byte-for-byte since schema matching is exact.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::None)
            .from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| ParseError::new(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Err(ParseError::new("the uploaded file is empty"));
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ParseError::new(e.to_string()))?;
            rows.push(TableRow {
                index,
                cells: record.iter().map(Cell::parse).collect(),
            });
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Passes the table through if every required column is present.
    /// Extra columns are fine.
    pub fn validate_schema(&self) -> Result<&Self, SchemaError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| self.column_index(required).is_none())
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(self)
        } else {
            Err(SchemaError { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TEMPERATURE;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Temperature (K),Luminosity(L/Lo),Radius(R/Ro),Absolute magnitude(Mv)";

    #[test]
    fn parses_header_and_rows_in_order() {
        let csv = format!("{HEADER}\n3068,0.0024,0.17,16.12\n25000,0.056,0.0084,10.58\n");
        let table = StarTable::from_csv(csv.as_bytes()).unwrap();

        assert_eq!(table.columns(), &REQUIRED_COLUMNS.map(String::from));
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].index, 1);
        assert_eq!(table.rows()[1].cells[0], Cell::Number(25000.0));
    }

    #[test]
    fn keeps_column_names_exactly() {
        let csv = "Temperature (K) ,Luminosity(L/Lo)\n1,2\n";
        let table = StarTable::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.column_index("Temperature (K) "), Some(0));
        assert_eq!(table.column_index(TEMPERATURE), None);
    }

    #[test]
    fn non_numeric_cells_are_kept_as_text() {
        let csv = format!("{HEADER}\nhot,1,1,4.8\n");
        let table = StarTable::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.rows()[0].cells[0], Cell::Text("hot".into()));
        assert_eq!(table.rows()[0].cells[3].as_number(), Some(4.8));
    }

    #[test]
    fn cells_display_as_uploaded() {
        assert_eq!(Cell::Number(0.0024).to_string(), "0.0024");
        assert_eq!(Cell::Number(3068.0).to_string(), "3068");
        assert_eq!(Cell::Text("hot".into()).to_string(), "hot");
    }

    #[test]
    fn ragged_rows_are_a_parse_error() {
        let csv = format!("{HEADER}\n1,2,3\n");
        assert!(StarTable::from_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn empty_upload_is_a_parse_error() {
        assert!(StarTable::from_csv(b"").is_err());
    }

    #[test]
    fn schema_accepts_extra_columns() {
        let csv = format!("Star color,{HEADER}\nRed,3068,0.0024,0.17,16.12\n");
        let table = StarTable::from_csv(csv.as_bytes()).unwrap();
        assert!(table.validate_schema().is_ok());
    }

    #[test]
    fn schema_reports_missing_columns() {
        let csv = "Temperature (K),Luminosity(L/Lo),Radius(R/Ro)\n1,2,3\n";
        let table = StarTable::from_csv(csv.as_bytes()).unwrap();
        let err = table.validate_schema().unwrap_err();
        assert_eq!(err.missing, vec!["Absolute magnitude(Mv)".to_string()]);
    }

    #[test]
    fn single_record_becomes_one_row_table() {
        let record = StarRecord {
            temperature: 6000.0,
            luminosity: 1.0,
            radius: 1.0,
            absolute_magnitude: 4.83,
        };
        let table = StarTable::from_record(&record);
        assert!(table.validate_schema().is_ok());
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].cells[3], Cell::Number(4.83));
    }
}
