use crate::error::{PrepError, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Cell values treated as missing when reading CSV input.
pub const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// A single named column of a [`Dataset`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Bin labels become a numeric column; unassigned rows stay missing.
    pub fn from_labels(labels: &[Option<usize>]) -> Self {
        Column::Numeric(labels.iter().map(|l| l.map(|v| v as f64)).collect())
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Numeric(v) => v[row].map(format_number).unwrap_or_default(),
            Column::Text(v) => v[row].clone().unwrap_or_default(),
        }
    }
}

/// Non-missing values of a numeric column, in row order.
pub fn present_values(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter_map(|v| *v).filter(|v| !v.is_nan()).collect()
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Column-ordered table of named features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<(String, Column)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let data = Self::from_csv_reader(file)?;
        debug!(
            "Loaded {} rows x {} columns from {}",
            data.n_rows(),
            data.n_columns(),
            path.display()
        );
        Ok(data)
    }

    /// Read CSV with a header row. A column is numeric when every present
    /// cell parses as a float.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = dedupe_headers(rdr.headers()?.iter().map(str::to_string).collect());

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record?;
            for (idx, cells) in raw.iter_mut().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                cells.push((!is_missing(cell)).then(|| cell.to_string()));
            }
        }

        let mut data = Dataset::new();
        for (name, cells) in headers.into_iter().zip(raw) {
            let parsed: Option<Vec<Option<f64>>> = cells
                .iter()
                .map(|c| match c {
                    Some(s) => s.parse::<f64>().ok().map(Some),
                    None => Some(None),
                })
                .collect();
            let column = match parsed {
                Some(values) => Column::Numeric(values),
                None => Column::Text(cells),
            };
            data.set_column(name, column)?;
        }
        Ok(data)
    }

    pub fn to_csv_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.to_csv_writer(file)
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|(name, _)| name.as_str()))?;
        for row in 0..self.n_rows() {
            wtr.write_record(self.columns.iter().map(|(_, col)| col.cell(row)))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| PrepError::UnknownColumn(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        self.column(name)?
            .as_numeric()
            .ok_or_else(|| PrepError::NotNumeric {
                column: name.to_string(),
            })
    }

    /// Replace a column in place, or append it when the name is new.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            let replacing_only_column = self.columns.len() == 1 && self.columns[0].0 == name;
            if !replacing_only_column {
                return Err(PrepError::LengthMismatch {
                    column: name,
                    expected: self.n_rows(),
                    actual: column.len(),
                });
            }
        }
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    /// Remove the named columns; names that are not present are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        self.columns.retain(|(n, _)| !names.contains(&n.as_str()));
    }

    pub fn numeric_features(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, c)| c.is_numeric())
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn non_numeric_features(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, c)| !c.is_numeric())
            .map(|(n, _)| n.clone())
            .collect()
    }
}

/// Repeated header names become `name.1`, `name.2`, ... skipping any
/// suffix already taken by another header.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = headers.iter().cloned().collect();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());
    for name in headers {
        let renamed = match seen.get(&name).copied() {
            None => name.clone(),
            Some(mut suffix) => {
                while used.contains(&format!("{}.{}", name, suffix)) {
                    suffix += 1;
                }
                seen.insert(name.clone(), suffix + 1);
                let renamed = format!("{}.{}", name, suffix);
                warn!("Duplicate column '{}' renamed to '{}'", name, renamed);
                used.insert(renamed.clone());
                renamed
            }
        };
        seen.entry(name).or_insert(1);
        out.push(renamed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Region,ACR,Members\nnorth,1.5,10\nsouth,,12\n,2.25,NA\n";

    #[test]
    fn test_csv_type_inference() {
        let data = Dataset::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(data.n_rows(), 3);
        assert_eq!(data.numeric_features(), vec!["ACR", "Members"]);
        assert_eq!(data.non_numeric_features(), vec!["Region"]);
        assert_eq!(data.numeric("ACR").unwrap(), &[Some(1.5), None, Some(2.25)]);
        assert_eq!(
            data.column("Region").unwrap(),
            &Column::Text(vec![Some("north".into()), Some("south".into()), None])
        );
    }

    #[test]
    fn test_duplicate_headers_are_renamed() {
        let data = Dataset::from_csv_reader("x,x,y,x\n1,2,3,4\n".as_bytes()).unwrap();
        assert_eq!(data.column_names(), vec!["x", "x.1", "y", "x.2"]);
        assert_eq!(data.numeric("x.1").unwrap(), &[Some(2.0)]);
        assert_eq!(data.numeric("x.2").unwrap(), &[Some(4.0)]);

        let data = Dataset::from_csv_reader("a,a.1,a\n1,2,3\n".as_bytes()).unwrap();
        assert_eq!(data.column_names(), vec!["a", "a.1", "a.2"]);
    }

    #[test]
    fn test_numeric_lookup_errors() {
        let data = Dataset::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert!(matches!(data.numeric("Region"), Err(PrepError::NotNumeric { .. })));
        assert!(matches!(data.column("Missing"), Err(PrepError::UnknownColumn(_))));
    }

    #[test]
    fn test_set_column_checks_length() {
        let mut data = Dataset::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let err = data.set_column("Extra", Column::Numeric(vec![Some(1.0)]));
        assert!(matches!(err, Err(PrepError::LengthMismatch { expected: 3, actual: 1, .. })));

        data.set_column("ACR", Column::Numeric(vec![Some(0.0); 3])).unwrap();
        assert_eq!(data.column_names(), vec!["Region", "ACR", "Members"]);
    }

    #[test]
    fn test_drop_and_write_csv() {
        let mut data = Dataset::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        data.drop_columns(&["Region", "NotThere"]);
        let mut out = Vec::new();
        data.to_csv_writer(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ACR,Members\n1.5,10\n,12\n2.25,\n");
    }

    #[test]
    fn test_present_values_skips_missing() {
        assert_eq!(present_values(&[Some(1.0), None, Some(f64::NAN), Some(3.0)]), vec![1.0, 3.0]);
    }
}
