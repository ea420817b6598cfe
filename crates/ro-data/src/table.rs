//! In-memory columnar event tables and their file loaders.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ro_types::{DataError, EvaluationError, EventSource, RoResult};

use crate::expr::Expression;

/// Named `f64` columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTable {
    name: String,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    num_events: usize,
}

impl ColumnTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add or replace a column. The first column fixes the event count.
    pub fn with_column(
        mut self,
        column: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, EvaluationError> {
        let column = column.into();
        if !self.names.is_empty() && values.len() != self.num_events {
            return Err(EvaluationError::RaggedColumn {
                column,
                expected: self.num_events,
                actual: values.len(),
            });
        }
        self.num_events = values.len();
        match self.names.iter().position(|n| *n == column) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(column);
                self.columns.push(values);
            }
        }
        Ok(self)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }
}

impl EventSource for ColumnTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_events(&self) -> usize {
        self.num_events
    }

    fn has_column(&self, column: &str) -> bool {
        self.names.iter().any(|n| n == column)
    }

    fn column_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn evaluate(&self, expression: &str) -> Result<Vec<f64>, EvaluationError> {
        let parsed = Expression::parse(expression)?;
        let mut slices = Vec::with_capacity(parsed.columns().len());
        let mut missing = Vec::new();
        for name in parsed.columns() {
            match self.column(name) {
                Some(values) => slices.push(values),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(EvaluationError::MissingColumns {
                source_name: self.name.clone(),
                columns: missing,
            });
        }
        Ok(parsed.evaluate_columns(&slices, self.num_events))
    }
}

/// Event file formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Header row of column names, one event per row. Holds a single table.
    Csv,
    /// `{"<tree>": {"<column>": [values...]}}`; may hold several tables.
    Json,
}

impl DataFormat {
    pub fn detect<P: AsRef<Path>>(path: P) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?;
        match extension.to_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "json" => Some(DataFormat::Json),
            _ => None,
        }
    }
}

/// Load the table named `tree_name` from an event file.
pub fn load_table<P: AsRef<Path>>(path: P, tree_name: &str) -> RoResult<ColumnTable> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::InputNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let table = match DataFormat::detect(path) {
        Some(DataFormat::Csv) => load_csv(path)?,
        Some(DataFormat::Json) => load_json(path, tree_name)?,
        None => {
            return Err(DataError::InvalidFormat {
                path: path.display().to_string(),
                message: "unrecognized extension (expected .csv or .json)".to_string(),
            }
            .into())
        }
    };

    tracing::debug!(
        path = %path.display(),
        events = table.num_events(),
        columns = table.names.len(),
        "Loaded event table"
    );
    Ok(table)
}

fn invalid(path: &Path, message: impl Into<String>) -> DataError {
    DataError::InvalidFormat {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn load_csv(path: &Path) -> RoResult<ColumnTable> {
    use csv::ReaderBuilder;

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open CSV file {}: {}", path.display(), e),
        })?;

    let headers = rdr
        .headers()
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read CSV headers: {}", e),
        })?
        .clone();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read CSV record at line {}: {}", line_num + 2, e),
        })?;
        for (i, field) in record.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| {
                invalid(
                    path,
                    format!(
                        "non-numeric value `{}` in column {} at line {}",
                        field,
                        headers.get(i).unwrap_or("?"),
                        line_num + 2
                    ),
                )
            })?;
            columns[i].push(value);
        }
    }

    let name = path.display().to_string();
    headers
        .iter()
        .zip(columns)
        .try_fold(ColumnTable::new(name), |table, (header, values)| {
            table.with_column(header, values)
        })
        .map_err(|e| invalid(path, e.to_string()).into())
}

#[derive(Deserialize)]
#[serde(transparent)]
struct JsonTables(BTreeMap<String, BTreeMap<String, Vec<f64>>>);

fn load_json(path: &Path, tree_name: &str) -> RoResult<ColumnTable> {
    let text = fs::read_to_string(path)?;
    let JsonTables(mut tables) =
        serde_json::from_str(&text).map_err(|e| invalid(path, e.to_string()))?;

    let columns = tables
        .remove(tree_name)
        .ok_or_else(|| invalid(path, format!("no table named `{tree_name}`")))?;

    let name = format!("{}:{}", path.display(), tree_name);
    columns
        .into_iter()
        .try_fold(ColumnTable::new(name), |table, (column, values)| {
            table.with_column(column, values)
        })
        .map_err(|e| invalid(path, e.to_string()).into())
}
