use serde::Serialize;
use serde_json::Value;

use crate::domain::FieldSpec;
use crate::error::AssemblyError;
use crate::eutils::AssemblySummary;

/// Values extracted from one summary, one per requested column, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRow {
    values: Vec<String>,
}

impl DataRow {
    pub fn extract(summary: &AssemblySummary, fields: &[FieldSpec]) -> Result<Self, AssemblyError> {
        let values = fields
            .iter()
            .map(|field| {
                summary
                    .lookup(&field.path)
                    .map(render_value)
                    .ok_or_else(|| AssemblyError::MissingField {
                        id: summary.id.to_string(),
                        field: field.path.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Joins the values without a trailing delimiter.
    pub fn to_line(&self, delimiter: char) -> String {
        let cells: Vec<String> = self
            .values
            .iter()
            .map(|value| sanitize_cell(value, delimiter))
            .collect();
        cells.join(&delimiter.to_string())
    }
}

/// Column names are written verbatim, so none may contain the delimiter or a line break.
pub fn check_column_names(fields: &[FieldSpec], delimiter: char) -> Result<(), AssemblyError> {
    match fields.iter().find(|field| breaks_cell(&field.name, delimiter)) {
        Some(field) => Err(AssemblyError::InvalidColumnName {
            name: field.name.clone(),
            delimiter,
        }),
        None => Ok(()),
    }
}

pub fn header_line(fields: &[FieldSpec], delimiter: char) -> String {
    fields
        .iter()
        .map(|field| field.name.as_str())
        .collect::<Vec<_>>()
        .join(&delimiter.to_string())
}

/// Renders the header and one line per row, newline-separated, without a final newline.
pub fn render_table(fields: &[FieldSpec], rows: &[DataRow], delimiter: char) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header_line(fields, delimiter));
    lines.extend(rows.iter().map(|row| row.to_line(delimiter)));
    lines.join("\n")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn breaks_cell(value: &str, delimiter: char) -> bool {
    value.contains(|ch: char| ch == delimiter || ch == '\n' || ch == '\r')
}

// delimiter and line breaks inside a value would shift columns
fn sanitize_cell(value: &str, delimiter: char) -> String {
    if !breaks_cell(value, delimiter) {
        return value.to_string();
    }
    value
        .chars()
        .map(|ch| {
            if ch == delimiter || ch == '\n' || ch == '\r' {
                ' '
            } else {
                ch
            }
        })
        .collect()
}
