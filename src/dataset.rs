use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{FieldSpec, SpeciesName};
use crate::error::AssemblyError;
use crate::eutils::EutilsClient;
use crate::formatter::{DataRow, check_column_names, render_table};
use crate::fs_util;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub species: String,
    pub path: String,
    pub identifiers: Vec<String>,
    pub columns: Vec<String>,
    pub generated_at: String,
}

/// Builds the per-species assembly table: search, fetch every summary, then format.
pub struct DatasetGenerator<'a, C: EutilsClient> {
    client: &'a C,
    columns: &'a [FieldSpec],
    delimiter: char,
    output_dir: &'a Utf8Path,
}

impl<'a, C: EutilsClient> DatasetGenerator<'a, C> {
    pub fn new(
        client: &'a C,
        columns: &'a [FieldSpec],
        delimiter: char,
        output_dir: &'a Utf8Path,
    ) -> Self {
        Self {
            client,
            columns,
            delimiter,
            output_dir,
        }
    }

    pub fn output_path(&self, species: &SpeciesName) -> Utf8PathBuf {
        self.output_dir.join(format!("{}.txt", species.file_stem()))
    }

    /// Writes `<output_dir>/<stem>.txt`. The file is replaced in one rename
    /// after every row has been formatted, so a failure leaves any previous
    /// table untouched.
    pub fn generate(&self, species: &SpeciesName) -> Result<DatasetReport, AssemblyError> {
        check_column_names(self.columns, self.delimiter)?;
        let ids = self.client.search(species)?;

        let summaries = ids
            .iter()
            .map(|id| self.client.summary(id))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = summaries
            .iter()
            .map(|summary| DataRow::extract(summary, self.columns))
            .collect::<Result<Vec<_>, _>>()?;

        let text = render_table(self.columns, &rows, self.delimiter);
        let path = self.output_path(species);
        fs_util::write_atomic(path.as_std_path(), text.as_bytes())?;
        tracing::info!(%path, rows = rows.len(), "dataset written");

        Ok(DatasetReport {
            species: species.to_string(),
            path: path.to_string(),
            identifiers: ids.iter().map(ToString::to_string).collect(),
            columns: self.columns.iter().map(|field| field.name.clone()).collect(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
