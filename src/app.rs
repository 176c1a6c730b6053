use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::dataset::{DatasetGenerator, DatasetReport};
use crate::decompress::Decompressor;
use crate::domain::{AssemblyId, SpeciesName};
use crate::download::Downloader;
use crate::error::AssemblyError;
use crate::eutils::EutilsClient;
use crate::formatter::DataRow;
use crate::sequence::{SequenceFetcher, SequenceReport};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub species: String,
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub id: String,
    pub fields: Vec<FieldValue>,
    pub document: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: EutilsClient, D: Downloader> {
    config: ResolvedConfig,
    eutils: C,
    downloader: D,
    decompressor: Decompressor,
}

impl<C: EutilsClient, D: Downloader> App<C, D> {
    pub fn new(config: ResolvedConfig, eutils: C, downloader: D) -> Self {
        let decompressor = Decompressor::new(config.decompressor);
        Self::with_decompressor(config, eutils, downloader, decompressor)
    }

    pub fn with_decompressor(
        config: ResolvedConfig,
        eutils: C,
        downloader: D,
        decompressor: Decompressor,
    ) -> Self {
        Self {
            config,
            eutils,
            downloader,
            decompressor,
        }
    }

    pub fn dataset(
        &self,
        species: &SpeciesName,
        sink: &dyn ProgressSink,
    ) -> Result<DatasetReport, AssemblyError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; assemblies for {species}"),
            elapsed: None,
        });
        let start = Instant::now();
        let generator = DatasetGenerator::new(
            &self.eutils,
            &self.config.columns,
            self.config.delimiter,
            &self.config.output_dir,
        );
        let report = generator.generate(species)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; wrote {} rows to {}",
                report.identifiers.len(),
                report.path
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(report)
    }

    pub fn sequence(
        &self,
        species: &SpeciesName,
        sink: &dyn ProgressSink,
    ) -> Result<SequenceReport, AssemblyError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; first assembly for {species}"),
            elapsed: None,
        });
        let start = Instant::now();
        let fetcher = SequenceFetcher::new(
            &self.eutils,
            &self.downloader,
            &self.decompressor,
            &self.config.output_dir,
        );
        let report = fetcher.fetch(species)?;
        let message = match (&report.sequence_path, report.skipped_status) {
            (Some(path), _) => format!("phase=Store; sequence at {path}"),
            (None, Some(status)) => format!("phase=Store; download skipped (status {status})"),
            (None, None) => "phase=Store; nothing written".to_string(),
        };
        sink.event(ProgressEvent {
            message,
            elapsed: Some(start.elapsed()),
        });
        Ok(report)
    }

    pub fn search(
        &self,
        species: &SpeciesName,
        sink: &dyn ProgressSink,
    ) -> Result<SearchResult, AssemblyError> {
        sink.event(ProgressEvent {
            message: format!("eutils.esearch {}", species.organism_term()),
            elapsed: None,
        });
        let ids = self.eutils.search(species)?;
        Ok(SearchResult {
            species: species.to_string(),
            identifiers: ids.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn summary(
        &self,
        id: &AssemblyId,
        sink: &dyn ProgressSink,
    ) -> Result<SummaryResult, AssemblyError> {
        sink.event(ProgressEvent {
            message: format!("eutils.esummary {id}"),
            elapsed: None,
        });
        let summary = self.eutils.summary(id)?;
        let row = DataRow::extract(&summary, &self.config.columns)?;
        let fields = self
            .config
            .columns
            .iter()
            .zip(row.values())
            .map(|(field, value)| FieldValue {
                name: field.name.clone(),
                value: value.clone(),
            })
            .collect();
        Ok(SummaryResult {
            id: id.to_string(),
            fields,
            document: summary.document,
        })
    }
}
