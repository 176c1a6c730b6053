#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Value, json};

use kira_assembly::app::{ProgressEvent, ProgressSink};
use kira_assembly::config::ResolvedConfig;
use kira_assembly::domain::{AssemblyId, SpeciesName};
use kira_assembly::download::{DownloadOutcome, Downloader};
use kira_assembly::error::AssemblyError;
use kira_assembly::eutils::{AssemblySummary, EutilsClient};

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
pub struct MockEutils {
    pub ids: Vec<String>,
    pub documents: HashMap<String, Value>,
    pub summary_calls: Mutex<Vec<String>>,
}

impl MockEutils {
    pub fn new(ids: &[&str], documents: Vec<(&str, Value)>) -> Self {
        Self {
            ids: ids.iter().map(|id| id.to_string()).collect(),
            documents: documents
                .into_iter()
                .map(|(id, doc)| (id.to_string(), doc))
                .collect(),
            summary_calls: Mutex::new(Vec::new()),
        }
    }
}

impl EutilsClient for MockEutils {
    fn search(&self, _species: &SpeciesName) -> Result<Vec<AssemblyId>, AssemblyError> {
        self.ids.iter().map(|id| id.parse()).collect()
    }

    fn summary(&self, id: &AssemblyId) -> Result<AssemblySummary, AssemblyError> {
        self.summary_calls
            .lock()
            .unwrap()
            .push(id.as_str().to_string());
        self.documents
            .get(id.as_str())
            .cloned()
            .map(|doc| AssemblySummary::new(id.clone(), doc))
            .ok_or_else(|| AssemblyError::EmptySummary(id.to_string()))
    }
}

/// Serves a fixed gzip body, or a fixed failure status.
pub struct MockDownloader {
    pub body: Vec<u8>,
    pub status: u16,
    pub skip_on_failure: bool,
    pub urls: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub fn serving(content: &[u8]) -> Self {
        Self {
            body: gzip(content),
            status: 200,
            skip_on_failure: false,
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16, skip_on_failure: bool) -> Self {
        Self {
            body: Vec::new(),
            status,
            skip_on_failure,
            urls: Mutex::new(Vec::new()),
        }
    }
}

impl Downloader for MockDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<DownloadOutcome, AssemblyError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.status != 200 {
            if self.skip_on_failure {
                return Ok(DownloadOutcome::Skipped {
                    status: self.status,
                });
            }
            return Err(AssemblyError::DownloadStatus {
                status: self.status,
                url: url.to_string(),
            });
        }
        std::fs::write(destination, &self.body).unwrap();
        Ok(DownloadOutcome::Written {
            bytes: self.body.len() as u64,
        })
    }
}

pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

pub fn config_in(dir: &Path) -> ResolvedConfig {
    ResolvedConfig {
        output_dir: Utf8PathBuf::from_path_buf(dir.to_path_buf()).unwrap(),
        ..ResolvedConfig::default()
    }
}

pub fn summary_doc(
    contig: u64,
    scaffold: u64,
    coverage: &str,
    sex: &str,
    isolate: &str,
    biosample: &str,
    release: &str,
    ftp: &str,
) -> Value {
    json!({
        "ContigN50": contig,
        "ScaffoldN50": scaffold,
        "Coverage": coverage,
        "Biosource": { "Sex": sex, "Isolate": isolate, "InfraspeciesList": [] },
        "BioSampleId": biosample,
        "AsmReleaseDate_GenBank": release,
        "FtpPath_GenBank": ftp,
    })
}

pub fn test_organism_eutils() -> MockEutils {
    MockEutils::new(
        &["111", "222"],
        vec![
            (
                "111",
                summary_doc(100, 150, "30x", "male", "A", "S1", "2020-01-01", "ftp://ftp.example.org/genomes/asm1"),
            ),
            (
                "222",
                summary_doc(200, 250, "40x", "female", "B", "S2", "2021-01-01", "ftp://ftp.example.org/genomes/asm2"),
            ),
        ],
    )
}
