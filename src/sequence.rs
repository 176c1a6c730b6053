use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;

use crate::decompress::Decompressor;
use crate::domain::{FieldPath, SpeciesName};
use crate::download::{DownloadOutcome, Downloader};
use crate::error::AssemblyError;
use crate::eutils::{AssemblySummary, EutilsClient};

pub const FTP_PATH_FIELD: &str = "FtpPath_GenBank";
const ARCHIVE_SUFFIX: &str = "_genomic.gbff.gz";

#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    pub species: String,
    pub assembly_id: String,
    pub url: String,
    pub archive_path: String,
    pub sequence_path: Option<String>,
    pub bytes: Option<u64>,
    pub skipped_status: Option<u16>,
    pub fetched_at: String,
}

/// Downloads and unpacks the GenBank flat file of the first assembly found for a species.
pub struct SequenceFetcher<'a, C: EutilsClient, D: Downloader> {
    client: &'a C,
    downloader: &'a D,
    decompressor: &'a Decompressor,
    output_dir: &'a Utf8Path,
}

impl<'a, C: EutilsClient, D: Downloader> SequenceFetcher<'a, C, D> {
    pub fn new(
        client: &'a C,
        downloader: &'a D,
        decompressor: &'a Decompressor,
        output_dir: &'a Utf8Path,
    ) -> Self {
        Self {
            client,
            downloader,
            decompressor,
            output_dir,
        }
    }

    pub fn archive_path(&self, species: &SpeciesName) -> Utf8PathBuf {
        self.output_dir
            .join(format!("{}.gbff.gz", species.file_stem()))
    }

    pub fn fetch(&self, species: &SpeciesName) -> Result<SequenceReport, AssemblyError> {
        let ids = self.client.search(species)?;
        let id = ids
            .first()
            .ok_or_else(|| AssemblyError::NoAssemblies(species.to_string()))?;
        let summary = self.client.summary(id)?;
        let url = archive_url(&ftp_path(&summary)?);
        let archive = self.archive_path(species);

        let mut report = SequenceReport {
            species: species.to_string(),
            assembly_id: id.to_string(),
            url: url.clone(),
            archive_path: archive.to_string(),
            sequence_path: None,
            bytes: None,
            skipped_status: None,
            fetched_at: chrono::Utc::now().to_rfc3339(),
        };

        match self.downloader.download(&url, archive.as_std_path())? {
            DownloadOutcome::Written { bytes } => {
                let output = self.decompressor.decompress(archive.as_std_path())?;
                report.bytes = Some(bytes);
                report.sequence_path = Some(output.to_string_lossy().to_string());
            }
            DownloadOutcome::Skipped { status } => {
                // nothing new on disk, so there is nothing to decompress
                report.skipped_status = Some(status);
            }
        }
        Ok(report)
    }
}

fn ftp_path(summary: &AssemblySummary) -> Result<String, AssemblyError> {
    let path = FieldPath::new([FTP_PATH_FIELD])
        .ok_or_else(|| AssemblyError::MissingFtpPath(summary.id.to_string()))?;
    match summary.lookup(&path) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(AssemblyError::MissingFtpPath(summary.id.to_string())),
    }
}

/// Turns an assembly FTP directory into the HTTPS URL of its GenBank flat file:
/// `ftp://host/.../GCA_1.1_Name` becomes `https://host/.../GCA_1.1_Name/GCA_1.1_Name_genomic.gbff.gz`.
pub fn archive_url(ftp_path: &str) -> String {
    let base = ftp_path.trim_end_matches('/');
    let base = match base.strip_prefix("ftp://") {
        Some(rest) => format!("https://{rest}"),
        None => base.to_string(),
    };
    let name = base.rsplit('/').next().unwrap_or_default();
    format!("{base}/{name}{ARCHIVE_SUFFIX}")
}
