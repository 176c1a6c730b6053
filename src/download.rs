use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::MissingArchivePolicy;
use crate::error::AssemblyError;
use crate::fs_util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Written { bytes: u64 },
    /// The server answered with a non-success status and the policy said to carry on.
    Skipped { status: u16 },
}

pub trait Downloader: Send + Sync {
    /// Streams `url` into `destination`. Nothing is written unless the response succeeded.
    fn download(&self, url: &str, destination: &Path) -> Result<DownloadOutcome, AssemblyError>;
}

#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
    policy: MissingArchivePolicy,
}

impl HttpDownloader {
    pub fn new(
        timeout: Option<Duration>,
        policy: MissingArchivePolicy,
    ) -> Result<Self, AssemblyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-asm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AssemblyError::DownloadHttp(err.to_string()))?,
        );
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            // archives run to gigabytes; the request timeout only bounds connection setup
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| AssemblyError::DownloadHttp(err.to_string()))?;
        Ok(Self { client, policy })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<u64, AssemblyError> {
        let mut temp = fs_util::temp_file_beside(destination, ".kira-asm-download")?;
        let bytes = std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| AssemblyError::DownloadHttp(err.to_string()))?;
        fs_util::persist(temp, destination)?;
        Ok(bytes)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<DownloadOutcome, AssemblyError> {
        tracing::debug!(%url, "download request");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| AssemblyError::DownloadHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return match self.policy {
                MissingArchivePolicy::Fail => Err(AssemblyError::DownloadStatus {
                    status,
                    url: url.to_string(),
                }),
                MissingArchivePolicy::Skip => {
                    tracing::warn!(%url, status, "download skipped, nothing written");
                    Ok(DownloadOutcome::Skipped { status })
                }
            };
        }
        let bytes = self.write_response_to_file(response, destination)?;
        tracing::info!(path = %destination.display(), bytes, "download complete");
        Ok(DownloadOutcome::Written { bytes })
    }
}
