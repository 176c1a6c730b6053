mod common;

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use kira_assembly::app::App;
use kira_assembly::decompress::Decompressor;
use kira_assembly::domain::{FieldPath, MissingArchivePolicy, SpeciesName};
use kira_assembly::download::{DownloadOutcome, Downloader, HttpDownloader};
use kira_assembly::error::AssemblyError;
use kira_assembly::eutils::{EutilsClient, EutilsConfig, EutilsHttpClient};

use common::{config_in, gzip};

const EMAIL: &str = "dev@example.org";

/// Local HTTP server driven from blocking tests.
struct Stub {
    server: MockServer,
    runtime: Runtime,
}

impl Stub {
    fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn uri(&self) -> String {
        self.server.uri()
    }

    fn requests(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }
}

fn eutils_config(stub: &Stub) -> EutilsConfig {
    EutilsConfig {
        base_url: stub.uri(),
        email: Some(EMAIL.to_string()),
        timeout: Some(Duration::from_secs(5)),
        ..EutilsConfig::default()
    }
}

fn query(request: &Request) -> HashMap<String, String> {
    request
        .url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[test]
fn search_sends_assembly_query_with_contact_params() {
    let stub = Stub::start();
    stub.mount(
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("db", "assembly"))
            .and(query_param("term", "Test Organism[Organism]"))
            .and(query_param("retmax", "20"))
            .and(query_param("retmode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "esearchresult": { "count": "2", "idlist": ["222", "111"] }
            }))),
    );
    let client = EutilsHttpClient::new(eutils_config(&stub)).unwrap();
    let species: SpeciesName = "Test Organism".parse().unwrap();

    let ids = client.search(&species).unwrap();

    let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
    assert_eq!(ids, ["222", "111"]);
    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let params = query(&requests[0]);
    assert_eq!(params["tool"], "kira-asm");
    assert_eq!(params["email"], EMAIL);
    assert!(!params.contains_key("api_key"));
}

#[test]
fn summary_carries_api_key_and_reads_first_document() {
    let stub = Stub::start();
    stub.mount(
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("db", "assembly"))
            .and(query_param("id", "57879411"))
            .and(query_param("retmode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "uids": ["57879411"],
                    "57879411": { "uid": "57879411", "contign50": 67794873 }
                }
            }))),
    );
    let config = EutilsConfig {
        api_key: Some("k123".to_string()),
        ..eutils_config(&stub)
    };
    let client = EutilsHttpClient::new(config).unwrap();

    let summary = client.summary(&"57879411".parse().unwrap()).unwrap();

    let field: FieldPath = "ContigN50".parse().unwrap();
    assert_eq!(summary.lookup(&field), Some(&json!(67794873)));
    let params = query(&stub.requests()[0]);
    assert_eq!(params["tool"], "kira-asm");
    assert_eq!(params["email"], EMAIL);
    assert_eq!(params["api_key"], "k123");
}

#[test]
fn unavailable_service_is_retried() {
    let stub = Stub::start();
    stub.mount(
        Mock::given(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1),
    );
    stub.mount(
        Mock::given(path("/esearch.fcgi")).respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "esearchresult": { "idlist": ["7"] } })),
        ),
    );
    let client = EutilsHttpClient::new(eutils_config(&stub)).unwrap();

    let ids = client.search(&"Test Organism".parse().unwrap()).unwrap();

    assert_eq!(ids.len(), 1);
    assert_eq!(stub.requests().len(), 2);
}

#[test]
fn client_error_status_is_not_retried() {
    let stub = Stub::start();
    stub.mount(
        Mock::given(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request")),
    );
    let client = EutilsHttpClient::new(eutils_config(&stub)).unwrap();

    let err = client.search(&"Test Organism".parse().unwrap()).unwrap_err();

    assert_matches!(err, AssemblyError::EutilsStatus { status: 400, message } if message == "bad request");
    assert_eq!(stub.requests().len(), 1);
}

#[test]
fn download_streams_body_into_destination() {
    let stub = Stub::start();
    let body = gzip(b"LOCUS       CM000001\n//\n");
    stub.mount(
        Mock::given(method("GET"))
            .and(path("/asm1/asm1_genomic.gbff.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone())),
    );
    let temp = tempfile::tempdir().unwrap();
    let destination = temp.path().join("test_organism.gbff.gz");
    let downloader = HttpDownloader::new(None, MissingArchivePolicy::Fail).unwrap();

    let outcome = downloader
        .download(&format!("{}/asm1/asm1_genomic.gbff.gz", stub.uri()), &destination)
        .unwrap();

    assert_eq!(outcome, DownloadOutcome::Written { bytes: body.len() as u64 });
    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn missing_archive_fails_and_writes_nothing() {
    let stub = Stub::start();
    stub.mount(Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)));
    let temp = tempfile::tempdir().unwrap();
    let url = format!("{}/asm1/asm1_genomic.gbff.gz", stub.uri());
    let downloader = HttpDownloader::new(None, MissingArchivePolicy::Fail).unwrap();

    let err = downloader
        .download(&url, &temp.path().join("test_organism.gbff.gz"))
        .unwrap_err();

    assert_matches!(err, AssemblyError::DownloadStatus { status: 404, url: failed } if failed == url);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn missing_archive_is_skipped_when_asked() {
    let stub = Stub::start();
    stub.mount(Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)));
    let temp = tempfile::tempdir().unwrap();
    let downloader = HttpDownloader::new(None, MissingArchivePolicy::Skip).unwrap();

    let outcome = downloader
        .download(
            &format!("{}/asm1/asm1_genomic.gbff.gz", stub.uri()),
            &temp.path().join("test_organism.gbff.gz"),
        )
        .unwrap();

    assert_eq!(outcome, DownloadOutcome::Skipped { status: 404 });
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn failed_download_leaves_existing_archive_untouched() {
    let stub = Stub::start();
    stub.mount(Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)));
    let temp = tempfile::tempdir().unwrap();
    let destination = temp.path().join("test_organism.gbff.gz");
    fs::write(&destination, b"previous").unwrap();
    let downloader = HttpDownloader::new(None, MissingArchivePolicy::Fail).unwrap();

    let err = downloader
        .download(&format!("{}/asm1/asm1_genomic.gbff.gz", stub.uri()), &destination)
        .unwrap_err();

    assert_matches!(err, AssemblyError::DownloadStatus { status: 500, .. });
    assert_eq!(fs::read(&destination).unwrap(), b"previous");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn sequence_runs_end_to_end_over_http() {
    let stub = Stub::start();
    let ftp_path = format!("{}/genomes/all/asm1", stub.uri());
    stub.mount(
        Mock::given(path("/esearch.fcgi")).respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "esearchresult": { "idlist": ["111", "222"] } })),
        ),
    );
    stub.mount(
        Mock::given(path("/esummary.fcgi"))
            .and(query_param("id", "111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "uids": ["111"],
                    "111": { "ftppath_genbank": ftp_path }
                }
            }))),
    );
    stub.mount(
        Mock::given(path("/genomes/all/asm1/asm1_genomic.gbff.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(b"LOCUS\n//\n"))),
    );
    let temp = tempfile::tempdir().unwrap();
    let mut config = config_in(temp.path());
    config.eutils = eutils_config(&stub);
    let eutils = EutilsHttpClient::new(config.eutils.clone()).unwrap();
    let downloader = HttpDownloader::new(None, MissingArchivePolicy::Fail).unwrap();
    let app = App::with_decompressor(config, eutils, downloader, Decompressor::Builtin);
    let species: SpeciesName = "Test Organism".parse().unwrap();

    let report = app.sequence(&species, &common::NoopSink).unwrap();

    assert_eq!(report.assembly_id, "111");
    assert_eq!(
        fs::read(temp.path().join("test_organism.gbff")).unwrap(),
        b"LOCUS\n//\n"
    );
    assert!(!temp.path().join("test_organism.gbff.gz").exists());
    let summary_requests = stub
        .requests()
        .iter()
        .filter(|request| request.url.path() == "/esummary.fcgi")
        .count();
    assert_eq!(summary_requests, 1);
}
