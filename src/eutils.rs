use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{AssemblyId, FieldPath, SpeciesName};
use crate::error::AssemblyError;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_RETMAX: u32 = 20;
const ASSEMBLY_DB: &str = "assembly";

/// Connection and contact settings for NCBI E-utilities.
///
/// `tool`, `email` and `api_key` are sent with every request, as NCBI asks
/// of E-utilities clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EutilsConfig {
    pub base_url: String,
    pub tool: String,
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub retmax: u32,
    pub timeout: Option<Duration>,
}

impl Default for EutilsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            tool: "kira-asm".to_string(),
            email: None,
            api_key: None,
            retmax: DEFAULT_RETMAX,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl EutilsConfig {
    /// NCBI allows 3 requests per second without an API key and 10 with one.
    fn min_interval(&self) -> Duration {
        if self.api_key.is_some() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(340)
        }
    }
}

/// One assembly document summary as returned by esummary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblySummary {
    pub id: AssemblyId,
    pub document: Value,
}

impl AssemblySummary {
    pub fn new(id: AssemblyId, document: Value) -> Self {
        Self { id, document }
    }

    /// Walks `path` through nested objects. Exact key matches win over
    /// ASCII case-insensitive ones, so `ContigN50` finds `contign50`.
    pub fn lookup(&self, path: &FieldPath) -> Option<&Value> {
        let mut current = &self.document;
        for segment in path.segments() {
            let object = current.as_object()?;
            current = match object.get(segment) {
                Some(value) => value,
                None => object
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(segment))
                    .map(|(_, value)| value)?,
            };
        }
        Some(current)
    }
}

pub trait EutilsClient: Send + Sync {
    /// Assembly identifiers for `species`, in upstream order.
    fn search(&self, species: &SpeciesName) -> Result<Vec<AssemblyId>, AssemblyError>;
    fn summary(&self, id: &AssemblyId) -> Result<AssemblySummary, AssemblyError>;
}

pub struct EutilsHttpClient {
    client: Client,
    config: EutilsConfig,
    last_request: Mutex<Option<Instant>>,
}

impl EutilsHttpClient {
    pub fn new(config: EutilsConfig) -> Result<Self, AssemblyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-asm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AssemblyError::EutilsHttp(err.to_string()))?,
        );

        if config.email.is_none() {
            tracing::warn!("no contact email configured; NCBI may block anonymous E-utilities use");
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| AssemblyError::EutilsHttp(err.to_string()))?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    fn contact_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", self.config.tool.clone())];
        if let Some(email) = &self.config.email {
            params.push(("email", email.clone()));
        }
        if let Some(api_key) = &self.config.api_key {
            params.push(("api_key", api_key.clone()));
        }
        params
    }

    fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, AssemblyError> {
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let contact = self.contact_params();
        tracing::debug!(%url, ?params, "E-utilities request");
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .query(params)
                .query(&contact)
        })?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| AssemblyError::MalformedResponse(err.to_string()))
    }

    fn throttle(&self) {
        let mut last = self.last_request.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last {
            let wait = self.config.min_interval().saturating_sub(previous.elapsed());
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
        *last = Some(Instant::now());
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, AssemblyError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            self.throttle();
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        tracing::debug!(status, attempt, "retrying E-utilities request");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        tracing::debug!(error = %err, attempt, "retrying E-utilities request");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(AssemblyError::EutilsHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, AssemblyError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "E-utilities request failed".to_string());
        Err(AssemblyError::EutilsStatus { status, message })
    }
}

impl EutilsClient for EutilsHttpClient {
    fn search(&self, species: &SpeciesName) -> Result<Vec<AssemblyId>, AssemblyError> {
        let params = [
            ("db", ASSEMBLY_DB.to_string()),
            ("term", species.organism_term()),
            ("retmax", self.config.retmax.to_string()),
            ("retmode", "json".to_string()),
        ];
        let value = self.get_json("esearch.fcgi", &params)?;
        let ids = parse_search_response(&value)?;
        tracing::debug!(species = %species, count = ids.len(), "esearch complete");
        Ok(ids)
    }

    fn summary(&self, id: &AssemblyId) -> Result<AssemblySummary, AssemblyError> {
        let params = [
            ("db", ASSEMBLY_DB.to_string()),
            ("id", id.as_str().to_string()),
            ("retmode", "json".to_string()),
        ];
        let value = self.get_json("esummary.fcgi", &params)?;
        parse_summary_response(id, &value)
    }
}

/// Reads `esearchresult.idlist` from an esearch JSON payload.
pub fn parse_search_response(value: &Value) -> Result<Vec<AssemblyId>, AssemblyError> {
    let result = value.get("esearchresult").ok_or_else(|| {
        AssemblyError::MalformedResponse("esearch payload has no esearchresult".to_string())
    })?;
    let Some(idlist) = result.get("idlist").and_then(Value::as_array) else {
        let reason = result
            .get("ERROR")
            .and_then(Value::as_str)
            .unwrap_or("esearchresult has no idlist");
        return Err(AssemblyError::MalformedResponse(reason.to_string()));
    };
    idlist
        .iter()
        .map(|item| match item {
            Value::String(text) => text.parse(),
            Value::Number(number) => number.to_string().parse(),
            other => Err(AssemblyError::MalformedResponse(format!(
                "unexpected identifier in idlist: {other}"
            ))),
        })
        .collect()
}

/// Picks the first document summary out of an esummary JSON payload.
pub fn parse_summary_response(
    id: &AssemblyId,
    value: &Value,
) -> Result<AssemblySummary, AssemblyError> {
    let Some(result) = value.get("result") else {
        let reason = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("esummary payload has no result");
        return Err(AssemblyError::MalformedResponse(reason.to_string()));
    };
    let first_uid = result
        .get("uids")
        .and_then(Value::as_array)
        .and_then(|uids| uids.first())
        .and_then(Value::as_str)
        .ok_or_else(|| AssemblyError::EmptySummary(id.to_string()))?;
    let document = result
        .get(first_uid)
        .filter(|doc| doc.is_object() && doc.get("error").is_none())
        .ok_or_else(|| AssemblyError::EmptySummary(id.to_string()))?;
    Ok(AssemblySummary::new(id.clone(), document.clone()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn search_keeps_upstream_order() {
        let payload = json!({
            "header": { "type": "esearch", "version": "0.3" },
            "esearchresult": { "count": "3", "retmax": "3", "idlist": ["30", "10", "20"] }
        });
        let ids = parse_search_response(&payload).unwrap();
        let ids: Vec<&str> = ids.iter().map(AssemblyId::as_str).collect();
        assert_eq!(ids, ["30", "10", "20"]);
    }

    #[test]
    fn search_without_idlist_is_malformed() {
        let payload = json!({ "esearchresult": { "ERROR": "Invalid db name specified" } });
        let err = parse_search_response(&payload).unwrap_err();
        assert_matches!(err, AssemblyError::MalformedResponse(msg) if msg.contains("Invalid db"));
    }

    #[test]
    fn summary_without_records_is_empty() {
        let id: AssemblyId = "42".parse().unwrap();
        let payload = json!({ "result": { "uids": [] } });
        let err = parse_summary_response(&id, &payload).unwrap_err();
        assert_matches!(err, AssemblyError::EmptySummary(uid) if uid == "42");
    }

    #[test]
    fn pacing_survives_a_poisoned_lock() {
        let client = EutilsHttpClient::new(EutilsConfig::default()).unwrap();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = client.last_request.lock().unwrap();
            panic!("poison the pacing lock");
        }));
        assert!(client.last_request.is_poisoned());

        let start = Instant::now();
        client.throttle();
        client.throttle();
        assert!(start.elapsed() >= Duration::from_millis(340));
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive_keys() {
        let summary = AssemblySummary::new(
            "1".parse().unwrap(),
            json!({ "contign50": 100, "biosource": { "sex": "male" } }),
        );
        let path: FieldPath = "ContigN50".parse().unwrap();
        assert_eq!(summary.lookup(&path), Some(&json!(100)));
        let path: FieldPath = "Biosource.Sex".parse().unwrap();
        assert_eq!(summary.lookup(&path), Some(&json!("male")));
        let path: FieldPath = "Biosource.Isolate".parse().unwrap();
        assert_eq!(summary.lookup(&path), None);
    }
}
