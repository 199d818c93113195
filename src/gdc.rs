use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};

use crate::config::ResolvedConfig;
use crate::domain::FileId;
use crate::envelope::{unwrap_donors, unwrap_hits};
use crate::error::ValidatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Cases,
    Files,
    Data,
    Survival,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Cases => "cases",
            Endpoint::Files => "files",
            Endpoint::Data => "data",
            Endpoint::Survival => "analysis/survival",
        }
    }
}

/// One filtered search: `field in values`, returning `fields`, at most `size` hits.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub field: String,
    pub values: Vec<String>,
    pub fields: Vec<String>,
    pub size: usize,
}

impl SearchQuery {
    pub fn new(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            values,
            fields: Vec::new(),
            size: 100,
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn filter(&self) -> Value {
        json!({
            "op": "in",
            "content": {
                "field": self.field,
                "value": self.values,
            }
        })
    }

    pub fn body(&self) -> Value {
        json!({
            "filters": self.filter(),
            "fields": self.fields.join(","),
            "format": "json",
            "size": self.size.to_string(),
        })
    }
}

pub fn manifest_body(ids: &[FileId]) -> Value {
    json!({ "ids": ids.iter().map(FileId::as_str).collect::<Vec<_>>() })
}

pub trait GdcClient: Send + Sync {
    fn post_json(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ValidatorError>;
    fn download_data(&self, ids: &[FileId], destination: &Path) -> Result<(), ValidatorError>;

    fn search(&self, endpoint: Endpoint, query: &SearchQuery) -> Result<Vec<Value>, ValidatorError> {
        tracing::debug!(
            endpoint = endpoint.path(),
            field = %query.field,
            values = query.values.len(),
            "gdc search"
        );
        unwrap_hits(self.post_json(endpoint, &query.body())?)
    }

    fn survival(&self, query: &SearchQuery) -> Result<Vec<Value>, ValidatorError> {
        unwrap_donors(self.post_json(Endpoint::Survival, &query.body())?)
    }
}

#[derive(Clone)]
pub struct GdcHttpClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl GdcHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, ValidatorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("xena-validate/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ValidatorError::GdcHttp(err.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Ok(token) = std::env::var("GDC_TOKEN") {
            if !token.trim().is_empty() {
                headers.insert(
                    "X-Auth-Token",
                    HeaderValue::from_str(token.trim())
                        .map_err(|err| ValidatorError::GdcHttp(err.to_string()))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ValidatorError::GdcHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ValidatorError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GDC request failed".to_string());
        Err(ValidatorError::GdcStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, ValidatorError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(status, attempt, "retrying GDC request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::debug!(error = %err, attempt, "retrying GDC request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ValidatorError::GdcHttp(err.to_string()));
                }
            }
        }
    }
}

impl GdcClient for GdcHttpClient {
    fn post_json(&self, endpoint: Endpoint, body: &Value) -> Result<Value, ValidatorError> {
        let url = self.endpoint_url(endpoint);
        let start = std::time::Instant::now();
        let response = self.send_with_retries(|| self.client.post(&url).json(body))?;
        let response = Self::handle_status(response)?;
        let value = response
            .json::<Value>()
            .map_err(|err| ValidatorError::GdcHttp(err.to_string()))?;
        tracing::debug!(
            url = %url,
            latency_ms = start.elapsed().as_millis() as u64,
            "gdc response"
        );
        Ok(value)
    }

    fn download_data(&self, ids: &[FileId], destination: &Path) -> Result<(), ValidatorError> {
        let url = self.endpoint_url(Endpoint::Data);
        let body = manifest_body(ids);
        let response = self.send_with_retries(|| self.client.post(&url).json(&body))?;
        let mut response = Self::handle_status(response)?;
        let mut file =
            File::create(destination).map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| ValidatorError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_body_matches_gdc_shape() {
        let query = SearchQuery::new("samples.submitter_id", vec!["S1".to_string()])
            .fields(["submitter_id", "files.file_name"])
            .size(20000);
        let body = query.body();
        assert_eq!(body["filters"]["op"], "in");
        assert_eq!(body["filters"]["content"]["field"], "samples.submitter_id");
        assert_eq!(body["filters"]["content"]["value"][0], "S1");
        assert_eq!(body["fields"], "submitter_id,files.file_name");
        assert_eq!(body["format"], "json");
        assert_eq!(body["size"], "20000");
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }
}
