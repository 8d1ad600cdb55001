use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::UploadFile;
use crate::error::MisraError;

pub const DEFAULT_BASE_URL: &str = "https://arn.ugr.es/miSRA/profiler";

pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Box<dyn Read + Send>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_structured(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.contains("json"))
            .unwrap_or(false)
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub trait ProfilerTransport: Send + Sync {
    fn submit(
        &self,
        fields: &[(String, String)],
        files: &[UploadFile],
    ) -> Result<RawResponse, MisraError>;
    fn status(&self, fields: &[(String, String)]) -> Result<RawResponse, MisraError>;
    fn lookup(&self, job_id: &str) -> Result<RawResponse, MisraError>;
    fn db_stat(&self) -> Result<RawResponse, MisraError>;
    fn taxon_stat(&self, taxon_id: &str) -> Result<RawResponse, MisraError>;
}

#[derive(Clone)]
pub struct ProfilerHttpClient {
    client: Client,
    base_url: String,
}

impl ProfilerHttpClient {
    pub fn new() -> Result<Self, MisraError> {
        let base_url = std::env::var("MISRA_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, MisraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("misra/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MisraError::Http(err.to_string()))?,
        );
        // Result archives can take a while to stream, so only connecting is bounded.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| MisraError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<RawResponse, MisraError> {
        let response = request
            .send()
            .map_err(|err| MisraError::Http(err.to_string()))?;
        debug!(status = response.status().as_u16(), url = %response.url(), "profiler response");
        Ok(into_raw(response))
    }
}

impl ProfilerTransport for ProfilerHttpClient {
    fn submit(
        &self,
        fields: &[(String, String)],
        files: &[UploadFile],
    ) -> Result<RawResponse, MisraError> {
        let url = self.url("");
        debug!(%url, files = files.len(), "submitting job");
        if files.is_empty() {
            return self.send(self.client.post(&url).form(fields));
        }

        let mut form = Form::new();
        for (key, value) in fields {
            form = form.text(key.clone(), value.clone());
        }
        for file in files {
            let bytes = std::fs::read(file.path.as_std_path())
                .map_err(|err| MisraError::Filesystem(format!("read {}: {err}", file.path)))?;
            let part = Part::bytes(bytes).file_name(file.file_name().to_string());
            form = form.part(file.role.key(), part);
        }
        self.send(self.client.post(&url).multipart(form))
    }

    fn status(&self, fields: &[(String, String)]) -> Result<RawResponse, MisraError> {
        self.send(self.client.post(self.url("status")).form(fields))
    }

    fn lookup(&self, job_id: &str) -> Result<RawResponse, MisraError> {
        let fields = [("job_id", job_id), ("getjob", "True")];
        self.send(self.client.post(self.url("jobid")).form(&fields))
    }

    fn db_stat(&self) -> Result<RawResponse, MisraError> {
        self.send(self.client.post(self.url("dbstat")))
    }

    fn taxon_stat(&self, taxon_id: &str) -> Result<RawResponse, MisraError> {
        let fields = [("taxonID", taxon_id)];
        self.send(self.client.post(self.url("taxonstat")).form(&fields))
    }
}

fn into_raw(response: reqwest::blocking::Response) -> RawResponse {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect();
    RawResponse {
        status,
        content_type,
        headers,
        body: Box::new(response),
    }
}
