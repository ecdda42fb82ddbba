//! HTTP implementation of [`SchedulerApi`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocation::{Allocation, AllocationListStub};
use crate::client::SchedulerApi;
use crate::deployment::Deployment;
use crate::error::ApiError;
use crate::evaluation::Evaluation;
use crate::job::{DispatchResponse, Job, RegisterResponse, ValidationResponse};
use crate::plan::JobPlanResponse;
use crate::query::{QueryOptions, Response, WriteOptions};
use crate::Result;

/// Default scheduler address.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:4646";

/// Header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Header carrying the index of a read.
pub const INDEX_HEADER: &str = "X-Nomad-Index";

/// Connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub token: Option<String>,
    /// Timeout for non-blocking requests; blocking reads add their wait time.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Scheduler client over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(token)
                .map_err(|_| ApiError::InvalidRequest("invalid token format".to_string()))?;
            headers.insert(TOKEN_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let base_url = Url::parse(config.address.trim_end_matches('/')).map_err(|e| {
            ApiError::InvalidRequest(format!("invalid address {:?}: {}", config.address, e))
        })?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    /// Build a URL from path segments; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        opts: &QueryOptions,
    ) -> Result<Response<T>> {
        let url = self.url(segments)?;
        debug!(path = %url.path(), index = opts.wait_index, "scheduler read");

        let timeout = self.timeout + opts.wait_time.unwrap_or_default();
        let request = self
            .client
            .get(url)
            .timeout(timeout)
            .query(&query_params(opts));

        let response = request.send().await?;
        let last_index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_default();

        let value = self.handle_response(response).await?;
        Ok(Response::new(value, last_index))
    }

    async fn write<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        opts: &WriteOptions,
    ) -> Result<T> {
        let url = self.url(segments)?;
        debug!(path = %url.path(), "scheduler write");

        let request: RequestBuilder = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .query(&write_params(opts))
            .json(body);

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
        opts: &WriteOptions,
    ) -> Result<T> {
        self.write(Method::POST, segments, body, opts).await
    }

    /// Decode a successful response or map the error status.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let path = response.url().path().to_string();

        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body)
                .map_err(|e| ApiError::Decode(format!("{}: {}", path, e)));
        }

        let message = response.text().await.unwrap_or_default();
        let message = message.trim();

        if status == reqwest::StatusCode::NOT_FOUND {
            let detail = if message.is_empty() { path } else { message.to_string() };
            return Err(ApiError::NotFound(detail));
        }

        Err(ApiError::api(status.as_u16(), message))
    }
}

/// Query string for a read.
fn query_params(opts: &QueryOptions) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(namespace) = &opts.namespace {
        params.push(("namespace", namespace.clone()));
    }
    if let Some(region) = &opts.region {
        params.push(("region", region.clone()));
    }
    if opts.allow_stale {
        params.push(("stale", String::new()));
    }
    if opts.wait_index > 0 {
        params.push(("index", opts.wait_index.to_string()));
    }
    if let Some(wait) = opts.wait_time {
        params.push(("wait", format_wait(wait)));
    }
    params
}

/// Query string for a write.
fn write_params(opts: &WriteOptions) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(namespace) = &opts.namespace {
        params.push(("namespace", namespace.clone()));
    }
    if let Some(region) = &opts.region {
        params.push(("region", region.clone()));
    }
    params
}

fn format_wait(wait: Duration) -> String {
    if wait.subsec_nanos() == 0 {
        format!("{}s", wait.as_secs())
    } else {
        format!("{}ms", wait.as_millis())
    }
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Serialize)]
struct JobRequest<'a> {
    #[serde(rename = "Job")]
    job: &'a Job,
}

#[derive(Serialize)]
struct PlanRequest<'a> {
    #[serde(rename = "Job")]
    job: &'a Job,
    #[serde(rename = "Diff")]
    diff: bool,
}

#[derive(Serialize)]
struct DispatchRequest<'a> {
    #[serde(rename = "JobID")]
    job_id: &'a str,
    #[serde(rename = "Payload", skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(rename = "Meta")]
    meta: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct PromoteRequest<'a> {
    #[serde(rename = "DeploymentID")]
    deployment_id: &'a str,
    #[serde(rename = "All")]
    all: bool,
}

#[derive(Deserialize)]
struct PeriodicForceResponse {
    #[serde(rename = "EvalID", default)]
    eval_id: String,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Deserialize)]
struct Ignored {}

#[async_trait]
impl SchedulerApi for HttpClient {
    async fn validate_job(&self, job: &Job, opts: &WriteOptions) -> Result<ValidationResponse> {
        self.post(&["v1", "validate", "job"], &JobRequest { job }, opts)
            .await
    }

    async fn register_job(&self, job: &Job, opts: &WriteOptions) -> Result<RegisterResponse> {
        self.post(&["v1", "jobs"], &JobRequest { job }, opts).await
    }

    async fn job_info(&self, job_id: &str, opts: &QueryOptions) -> Result<Response<Job>> {
        self.get(&["v1", "job", job_id], opts).await
    }

    async fn plan_job(&self, job: &Job, opts: &WriteOptions) -> Result<JobPlanResponse> {
        let job_id = job
            .id()
            .ok_or_else(|| ApiError::InvalidRequest("job has no ID or name".to_string()))?;
        self.post(
            &["v1", "job", job_id, "plan"],
            &PlanRequest { job, diff: true },
            opts,
        )
        .await
    }

    async fn periodic_force(&self, job_id: &str, opts: &WriteOptions) -> Result<String> {
        let response: PeriodicForceResponse = self
            .post(&["v1", "job", job_id, "periodic", "force"], &Empty {}, opts)
            .await?;
        Ok(response.eval_id)
    }

    async fn dispatch_job(
        &self,
        job_id: &str,
        meta: &BTreeMap<String, String>,
        payload: &[u8],
        opts: &WriteOptions,
    ) -> Result<DispatchResponse> {
        let payload =
            (!payload.is_empty()).then(|| base64::engine::general_purpose::STANDARD.encode(payload));
        let body = DispatchRequest {
            job_id,
            payload,
            meta,
        };
        self.post(&["v1", "job", job_id, "dispatch"], &body, opts)
            .await
    }

    async fn latest_deployment(
        &self,
        job_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Option<Deployment>>> {
        self.get(&["v1", "job", job_id, "deployment"], opts).await
    }

    async fn evaluation_info(
        &self,
        eval_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Evaluation>> {
        self.get(&["v1", "evaluation", eval_id], opts).await
    }

    async fn evaluation_allocations(
        &self,
        eval_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<AllocationListStub>>> {
        self.get(&["v1", "evaluation", eval_id, "allocations"], opts)
            .await
    }

    async fn deployment_info(
        &self,
        deployment_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Deployment>> {
        self.get(&["v1", "deployment", deployment_id], opts).await
    }

    async fn deployment_allocations(
        &self,
        deployment_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Vec<AllocationListStub>>> {
        self.get(&["v1", "deployment", "allocations", deployment_id], opts)
            .await
    }

    async fn promote_all(&self, deployment_id: &str, opts: &WriteOptions) -> Result<()> {
        let body = PromoteRequest {
            deployment_id,
            all: true,
        };
        let _: Ignored = self
            .post(&["v1", "deployment", "promote", deployment_id], &body, opts)
            .await?;
        Ok(())
    }

    async fn allocation_info(
        &self,
        alloc_id: &str,
        opts: &QueryOptions,
    ) -> Result<Response<Allocation>> {
        self.get(&["v1", "allocation", alloc_id], opts).await
    }
}
