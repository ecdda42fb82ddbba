//! End-to-end deployment flows over HTTP.
//!
//! These tests run the deployment engine through the real `HttpClient`
//! against an in-process fake scheduler, verifying:
//!
//! 1. Service job: validate, register, evaluation, deployment watch
//! 2. Batch job: register, evaluation, job status, allocation tracking
//! 3. 404s surface as typed not-found errors
//! 4. Blocking reads send the wait index and wait time
//!
//! ## Running
//!
//! ```bash
//! cargo test -p convoy-e2e --test fake_scheduler
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use convoy_api::{ApiError, ClientConfig, HttpClient, Job, QueryOptions, SchedulerApi, WriteOptions};
use convoy_deploy::{trigger_deployment, DeployContext, DeployOptions};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const INDEX_HEADER: &str = "X-Nomad-Index";

// =============================================================================
// Fake scheduler
// =============================================================================

#[derive(Default)]
struct Cluster {
    index: u64,
    jobs: HashMap<String, Value>,
    registrations: usize,
    deployment_reads: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Cluster>>;

fn indexed(cluster: &Cluster, body: Value) -> Response {
    ([(INDEX_HEADER, cluster.index.to_string())], Json(body)).into_response()
}

async fn validate(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({ "DriverConfigValidated": true, "ValidationErrors": null, "Error": "" }))
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut cluster = state.lock().unwrap();
    let mut job = body["Job"].clone();
    let id = job["ID"].as_str().unwrap_or_default().to_string();
    job["Status"] = json!("running");

    cluster.index += 1;
    cluster.registrations += 1;
    cluster.jobs.insert(id, job);
    Json(json!({ "EvalID": "e1", "JobModifyIndex": cluster.index, "Warnings": "" }))
}

async fn job_info(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let cluster = state.lock().unwrap();
    match cluster.jobs.get(&id) {
        Some(job) => indexed(&cluster, job.clone()),
        None => (StatusCode::NOT_FOUND, "job not found").into_response(),
    }
}

async fn evaluation(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let cluster = state.lock().unwrap();
    let job_type = cluster
        .jobs
        .get("web")
        .and_then(|job| job["Type"].as_str())
        .unwrap_or_default();
    let deployment_id = if job_type == "service" { "d1" } else { "" };

    indexed(
        &cluster,
        json!({
            "ID": id,
            "JobID": "web",
            "Status": "complete",
            "DeploymentID": deployment_id,
            "FailedTGAllocs": null,
        }),
    )
}

async fn evaluation_allocations(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let cluster = state.lock().unwrap();
    indexed(
        &cluster,
        json!([{
            "ID": "a1",
            "EvalID": id,
            "JobID": "web",
            "TaskGroup": "web",
            "ClientStatus": "running",
            "TaskStates": { "report": { "State": "running", "Failed": false, "Events": [] } },
        }]),
    )
}

async fn deployment(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut cluster = state.lock().unwrap();
    cluster.deployment_reads.push(params);
    indexed(
        &cluster,
        json!({ "ID": id, "JobID": "web", "Status": "successful", "TaskGroups": {} }),
    )
}

async fn promote(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({}))
}

async fn spawn_scheduler() -> (String, Shared) {
    let state = Shared::new(Mutex::new(Cluster {
        index: 10,
        ..Cluster::default()
    }));

    let app = Router::new()
        .route("/v1/validate/job", post(validate))
        .route("/v1/jobs", post(register))
        .route("/v1/job/{id}", get(job_info))
        .route("/v1/evaluation/{id}", get(evaluation))
        .route("/v1/evaluation/{id}/allocations", get(evaluation_allocations))
        .route("/v1/deployment/{id}", get(deployment))
        .route("/v1/deployment/promote/{id}", post(promote))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

fn client(address: &str) -> Arc<dyn SchedulerApi> {
    let config = ClientConfig {
        address: address.to_string(),
        ..ClientConfig::default()
    };
    Arc::new(HttpClient::new(&config).unwrap())
}

fn job(job_type: &str, update: Option<Value>) -> Job {
    let mut body = json!({
        "ID": "web",
        "Name": "web",
        "Type": job_type,
        "TaskGroups": [{ "Name": "web", "Count": 2, "Tasks": [{ "Name": "report", "Driver": "docker" }] }],
    });
    if let Some(update) = update {
        body["Update"] = update;
    }
    serde_json::from_value(body).unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_service_deployment_over_http() {
    let (address, state) = spawn_scheduler().await;
    let ctx = DeployContext::new(client(&address), WriteOptions::default());

    let mut job = job("service", Some(json!({ "Canary": 0, "MaxParallel": 1 })));
    assert!(trigger_deployment(&ctx, &mut job, &DeployOptions::default()).await);

    let cluster = state.lock().unwrap();
    assert_eq!(cluster.registrations, 1);
    // Unknown fields reach the scheduler untouched.
    assert_eq!(cluster.jobs["web"]["Update"]["MaxParallel"], json!(1));
    assert_eq!(cluster.jobs["web"]["TaskGroups"][0]["Tasks"][0]["Driver"], json!("docker"));
}

#[tokio::test]
async fn test_deployment_reads_are_blocking() {
    let (address, state) = spawn_scheduler().await;
    let ctx = DeployContext::new(client(&address), WriteOptions::default());

    let mut job = job("service", Some(json!({ "Canary": 0 })));
    assert!(trigger_deployment(&ctx, &mut job, &DeployOptions::default()).await);

    let cluster = state.lock().unwrap();
    let first = &cluster.deployment_reads[0];
    assert_eq!(first.get("index").map(String::as_str), Some("1"));
    assert!(first.contains_key("wait"));
}

#[tokio::test]
async fn test_batch_job_tracks_allocations_over_http() {
    let (address, state) = spawn_scheduler().await;
    let ctx = DeployContext::new(client(&address), WriteOptions::default());

    let mut job = job("batch", None);
    assert!(trigger_deployment(&ctx, &mut job, &DeployOptions::default()).await);

    let cluster = state.lock().unwrap();
    assert_eq!(cluster.registrations, 1);
    assert!(cluster.deployment_reads.is_empty());
}

#[tokio::test]
async fn test_missing_job_is_typed_not_found() {
    let (address, _state) = spawn_scheduler().await;
    let client = client(&address);

    let err = client
        .job_info("missing", &QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
