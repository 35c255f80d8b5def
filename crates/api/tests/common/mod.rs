#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use relax_api::config::ServerConfig;
use relax_api::router::build_app_router;
use relax_api::state::AppState;
use relax_core::collaborators::{
    ComputeError, Relaxer, RelaxerFactory, StepReport, StructureSource,
};
use relax_core::error::CoreError;
use relax_core::slab::SlabBuilder;
use relax_core::structure::Structure;
use relax_engine::{RelaxationService, ServiceConfig, WorkerBackend};
use relax_materials::validation::{validate_api_key, validate_material_id};
use relax_store::InMemoryJobRepo;
use tower::ServiceExt;

pub const API_KEY: &str = "abcdefghijklmnopqrstuvwxyz012345";
pub const EXPIRED_KEY: &str = "EXPIREDexpiredEXPIREDexpired0000";

// ---------------------------------------------------------------------------
// Collaborator stubs
// ---------------------------------------------------------------------------

/// Serves a four-atom copper cell. Checks inputs like the real client,
/// `mp-0` does not exist and [`EXPIRED_KEY`] is rejected upstream.
pub struct StubSource;

#[async_trait]
impl StructureSource for StubSource {
    async fn fetch(&self, material_id: &str, api_key: &str) -> Result<Structure, CoreError> {
        validate_material_id(material_id)?;
        validate_api_key(api_key)?;
        if api_key == EXPIRED_KEY {
            return Err(CoreError::CredentialExpired);
        }
        if material_id == "mp-0" {
            return Err(CoreError::MaterialNotFound(material_id.to_string()));
        }
        Ok(Structure::new(
            vec!["Cu".into(); 4],
            vec![
                [0.0, 0.0, 0.0],
                [1.8, 1.8, 0.0],
                [1.8, 0.0, 1.8],
                [0.0, 1.8, 1.8],
            ],
            [[3.6, 0.0, 0.0], [0.0, 3.6, 0.0], [0.0, 0.0, 3.6]],
            [true; 3],
        ))
    }
}

/// Halves the reported force every step, starting at 0.4 eV/Å.
struct Halving;

impl Relaxer for Halving {
    fn relax(
        &mut self,
        structure: &Structure,
        fmax: f64,
        max_steps: u32,
        on_step: &mut dyn FnMut(StepReport),
    ) -> Result<Structure, ComputeError> {
        let mut force = 0.4;
        for step in 1..=max_steps {
            force /= 2.0;
            on_step(StepReport {
                step,
                energy: -100.0 - f64::from(step),
                force,
            });
            if force <= fmax {
                break;
            }
        }
        Ok(structure.clone())
    }
}

pub struct HalvingFactory;

impl RelaxerFactory for HalvingFactory {
    fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError> {
        Ok(Box::new(Halving))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults and no default API key.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        mp_api_key: None,
        mp_api_url: "http://127.0.0.1:9".to_string(),
    }
}

/// Start a service over the stubs with `workers` in-process workers.
///
/// With zero workers every job stays `PENDING`.
pub fn start_service(workers: usize) -> Arc<RelaxationService> {
    RelaxationService::start(
        Arc::new(InMemoryJobRepo::new()),
        Arc::new(StubSource),
        Arc::new(SlabBuilder::default()),
        WorkerBackend::InProcess {
            factory: Arc::new(HalvingFactory),
            retry_backoff: Duration::from_millis(10),
        },
        ServiceConfig {
            workers,
            listener_poll: Duration::from_millis(50),
            listener_join_timeout: Duration::from_secs(2),
        },
    )
}

/// Build the full router (same middleware stack as production) over a
/// freshly started service.
pub fn build_test_app(workers: usize) -> (Router, Arc<RelaxationService>) {
    build_test_app_with(test_config(), workers)
}

pub fn build_test_app_with(
    config: ServerConfig,
    workers: usize,
) -> (Router, Arc<RelaxationService>) {
    let service = start_service(workers);
    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(config.clone()),
    };
    (build_app_router(state, &config), service)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a relaxation for `mp-30` with [`API_KEY`] and return the job id.
pub async fn create_job(app: &Router, body: serde_json::Value) -> String {
    let response = post_json(app.clone(), "/api/v1/relaxations", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().to_string()
}

/// Poll the job until it reports FINISHED or FAILED, returning its `data`.
pub async fn wait_for_terminal(app: &Router, id: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let json = body_json(get(app.clone(), &format!("/api/v1/relaxations/{id}")).await).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if status == "FINISHED" || status == "FAILED" {
            return json["data"].clone();
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} stuck in {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
