//! Administration HTTP surface
//!
//! | Route                        | Behavior                          |
//! |------------------------------|-----------------------------------|
//! | `GET /health`                | liveness                          |
//! | `GET /api/list`              | records written by this process   |
//! | `PUT /api/`                  | create one record                 |
//! | `POST /api/`                 | update every match of one record  |
//! | `DELETE /api/{zone}/{record}`| delete every match of one record  |
//! | `GET /metrics`               | Prometheus text exposition        |
//!
//! Handlers are thin wrappers over the engine's single-record operations.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use cfddns_core::{
    CurrentIp, DesiredRecord, Error, ProviderErrorKind, ReconciliationEngine, RecordStore,
    ShutdownToken,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::metrics::Metrics;

/// Shared handles for the handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub store: RecordStore,
    pub current_ip: CurrentIp,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/list", get(list_records))
        .route("/api/", put(create_record).post(update_record))
        .route("/api/{zone}/{record}", delete(delete_record))
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: ShutdownToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Admin API listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await
}

/// Bind `addr` and serve until `shutdown` fires
pub async fn bind_and_serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: ShutdownToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Maps core errors onto HTTP statuses
struct ApiError(Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Provider(e) => match e.kind {
                ProviderErrorKind::NotFound => StatusCode::NOT_FOUND,
                ProviderErrorKind::Unauthorized => StatusCode::BAD_GATEWAY,
                ProviderErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ProviderErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "message": "Request failed",
            "error": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<(StatusCode, Json<Value>), Error>;

fn respond(state: &AppState, route: &str, result: ApiResult) -> Response {
    let response = match result {
        Ok(ok) => ok.into_response(),
        Err(e) => {
            warn!(route, error = %e, "Admin request failed");
            ApiError(e).into_response()
        }
    };
    state.metrics.observe_admin(route, response.status().as_u16());
    response
}

async fn health(State(state): State<AppState>) -> Response {
    respond(
        &state,
        "health",
        Ok((StatusCode::OK, Json(json!({"status": "ok"})))),
    )
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.gather() {
        Ok(text) => {
            state.metrics.observe_admin("metrics", 200);
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4")],
                text,
            )
                .into_response()
        }
        Err(e) => respond(&state, "metrics", Err(Error::Other(e.to_string()))),
    }
}

async fn list_records(State(state): State<AppState>) -> Response {
    let records = state.store.snapshot().await;
    respond(&state, "list", Ok((StatusCode::OK, Json(json!(records)))))
}

/// Malformed bodies become config errors so they get the JSON error payload
fn parse_body(body: Result<Json<DesiredRecord>, JsonRejection>) -> Result<DesiredRecord, Error> {
    body.map(|Json(record)| record)
        .map_err(|rejection| Error::config(rejection.body_text()))
}

async fn create_record(
    State(state): State<AppState>,
    body: Result<Json<DesiredRecord>, JsonRejection>,
) -> Response {
    let record = match parse_body(body) {
        Ok(record) => record,
        Err(e) => return respond(&state, "create", Err(e)),
    };
    let observation = state.current_ip.get().await;
    let result = state
        .engine
        .create_record(&record, observation.as_ref())
        .await
        .map(|created| {
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": format!("Record {} created", record.name),
                    "record": created,
                })),
            )
        });
    respond(&state, "create", result)
}

async fn update_record(
    State(state): State<AppState>,
    body: Result<Json<DesiredRecord>, JsonRejection>,
) -> Response {
    let record = match parse_body(body) {
        Ok(record) => record,
        Err(e) => return respond(&state, "update", Err(e)),
    };
    let observation = state.current_ip.get().await;
    let result = state
        .engine
        .update_record(&record, observation.as_ref())
        .await
        .map(|updated| {
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("Record {} updated", record.name),
                    "records": updated,
                })),
            )
        });
    respond(&state, "update", result)
}

async fn delete_record(
    State(state): State<AppState>,
    Path((zone, record)): Path<(String, String)>,
) -> Response {
    let result = state
        .engine
        .delete_record(&zone, &record)
        .await
        .map(|deleted| {
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("Record {} deleted", record),
                    "records": deleted,
                })),
            )
        });
    respond(&state, "delete", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cfddns_core::traits::{DnsProviderClient, IpObservation, RecordSpec, RemoteRecord};
    use cfddns_core::{ProviderError, shutdown_channel};
    use std::sync::Mutex;

    /// Provider keeping records in memory, one zone per name
    #[derive(Default)]
    struct MemoryProvider {
        records: Mutex<Vec<RemoteRecord>>,
        unauthorized: bool,
    }

    #[async_trait]
    impl DnsProviderClient for MemoryProvider {
        async fn resolve_zone(&self, zone_name: &str) -> Result<String, ProviderError> {
            if self.unauthorized {
                return Err(ProviderError::unauthorized("bad token"));
            }
            Ok(format!("zone-{}", zone_name))
        }

        async fn list_records(
            &self,
            _zone_id: &str,
            exact_name: &str,
        ) -> Result<Vec<RemoteRecord>, ProviderError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.name == exact_name)
                .cloned()
                .collect())
        }

        async fn create_record(
            &self,
            _zone_id: &str,
            spec: &RecordSpec,
        ) -> Result<RemoteRecord, ProviderError> {
            let mut records = self.records.lock().unwrap();
            let record = RemoteRecord {
                id: format!("r{}", records.len() + 1),
                name: spec.name.clone(),
                record_type: spec.record_type.clone(),
                content: spec.content.clone(),
                proxied: spec.proxied,
                ttl: spec.ttl,
                created_at: None,
                modified_at: None,
            };
            records.push(record.clone());
            Ok(record)
        }

        async fn update_record(
            &self,
            _zone_id: &str,
            record_id: &str,
            spec: &RecordSpec,
        ) -> Result<RemoteRecord, ProviderError> {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id == record_id)
                .ok_or_else(|| ProviderError::not_found(record_id))?;
            record.content = spec.content.clone();
            record.proxied = spec.proxied;
            record.ttl = spec.ttl;
            Ok(record.clone())
        }

        async fn delete_record(&self, _zone_id: &str, record_id: &str) -> Result<(), ProviderError> {
            self.records.lock().unwrap().retain(|r| r.id != record_id);
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "memory"
        }
    }

    struct TestServer {
        base: String,
        client: reqwest::Client,
        _trigger: cfddns_core::ShutdownTrigger,
    }

    async fn start(provider: MemoryProvider, ip: Option<&str>) -> TestServer {
        let store = RecordStore::new();
        let engine = Arc::new(ReconciliationEngine::new(Arc::new(provider)).with_store(store.clone()));
        let current_ip = CurrentIp::new();
        if let Some(ip) = ip {
            current_ip.set(IpObservation::new(ip, "test")).await;
        }
        let state = AppState {
            engine,
            store,
            current_ip,
            metrics: Arc::new(Metrics::new().unwrap()),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (trigger, token) = shutdown_channel();
        tokio::spawn(serve(listener, state, token));

        TestServer {
            base,
            client: reqwest::Client::new(),
            _trigger: trigger,
        }
    }

    fn body(name: &str) -> Value {
        json!({"name": name, "zoneName": "example.com", "proxied": true, "ttl": 300})
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = start(MemoryProvider::default(), None).await;

        let response = server
            .client
            .get(format!("{}/health", server.base))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn create_list_update_delete() {
        let server = start(MemoryProvider::default(), Some("203.0.113.5")).await;

        let response = server
            .client
            .put(format!("{}/api/", server.base))
            .json(&body("home.example.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let created: Value = response.json().await.unwrap();
        assert_eq!(created["record"]["content"], "203.0.113.5");
        assert_eq!(created["record"]["ttl"], 300);

        let list: Value = server
            .client
            .get(format!("{}/api/list", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["zoneName"], "example.com");
        assert_eq!(list[0]["name"], "home.example.com");

        let mut update = body("home.example.com");
        update["proxied"] = json!(false);
        let response = server
            .client
            .post(format!("{}/api/", server.base))
            .json(&update)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let updated: Value = response.json().await.unwrap();
        assert_eq!(updated["records"][0]["proxied"], false);

        let response = server
            .client
            .delete(format!("{}/api/example.com/home.example.com", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let list: Value = server
            .client
            .get(format!("{}/api/list", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(list.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_record_is_404() {
        let server = start(MemoryProvider::default(), Some("203.0.113.5")).await;

        let response = server
            .client
            .delete(format!("{}/api/example.com/ghost.example.com", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        let response = server
            .client
            .post(format!("{}/api/", server.base))
            .json(&body("ghost.example.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].as_str().unwrap().contains("record not found"));
    }

    #[tokio::test]
    async fn unknown_ip_is_400() {
        let server = start(MemoryProvider::default(), None).await;

        let response = server
            .client
            .put(format!("{}/api/", server.base))
            .json(&body("home.example.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn malformed_bodies_are_counted_json_400s() {
        let server = start(MemoryProvider::default(), Some("203.0.113.5")).await;

        let response = server
            .client
            .put(format!("{}/api/", server.base))
            .json(&json!({"name": "a.example.com"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].as_str().unwrap().contains("zoneName"));

        let response = server
            .client
            .post(format!("{}/api/", server.base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].is_string());

        let text = server
            .client
            .get(format!("{}/metrics", server.base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(text.contains("cfddns_admin_requests_total{route=\"create\",status=\"400\"} 1"));
        assert!(text.contains("cfddns_admin_requests_total{route=\"update\",status=\"400\"} 1"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_502() {
        let provider = MemoryProvider {
            unauthorized: true,
            ..MemoryProvider::default()
        };
        let server = start(provider, Some("203.0.113.5")).await;

        let response = server
            .client
            .put(format!("{}/api/", server.base))
            .json(&body("home.example.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 502);
    }

    #[tokio::test]
    async fn metrics_count_admin_requests() {
        let server = start(MemoryProvider::default(), None).await;
        server
            .client
            .get(format!("{}/health", server.base))
            .send()
            .await
            .unwrap();

        let text = server
            .client
            .get(format!("{}/metrics", server.base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(text.contains("cfddns_admin_requests_total{route=\"health\",status=\"200\"} 1"));
    }

    #[tokio::test]
    async fn server_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let state = AppState {
            engine: Arc::new(ReconciliationEngine::new(Arc::new(MemoryProvider::default()))),
            store: RecordStore::new(),
            current_ip: CurrentIp::new(),
            metrics: Arc::new(Metrics::new().unwrap()),
        };
        let (trigger, token) = shutdown_channel();
        let handle = tokio::spawn(serve(listener, state, token));

        trigger.trigger();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("Admin server did not stop");
        assert!(result.unwrap().is_ok());
    }
}
