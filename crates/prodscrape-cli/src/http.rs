// Copyright 2026 Prodscrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP front end.
//!
//! `GET /` serves a small form, `GET /health` reports liveness and
//! `POST /scrape {"url": ...}` runs one extraction. Scrapes are bounded by a
//! semaphore because every one of them drives its own browser.

use crate::output;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use prodscrape::{Engine, ExtractionError, ProductAssembler, ProductRecord, ScrapeConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Something that turns a URL into a record.
#[async_trait]
pub trait ScrapeService: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ProductRecord, ExtractionError>;
}

/// Launches a fresh browser per request.
pub struct BrowserService {
    config: ScrapeConfig,
}

impl BrowserService {
    pub fn new(config: ScrapeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScrapeService for BrowserService {
    async fn scrape(&self, url: &str) -> Result<ProductRecord, ExtractionError> {
        prodscrape::scrape_once(&self.config, url).await
    }
}

/// Assembles against an engine owned by the caller.
pub struct EngineService {
    engine: Arc<dyn Engine>,
    config: ScrapeConfig,
}

impl EngineService {
    pub fn new(engine: Arc<dyn Engine>, config: ScrapeConfig) -> Self {
        Self { engine, config }
    }
}

#[async_trait]
impl ScrapeService for EngineService {
    async fn scrape(&self, url: &str) -> Result<ProductRecord, ExtractionError> {
        ProductAssembler::new(Arc::clone(&self.engine), self.config.clone())
            .assemble(url)
            .await
    }
}

pub struct AppState {
    service: Arc<dyn ScrapeService>,
    /// Where successful records are saved; `None` disables saving.
    out_dir: Option<PathBuf>,
    permits: Semaphore,
}

impl AppState {
    pub fn new(
        service: Arc<dyn ScrapeService>,
        out_dir: Option<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            service,
            out_dir,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ProductRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<&'static str>,
}

impl ScrapeResponse {
    fn failure(error: impl Into<String>, stage: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            filename: None,
            error: Some(error.into()),
            stage: Some(stage),
        }
    }
}

/// Build the router with every endpoint.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/scrape", post(scrape))
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn scrape(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ScrapeRequest>>,
) -> (StatusCode, Json<ScrapeResponse>) {
    let url = payload
        .and_then(|Json(req)| req.url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let Some(url) = url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ScrapeResponse::failure("URL is required", "input")),
        );
    };

    let request_id = uuid::Uuid::new_v4();
    let Ok(_permit) = state.permits.acquire().await else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ScrapeResponse::failure("server is shutting down", "setup")),
        );
    };
    tracing::info!(%request_id, url = %url, "scrape requested");

    match state.service.scrape(&url).await {
        Ok(record) => {
            let filename = state.out_dir.as_deref().and_then(|dir| {
                match output::save_record(&record, dir) {
                    Ok(path) => path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned()),
                    Err(e) => {
                        tracing::warn!(%request_id, "failed to save record: {e:#}");
                        None
                    }
                }
            });
            tracing::info!(%request_id, fields = record.populated_fields(), "scrape succeeded");
            (
                StatusCode::OK,
                Json(ScrapeResponse {
                    success: true,
                    data: Some(record),
                    filename,
                    error: None,
                    stage: None,
                }),
            )
        }
        Err(e) => {
            tracing::warn!(%request_id, stage = e.stage(), "scrape failed: {e}");
            let status = match e {
                ExtractionError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ScrapeResponse::failure(e.to_string(), e.stage())),
            )
        }
    }
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
  <head>
    <title>prodscrape</title>
    <style>
      body { font-family: sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; }
      input[type="text"] { width: 100%; padding: 8px; margin: 5px 0 15px; }
      button { padding: 10px 20px; }
      pre { white-space: pre-wrap; background: #f6f6f6; padding: 10px; }
      .error { color: #b00; }
    </style>
  </head>
  <body>
    <h1>prodscrape</h1>
    <form id="scrape">
      <label for="url">Product page URL</label>
      <input type="text" id="url" placeholder="https://www.amazon.in/dp/...">
      <button type="submit" id="go">Scrape</button>
    </form>
    <div id="result"></div>
    <script>
      document.getElementById('scrape').addEventListener('submit', async (event) => {
        event.preventDefault();
        const button = document.getElementById('go');
        const result = document.getElementById('result');
        const url = document.getElementById('url').value.trim();
        if (!url) { return; }
        button.disabled = true;
        result.textContent = 'Scraping... this can take a few minutes.';
        try {
          const response = await fetch('/scrape', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ url }),
          });
          const body = await response.json();
          result.innerHTML = '';
          const pre = document.createElement('pre');
          if (body.success) {
            pre.textContent = JSON.stringify(body.data, null, 2);
            if (body.filename) {
              const saved = document.createElement('p');
              saved.textContent = 'Saved to ' + body.filename;
              result.appendChild(saved);
            }
          } else {
            pre.className = 'error';
            pre.textContent = body.error;
          }
          result.appendChild(pre);
        } catch (err) {
          result.textContent = 'Request failed: ' + err;
        } finally {
          button.disabled = false;
        }
      });
    </script>
  </body>
</html>
"#;
