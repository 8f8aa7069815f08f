//! Request Router
//!
//! Parses and validates requests, then delegates to the cache, the
//! broadcaster or the advice service. Holds no state of its own.
//!
//! # Endpoints
//!
//! - `GET /api/quotes?tickers=A,B` - One-shot quote batch
//! - `GET /sse/prices?tickers=A,B` - Server-sent `prices` events
//! - `POST /api/generate-advice` - Generate and store an advice report
//! - `GET /api/reports` - The caller's reports, newest first
//! - `GET /api/usage` - The caller's usage counters
//! - Health and metrics routes from [`crate::infrastructure::health`]

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::{ApiError, USAGE_LOAD_FAILED};
use super::state::AppState;
use crate::application::error::ValidationError;
use crate::application::services::PriceEvent;
use crate::domain::advice::{PortfolioId, PortfolioSnapshot, StoredReport, UsageCounters};
use crate::domain::quote::{QuoteBatch, QuoteRequest};
use crate::infrastructure::health;

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/quotes", get(get_quotes))
        .route("/sse/prices", get(stream_prices))
        .route("/api/generate-advice", post(generate_advice))
        .route("/api/reports", get(list_reports))
        .route("/api/usage", get(get_usage))
        .merge(health::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Query string shared by the pull and push endpoints.
#[derive(Debug, Deserialize)]
pub struct TickersQuery {
    /// Comma-separated symbols.
    pub tickers: Option<String>,
}

impl TickersQuery {
    fn request(&self) -> Option<QuoteRequest> {
        self.tickers.as_deref().and_then(QuoteRequest::from_csv)
    }
}

async fn get_quotes(
    State(state): State<AppState>,
    Query(query): Query<TickersQuery>,
) -> Result<Json<QuoteBatch>, ApiError> {
    let request = query.request().ok_or(ValidationError::MissingTickers)?;
    Ok(Json(state.cache.get_or_empty(&request).await))
}

async fn stream_prices(
    State(state): State<AppState>,
    Query(query): Query<TickersQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let request = query.request().unwrap_or_else(|| QuoteRequest::new(Vec::new()));
    let subscription = state.broadcaster.subscribe(request);

    let events = subscription.filter_map(|event| async move { to_sse_event(&event).map(Ok) });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &PriceEvent) -> Option<Event> {
    let built = match event {
        PriceEvent::Prices(batch) => Event::default().event("prices").json_data(batch),
        PriceEvent::Error { message } => Event::default()
            .event("error")
            .json_data(serde_json::json!({ "message": message })),
    };

    match built {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode event");
            None
        }
    }
}

/// Body of an advice request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAdviceRequest {
    /// Portfolio to analyse.
    #[serde(default)]
    pub portfolio: Option<PortfolioSnapshot>,
    /// Client-side portfolio identifier.
    #[serde(default)]
    pub portfolio_id: Option<PortfolioId>,
}

async fn generate_advice(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerateAdviceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected advice request body");
        ApiError::from(ValidationError::MissingPortfolio)
    })?;

    let ctx = state.request_context(&headers);
    let report = state
        .advice
        .generate_report(&ctx, body.portfolio, body.portfolio_id)
        .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

async fn list_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredReport>>, ApiError> {
    let ctx = state.request_context(&headers);
    Ok(Json(state.advice.list_reports(&ctx).await?))
}

async fn get_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UsageCounters>, ApiError> {
    let ctx = state.request_context(&headers);
    let usage = state.advice.usage(&ctx).await.map_err(|e| {
        tracing::error!(user_id = %ctx.user_id, error = %e, "Failed to load usage");
        ApiError::internal(USAGE_LOAD_FAILED)
    })?;
    Ok(Json(usage))
}
