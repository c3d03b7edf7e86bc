// REST API with Axum
//
// Thin consumer of the aggregator: every read loads the sources from the
// repository and recomputes. Nothing derived is cached.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::aggregator::{current_net_worth, derive_change_metrics, filter_series, growth_rate, historical_net_worth};
use crate::entities::{FinancialSource, NewSource, SourceChanges};
use crate::reports::{distribution, distribution_by_type, DashboardSummary};
use crate::repository::SourceRepository;
use crate::temporal::{parse_timestamp, Period, TimeRange};

const LOAD_FAILED: &str = "Failed to load financial data";
const SAVE_FAILED: &str = "Failed to save financial data";

pub type SharedRepository = Arc<Mutex<dyn SourceRepository + Send>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    repo: SharedRepository,
    default_period: Period,
    default_range: TimeRange,
}

impl AppState {
    pub fn new<R>(repo: R) -> Self
    where
        R: SourceRepository + Send + 'static,
    {
        AppState {
            repo: Arc::new(Mutex::new(repo)),
            default_period: Period::default(),
            default_range: TimeRange::default(),
        }
    }

    pub fn with_defaults(mut self, period: Period, range: TimeRange) -> Self {
        self.default_period = period;
        self.default_range = range;
        self
    }

    fn repo(&self) -> Result<MutexGuard<'_, dyn SourceRepository + Send + 'static>, Response> {
        self.repo.lock().map_err(|_| {
            log::error!("Repository lock poisoned");
            failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED)
        })
    }

    fn load_sources(&self) -> Result<Vec<FinancialSource>, Response> {
        self.repo()?.list_sources().map_err(|e| {
            log::error!("Error listing sources: {:#}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED)
        })
    }

    fn period(&self, raw: Option<&str>) -> Period {
        raw.and_then(|p| p.parse().ok()).unwrap_or(self.default_period)
    }

    fn range(&self, raw: Option<&str>) -> TimeRange {
        raw.and_then(|r| r.parse().ok()).unwrap_or(self.default_range)
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message.to_string()),
    };
    (status, Json(body)).into_response()
}

fn not_found(id: &str) -> Response {
    failure(StatusCode::NOT_FOUND, &format!("Source not found: {}", id))
}

/// Unwrap a JSON body, answering 400 in the usual envelope when it doesn't parse
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(value)| value).map_err(|rejection| {
        log::warn!("Rejected request body: {}", rejection.body_text());
        failure(StatusCode::BAD_REQUEST, &rejection.body_text())
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectorQuery {
    pub period: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewBalanceUpdate {
    #[serde(default, deserialize_with = "crate::money::lenient")]
    pub balance: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize)]
struct NetWorthResponse {
    net_worth: f64,
    active_sources: usize,
}

#[derive(Serialize)]
struct MetricsResponse {
    period: Period,
    range: TimeRange,
    amount: f64,
    percentage: f64,
    is_positive: bool,
    growth_rate: f64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/sources
async fn list_sources(State(state): State<AppState>) -> Response {
    match state.load_sources() {
        Ok(sources) => ok(sources),
        Err(resp) => resp,
    }
}

/// POST /api/sources
async fn create_source(
    State(state): State<AppState>,
    body: Result<Json<NewSource>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    if let Err(msg) = body.validate() {
        return failure(StatusCode::BAD_REQUEST, &msg);
    }
    let repo = match state.repo() {
        Ok(repo) => repo,
        Err(resp) => return resp,
    };
    match repo.create_source(body) {
        Ok(source) => created(source),
        Err(e) => {
            log::error!("Error creating source: {:#}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED)
        }
    }
}

/// GET /api/sources/:id
async fn get_source(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let repo = match state.repo() {
        Ok(repo) => repo,
        Err(resp) => return resp,
    };
    match repo.get_source(&id) {
        Ok(Some(source)) => ok(source),
        Ok(None) => not_found(&id),
        Err(e) => {
            log::error!("Error loading source {}: {:#}", id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED)
        }
    }
}

/// PUT /api/sources/:id
async fn update_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    changes: Result<Json<SourceChanges>, JsonRejection>,
) -> Response {
    let changes = match json_body(changes) {
        Ok(changes) => changes,
        Err(resp) => return resp,
    };
    let repo = match state.repo() {
        Ok(repo) => repo,
        Err(resp) => return resp,
    };
    match repo.get_source(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(&id),
        Err(e) => {
            log::error!("Error loading source {}: {:#}", id, e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED);
        }
    }
    match repo.update_source(&id, changes) {
        Ok(source) => ok(source),
        Err(e) => {
            log::error!("Error updating source {}: {:#}", id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED)
        }
    }
}

/// DELETE /api/sources/:id
async fn delete_source(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let repo = match state.repo() {
        Ok(repo) => repo,
        Err(resp) => return resp,
    };
    match repo.get_source(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(&id),
        Err(e) => {
            log::error!("Error loading source {}: {:#}", id, e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED);
        }
    }
    match repo.delete_source(&id) {
        Ok(()) => ok(id),
        Err(e) => {
            log::error!("Error deleting source {}: {:#}", id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED)
        }
    }
}

/// GET /api/sources/:id/updates - history, newest first
async fn list_updates(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let repo = match state.repo() {
        Ok(repo) => repo,
        Err(resp) => return resp,
    };
    match repo.get_source(&id) {
        Ok(Some(source)) => {
            let mut updates = source.updates;
            updates.reverse();
            ok(updates)
        }
        Ok(None) => not_found(&id),
        Err(e) => {
            log::error!("Error loading source {}: {:#}", id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED)
        }
    }
}

/// POST /api/sources/:id/updates
async fn append_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<NewBalanceUpdate>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let created_at = match body.created_at.as_deref() {
        Some(raw) => match parse_timestamp(raw) {
            Some(ts) => Some(ts),
            None => {
                return failure(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid created_at: {}", raw),
                )
            }
        },
        None => None,
    };

    let repo = match state.repo() {
        Ok(repo) => repo,
        Err(resp) => return resp,
    };
    match repo.get_source(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found(&id),
        Err(e) => {
            log::error!("Error loading source {}: {:#}", id, e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, LOAD_FAILED);
        }
    }
    match repo.append_balance_update(&id, body.balance, body.notes, created_at) {
        Ok(update) => created(update),
        Err(e) => {
            log::error!("Error recording balance for {}: {:#}", id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, SAVE_FAILED)
        }
    }
}

/// GET /api/net-worth
async fn net_worth(State(state): State<AppState>) -> Response {
    match state.load_sources() {
        Ok(sources) => ok(NetWorthResponse {
            net_worth: current_net_worth(&sources),
            active_sources: sources.iter().filter(|s| s.is_active).count(),
        }),
        Err(resp) => resp,
    }
}

/// GET /api/net-worth/history?period=
async fn history(State(state): State<AppState>, Query(query): Query<SelectorQuery>) -> Response {
    let period = state.period(query.period.as_deref());
    match state.load_sources() {
        Ok(sources) => ok(historical_net_worth(&sources, period, Utc::now())),
        Err(resp) => resp,
    }
}

/// GET /api/metrics?period=&range=
async fn metrics(State(state): State<AppState>, Query(query): Query<SelectorQuery>) -> Response {
    let period = state.period(query.period.as_deref());
    let range = state.range(query.range.as_deref());
    let now = Utc::now();

    match state.load_sources() {
        Ok(sources) => {
            let series = filter_series(&historical_net_worth(&sources, period, now), range, now);
            let change = derive_change_metrics(&series);
            ok(MetricsResponse {
                period,
                range,
                amount: change.amount,
                percentage: change.percentage,
                is_positive: change.is_positive,
                growth_rate: growth_rate(&series, range),
            })
        }
        Err(resp) => resp,
    }
}

/// GET /api/distribution
async fn get_distribution(State(state): State<AppState>) -> Response {
    match state.load_sources() {
        Ok(sources) => ok(serde_json::json!({
            "by_source": distribution(&sources),
            "by_type": distribution_by_type(&sources),
        })),
        Err(resp) => resp,
    }
}

/// GET /api/summary?period=&range=
async fn summary(State(state): State<AppState>, Query(query): Query<SelectorQuery>) -> Response {
    let period = state.period(query.period.as_deref());
    let range = state.range(query.range.as_deref());
    match state.load_sources() {
        Ok(sources) => ok(DashboardSummary::build(&sources, period, range, Utc::now())),
        Err(resp) => resp,
    }
}

/// API routes, to be nested under `/api`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sources", get(list_sources).post(create_source))
        .route(
            "/sources/:id",
            get(get_source).put(update_source).delete(delete_source),
        )
        .route("/sources/:id/updates", get(list_updates).post(append_update))
        .route("/net-worth", get(net_worth))
        .route("/net-worth/history", get(history))
        .route("/metrics", get(metrics))
        .route("/distribution", get(get_distribution))
        .route("/summary", get(summary))
        .with_state(state)
}
