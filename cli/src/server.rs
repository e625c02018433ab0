use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use thali_core::dataset::DatasetCache;
use thali_core::db::Database;
use thali_core::error::{FoodError, FoodResult};
use thali_core::models::{
    AddFood, DailyTotals, DayCalories, FoodLogEntry, FoodMaster, Suggestion, UpdateFoodLog,
};
use thali_core::providers::ProviderChain;
use thali_core::service::{ThaliService, parse_date};

use crate::config::DEFAULT_USER;

const BODY_LIMIT: usize = 64 * 1024;
const USER_HEADER: &str = "x-user-id";
const MAX_USER_ID_LEN: usize = 128;

/// Each request opens its own connection, so a slow provider lookup for one
/// caller never holds a lock another caller needs.
#[derive(Clone)]
struct AppState {
    db_path: Arc<PathBuf>,
    dataset: Arc<DatasetCache>,
    chain: Arc<ProviderChain>,
}

impl AppState {
    /// Run a service call on a blocking thread.
    async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ThaliService, &ProviderChain) -> FoodResult<T> + Send + 'static,
    {
        let state = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            let db = Database::open(&state.db_path)?;
            let service = ThaliService::with_parts(db, Arc::clone(&state.dataset));
            f(&service, state.chain.as_ref()).map_err(ApiError::from)
        });
        match task.await {
            Ok(result) => result,
            Err(e) => Err(ApiError::Internal(anyhow!("request task failed: {e}"))),
        }
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SuggestQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ResolveQuery {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct WeeklyQuery {
    end: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Caller identity set by the upstream auth layer.
struct UserId(String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Ok(Self(DEFAULT_USER.to_string()));
        };
        let user = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {USER_HEADER} header")))?
            .trim();
        if user.len() > MAX_USER_ID_LEN {
            return Err(ApiError::BadRequest(format!("{USER_HEADER} is too long")));
        }
        if user.is_empty() {
            Ok(Self(DEFAULT_USER.to_string()))
        } else {
            Ok(Self(user.to_string()))
        }
    }
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<FoodError> for ApiError {
    fn from(err: FoodError) -> Self {
        match err {
            FoodError::Validation(msg) => Self::BadRequest(msg),
            e @ FoodError::NotInCatalog(_) => Self::NotFound(e.to_string()),
            e @ FoodError::ProviderUnavailable(_) => Self::Unavailable(e.to_string()),
            FoodError::Storage(e) => Self::Internal(e),
            e @ FoodError::PersistenceConflict(_) => Self::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn date_or_today(date: Option<&str>) -> FoodResult<NaiveDate> {
    date.map_or_else(|| Ok(Local::now().date_naive()), parse_date)
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn suggest_foods(
    State(state): State<AppState>,
    Query(q): Query<SuggestQuery>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let suggestions = state
        .run(move |svc, _| Ok(svc.suggest(&q.q, q.limit)))
        .await?;
    Ok(Json(suggestions))
}

async fn resolve_food(
    State(state): State<AppState>,
    Query(q): Query<ResolveQuery>,
) -> Result<Json<FoodMaster>, ApiError> {
    let food = state
        .run(move |svc, chain| svc.resolve_food(Some(chain), &q.name))
        .await?;
    Ok(Json(food))
}

async fn create_food_log(
    State(state): State<AppState>,
    UserId(user): UserId,
    Json(req): Json<AddFood>,
) -> Result<(StatusCode, Json<FoodLogEntry>), ApiError> {
    let entry = state
        .run(move |svc, chain| svc.add_food(Some(chain), &user, &req))
        .await?;
    info!(id = entry.id, food = %entry.food_name, "food logged");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_food_logs(
    State(state): State<AppState>,
    UserId(user): UserId,
    Query(q): Query<DateQuery>,
) -> Result<Json<Vec<FoodLogEntry>>, ApiError> {
    let date = date_or_today(q.date.as_deref())?;
    let entries = state
        .run(move |svc, _| svc.logs_for_date(&user, date))
        .await?;
    Ok(Json(entries))
}

async fn update_food_log(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<i64>,
    Json(update): Json<UpdateFoodLog>,
) -> Result<Json<FoodLogEntry>, ApiError> {
    state
        .run(move |svc, _| svc.update_log(&user, id, &update))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Entry {id} not found")))
}

async fn delete_food_log(
    State(state): State<AppState>,
    UserId(user): UserId,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.run(move |svc, _| svc.delete_log(&user, id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

async fn daily_totals(
    State(state): State<AppState>,
    UserId(user): UserId,
    Query(q): Query<DateQuery>,
) -> Result<Json<DailyTotals>, ApiError> {
    let date = date_or_today(q.date.as_deref())?;
    let totals = state
        .run(move |svc, _| svc.daily_totals(&user, date))
        .await?;
    Ok(Json(totals))
}

async fn weekly_calories(
    State(state): State<AppState>,
    UserId(user): UserId,
    Query(q): Query<WeeklyQuery>,
) -> Result<Json<Vec<DayCalories>>, ApiError> {
    let end = date_or_today(q.end.as_deref())?;
    let days = state
        .run(move |svc, _| svc.weekly_calories(&user, end))
        .await?;
    Ok(Json(days))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/foods/suggest", get(suggest_foods))
        .route("/api/foods/resolve", get(resolve_food))
        .route("/api/food-logs", post(create_food_log).get(list_food_logs))
        .route("/api/food-logs/totals", get(daily_totals))
        .route("/api/food-logs/weekly", get(weekly_calories))
        .route(
            "/api/food-logs/{id}",
            put(update_food_log).delete(delete_food_log),
        )
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db_path: PathBuf,
    dataset_path: PathBuf,
    chain: ProviderChain,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    // Migrate once up front so a bad path fails at startup, not per request.
    Database::open(&db_path)?;

    let providers: Vec<&str> = chain.names().collect();
    info!(
        db = %db_path.display(),
        dataset = %dataset_path.display(),
        ?providers,
        "starting server"
    );

    let state = AppState {
        db_path: Arc::new(db_path),
        dataset: Arc::new(DatasetCache::new(dataset_path)),
        chain: Arc::new(chain),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!("listening on http://{bind}:{port}");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
