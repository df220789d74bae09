//! HTTP server for the mortality atlas API.
//!
//! Serves the aggregated tables; the dashboard front-end draws them.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/health`         | Health check                             |
//! | GET    | `/api/options`    | Year, department and scale selectors     |
//! | GET    | `/api/map`        | Department rates, summary, choropleth    |
//! | GET    | `/api/dashboard`  | Monthly rates, KPIs and breakdowns       |
//! | GET    | `/api/logs`       | SSE stream for real-time logs            |

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{
    error_response, DashboardParams, DashboardResponse, DatasetSummary, MapParams, MapResponse,
    OptionsResponse,
};
use crate::aggregate::{dashboard_view, map_view};
use crate::cache::DatasetCache;
use crate::config::AppConfig;
use crate::error::{LoadError, QueryError, ServerResult};
use crate::loader::Dataset;
use crate::models::{DepartmentFilter, Scale, YearSelection};

/// Error half of every handler result.
type ApiError = (StatusCode, Json<Value>);

/// Parameter errors are the caller's; a failed aggregation is ours.
fn bad_request(err: QueryError) -> ApiError {
    let status = match err {
        QueryError::Frame(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(error_response(&err.to_string())))
}

fn unavailable(err: LoadError) -> ApiError {
    (StatusCode::SERVICE_UNAVAILABLE, Json(error_response(&err.to_string())))
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> ServerResult<()> {
    let cache = Arc::new(DatasetCache::new(config.data.clone()));

    // Load at start-up; a failure here is retried on the first request
    match load(cache.clone()).await {
        Ok(dataset) => log_success(format!(
            "Data ready: {} departments on the map",
            dataset.boundaries.len()
        )),
        Err((_, body)) => log_error(format!("Starting without data: {}", body.0["error"])),
    }

    let app = router(cache);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Mortality atlas running on http://localhost:{}", config.port);
    println!("   GET  /api/options   - Filter options");
    println!("   GET  /api/map       - Department rates (start, end, k)");
    println!("   GET  /api/dashboard - Monthly rates (year, department)");
    println!("   GET  /api/logs      - SSE log stream");
    println!("   GET  /health        - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes over a shared dataset cache.
pub fn router(cache: Arc<DatasetCache>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/options", get(options))
        .route("/api/map", get(map))
        .route("/api/dashboard", get(dashboard))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(cache)
}

/// The cached dataset; file reads run off the async workers.
async fn load(cache: Arc<DatasetCache>) -> Result<Arc<Dataset>, ApiError> {
    if let Some(dataset) = cache.get() {
        return Ok(dataset);
    }
    tokio::task::spawn_blocking(move || cache.get_or_load())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response(&format!("Load task failed: {}", e))),
            )
        })?
        .map_err(unavailable)
}

/// Health check endpoint
async fn health(State(cache): State<Arc<DatasetCache>>) -> Json<Value> {
    let data = cache.get().map(|ds| DatasetSummary::from(ds.as_ref()));
    Json(json!({
        "status": "ok",
        "service": "mortality-atlas",
        "version": env!("CARGO_PKG_VERSION"),
        "dataLoaded": data.is_some(),
        "data": data,
    }))
}

async fn options(State(cache): State<Arc<DatasetCache>>) -> Result<Json<OptionsResponse>, ApiError> {
    let dataset = load(cache).await?;
    Ok(Json(OptionsResponse::from(dataset.as_ref())))
}

/// Department rates; missing years default to the full available range.
async fn map(
    State(cache): State<Arc<DatasetCache>>,
    Query(params): Query<MapParams>,
) -> Result<Json<MapResponse>, ApiError> {
    let dataset = load(cache).await?;

    let years = dataset.total_years();
    let (start, end) = match (
        params.start.or(years.first().copied()),
        params.end.or(years.last().copied()),
    ) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(error_response("No years available: pass start and end")),
            ))
        }
    };
    let scale = match params.k {
        Some(k) => Scale::try_from(k).map_err(bad_request)?,
        None => Scale::default(),
    };

    let view = map_view(&dataset, start, end, scale).map_err(bad_request)?;
    log_info(format!(
        "Map {}-{} k={}: {} departments",
        start,
        end,
        scale.value(),
        view.rates.len()
    ));
    Ok(Json(MapResponse::from(view)))
}

/// Monthly rates and breakdowns; absent parameters mean `Todos`.
async fn dashboard(
    State(cache): State<Arc<DatasetCache>>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let dataset = load(cache).await?;

    let years: YearSelection = params
        .year
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(bad_request)?;
    let department = DepartmentFilter::parse(params.department.as_deref().unwrap_or_default());

    let view = dashboard_view(&dataset, years, department).map_err(bad_request)?;
    Ok(Json(DashboardResponse::from(view)))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // lagged subscriber: skip what was dropped
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
