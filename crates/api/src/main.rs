use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use psipay_core::compare::{CompareError, CompareResult};
use psipay_core::domain::category::Category;
use psipay_core::domain::criteria::{Criteria, MAX_HISTORY_MONTHS};
use psipay_core::domain::recommendation::RecommendationsResponse;
use psipay_core::ingest::error::SeriesError;
use psipay_core::ingest::live::ProductsQuery;
use psipay_core::ingest::types::{ProductsSnapshot, Window};
use psipay_core::service::{Advisor, RecommendOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = psipay_core::config::Settings::from_env()?;
    let _sentry_guard = psipay_core::telemetry::init(&settings, sentry::release_name!());

    let pool = connect_pool(&settings).await;
    let cache = psipay_core::storage::series_cache(&settings, pool);
    let advisor = Advisor::from_settings(&settings, cache)?;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/products/:category", get(get_products))
        .route("/compare", post(post_compare))
        .route(
            "/recommendations",
            get(get_recommendations).post(post_recommendations),
        )
        .with_state(AppState { advisor })
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %Uuid::new_v4(),
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        );

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Without a reachable database the API still serves, just uncached.
async fn connect_pool(settings: &psipay_core::config::Settings) -> Option<PgPool> {
    if settings.cache_backend != psipay_core::config::CacheBackend::Postgres {
        return None;
    }
    let db_url = match settings.require_database_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            return None;
        }
    };
    match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => match psipay_core::storage::migrate(&pool).await {
            Ok(()) => Some(pool),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            None
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    advisor: Advisor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: &'static str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    InvalidCategory(String),
    InvalidCriteria(String),
    UpstreamData(String),
    Internal,
}

impl ApiError {
    /// Named upstream-data failures are the caller's business; anything
    /// else is reported to Sentry and hidden behind a generic message.
    fn from_service(err: anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<SeriesError>() {
            return ApiError::UpstreamData(e.to_string());
        }
        if let Some(e) = err.downcast_ref::<CompareError>() {
            return ApiError::UpstreamData(e.to_string());
        }
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "request failed");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::InvalidCategory(m) => (StatusCode::BAD_REQUEST, "invalid_category", m),
            ApiError::InvalidCriteria(m) => (StatusCode::BAD_REQUEST, "invalid_criteria", m),
            ApiError::UpstreamData(m) => (StatusCode::BAD_GATEWAY, "upstream_data_error", m),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "unexpected error".to_string(),
            ),
        };
        (status, Json(ErrorBody { error_code, message })).into_response()
    }
}

fn parse_category(raw: &str) -> Result<Category, ApiError> {
    raw.parse::<Category>()
        .map_err(|e| ApiError::InvalidCategory(e.to_string()))
}

fn parse_criteria(category: Category, raw: &serde_json::Value) -> Result<Criteria, ApiError> {
    Criteria::from_json(category, raw).map_err(|e| ApiError::InvalidCriteria(e.to_string()))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductsParams {
    from: Option<String>,
    to: Option<String>,
    horizon_months: Option<u32>,
    #[serde(default)]
    skip_cache: bool,
}

fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ApiError::InvalidCriteria(format!("{field} must be YYYY-MM-DD")))
        })
        .transpose()
}

impl ProductsParams {
    fn query(&self) -> Result<ProductsQuery, ApiError> {
        Ok(ProductsQuery {
            window: Window {
                from: parse_date(self.from.as_deref(), "from")?,
                to: parse_date(self.to.as_deref(), "to")?,
                months: self.horizon_months.map(|m| m.clamp(1, MAX_HISTORY_MONTHS)),
            },
            bypass_cache: self.skip_cache,
        })
    }
}

async fn get_products(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<ProductsParams>,
) -> Result<Json<ProductsSnapshot>, ApiError> {
    let category = parse_category(&category)?;
    let query = params.query()?;
    let snapshot = state
        .advisor
        .products(category, query, today())
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest {
    category: String,
    #[serde(default)]
    criteria: serde_json::Value,
    #[serde(default)]
    skip_cache: bool,
}

async fn post_compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResult>, ApiError> {
    let category = parse_category(&req.category)?;
    let criteria = parse_criteria(category, &req.criteria)?;
    let compare = state
        .advisor
        .compare(&criteria, req.skip_cache, today())
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(compare))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsRequest {
    category: String,
    #[serde(default)]
    criteria: serde_json::Value,
    #[serde(default)]
    skip_cache: bool,
    use_ai: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationsParams {
    category: String,
    criteria: Option<String>,
    #[serde(default)]
    skip_cache: bool,
}

impl RecommendationsParams {
    /// `criteria` arrives as URL-encoded JSON text.
    fn into_request(self) -> Result<RecommendationsRequest, ApiError> {
        let criteria = match self.criteria.as_deref().map(str::trim) {
            None | Some("") => serde_json::Value::Null,
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| ApiError::InvalidCriteria(format!("criteria is not valid JSON: {e}")))?,
        };
        Ok(RecommendationsRequest {
            category: self.category,
            criteria,
            skip_cache: self.skip_cache,
            use_ai: None,
        })
    }
}

async fn recommendations(
    state: &AppState,
    req: RecommendationsRequest,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let category = parse_category(&req.category)?;
    let criteria = parse_criteria(category, &req.criteria)?;
    let options = RecommendOptions {
        bypass_cache: req.skip_cache,
        use_ai: req.use_ai.unwrap_or(true),
    };
    let response = state
        .advisor
        .recommend(&criteria, options, today())
        .await
        .map_err(ApiError::from_service)?;
    Ok(Json(response))
}

async fn post_recommendations(
    State(state): State<AppState>,
    Json(req): Json<RecommendationsRequest>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    recommendations(&state, req).await
}

async fn get_recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationsParams>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    recommendations(&state, params.into_request()?).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn error_statuses() {
        assert_eq!(status_of(ApiError::InvalidCategory("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::InvalidCriteria("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::UpstreamData("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ApiError::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_shape_errors_map_to_bad_gateway() {
        let err = anyhow::Error::new(SeriesError::MissingDateColumn);
        assert!(matches!(ApiError::from_service(err), ApiError::UpstreamData(_)));
        let err = anyhow::Error::new(CompareError::MissingSeries);
        assert!(matches!(ApiError::from_service(err), ApiError::UpstreamData(_)));
        let err = anyhow::anyhow!("pool timed out");
        assert!(matches!(ApiError::from_service(err), ApiError::Internal));
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(matches!(parse_category("loans"), Err(ApiError::InvalidCategory(_))));
        assert_eq!(parse_category("credit-cards").unwrap(), Category::CreditCards);
    }

    #[test]
    fn products_params_clamp_and_parse_dates() {
        let params = ProductsParams {
            from: Some("2025-01-01".to_string()),
            to: None,
            horizon_months: Some(999),
            skip_cache: true,
        };
        let query = params.query().unwrap();
        assert_eq!(query.window.from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(query.window.months, Some(MAX_HISTORY_MONTHS));
        assert!(query.bypass_cache);

        let bad = ProductsParams {
            from: Some("01/01/2025".to_string()),
            ..ProductsParams::default()
        };
        assert!(matches!(bad.query(), Err(ApiError::InvalidCriteria(_))));
    }

    #[test]
    fn query_string_criteria_must_be_json() {
        let params = RecommendationsParams {
            category: "savings".to_string(),
            criteria: Some("{\"deposit\": 5000}".to_string()),
            skip_cache: false,
        };
        let req = params.into_request().unwrap();
        assert_eq!(req.criteria["deposit"], 5000);

        let params = RecommendationsParams {
            category: "savings".to_string(),
            criteria: Some("deposit=5000".to_string()),
            skip_cache: false,
        };
        assert!(matches!(params.into_request(), Err(ApiError::InvalidCriteria(_))));
    }
}
