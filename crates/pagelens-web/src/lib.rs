//! JSON API over the page service: get-or-refresh plus the read-only
//! insight endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use pagelens_core::{Page, Post};
use pagelens_service::{AppConfig, PageService, ServiceError};
use pagelens_storage::{
    EngagementStats, PageFilters, PositionCount, PostWithComments, Store, StorageError,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const CRATE_NAME: &str = "pagelens-web";

const COMMENTS_PER_POST: i64 = 10;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(id) => ApiError::NotFound(format!("page '{id}' not found")),
            ServiceError::Storage(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: PageService,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/health/db", get(db_health_handler))
        .route("/api/v1/pages", get(search_pages_handler))
        .route("/api/v1/pages/{page_id}", get(get_page_handler))
        .route("/api/v1/pages/{page_id}/posts/recent", get(recent_posts_handler))
        .route(
            "/api/v1/pages/{page_id}/posts/with-comments",
            get(posts_with_comments_handler),
        )
        .route("/api/v1/pages/{page_id}/posts/range", get(posts_range_handler))
        .route("/api/v1/pages/{page_id}/posts/search", get(search_posts_handler))
        .route("/api/v1/pages/{page_id}/top-posts", get(top_posts_handler))
        .route("/api/v1/pages/{page_id}/engagement", get(engagement_handler))
        .route("/api/v1/pages/{page_id}/employees", get(employees_handler))
        .route(
            "/api/v1/pages/{page_id}/employees/search",
            get(search_employees_handler),
        )
        .route(
            "/api/v1/pages/{page_id}/employees/distribution",
            get(employee_distribution_handler),
        )
        .route(
            "/api/v1/pages/{page_id}/employees/recent",
            get(recent_employees_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let store = Store::connect(&config.database_url).await?;
    let acquirer = config.build_acquirer()?;
    let service = PageService::new(store, acquirer)
        .with_reconcile_mode(config.reconcile_mode)
        .with_max_posts(config.max_posts_per_page);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app(AppState { service })).await?;
    Ok(())
}

/// Reject out-of-range values instead of clamping them.
fn bounded(value: Option<i64>, default: i64, min: i64, max: i64, field: &str) -> Result<i64, ApiError> {
    let value = value.unwrap_or(default);
    if value < min || value > max {
        return Err(ApiError::Validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(value)
}

async fn index_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "pagelens",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn db_health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.service.store().health_check().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "reachable",
    })))
}

#[derive(Debug, Deserialize, Default)]
struct GetPageQuery {
    refresh: Option<bool>,
}

async fn get_page_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<GetPageQuery>,
) -> Result<Json<Page>, ApiError> {
    let page = state
        .service
        .get_or_refresh(&page_id, query.refresh.unwrap_or(false))
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize, Default)]
struct SearchPagesQuery {
    name: Option<String>,
    industry: Option<String>,
    min_followers: Option<i64>,
    max_followers: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SearchPagesResponse {
    pages: Vec<Page>,
    total: i64,
    page: i64,
    limit: i64,
}

async fn search_pages_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchPagesQuery>,
) -> Result<Json<SearchPagesResponse>, ApiError> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::Validation("page must be at least 1".to_string()));
    }
    let limit = bounded(query.limit, 10, 1, 100, "limit")?;
    let filters = PageFilters {
        name: query.name,
        industry: query.industry,
        min_followers: query.min_followers,
        max_followers: query.max_followers,
    };
    let (pages, total) = state.service.store().search_pages(&filters, page, limit).await?;
    Ok(Json(SearchPagesResponse {
        pages,
        total,
        page,
        limit,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn recent_posts_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let limit = bounded(query.limit, 15, 1, 50, "limit")?;
    let posts = state.service.store().recent_posts(&page_id, limit).await?;
    Ok(Json(posts))
}

async fn posts_with_comments_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PostWithComments>>, ApiError> {
    let limit = bounded(query.limit, 10, 1, 20, "limit")?;
    let posts = state
        .service
        .store()
        .posts_with_comments(&page_id, limit, COMMENTS_PER_POST)
        .await?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize, Default)]
struct DateRangeQuery {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

async fn posts_range_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let (Some(start), Some(end)) = (query.start, query.end) else {
        return Err(ApiError::Validation(
            "start and end are required".to_string(),
        ));
    };
    if start > end {
        return Err(ApiError::Validation(
            "start must not be after end".to_string(),
        ));
    }
    let posts = state
        .service
        .store()
        .posts_by_date_range(&page_id, start, end)
        .await?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize, Default)]
struct SearchPostsQuery {
    keyword: Option<String>,
    limit: Option<i64>,
}

async fn search_posts_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<SearchPostsQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let keyword = query.keyword.as_deref().map(str::trim).unwrap_or("");
    if keyword.chars().count() < 2 {
        return Err(ApiError::Validation(
            "keyword must be at least 2 characters".to_string(),
        ));
    }
    let limit = bounded(query.limit, 10, 1, 50, "limit")?;
    let posts = state
        .service
        .store()
        .search_posts(&page_id, keyword, limit)
        .await?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize, Default)]
struct TopPostsQuery {
    days: Option<i64>,
    limit: Option<i64>,
}

async fn top_posts_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<TopPostsQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let days = bounded(query.days, 30, 1, 365, "days")?;
    let limit = bounded(query.limit, 5, 1, 20, "limit")?;
    let posts = state
        .service
        .store()
        .top_posts(&page_id, days, limit, Utc::now())
        .await?;
    Ok(Json(posts))
}

async fn engagement_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Json<EngagementStats>, ApiError> {
    let stats = state.service.store().engagement_stats(&page_id).await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
struct EmployeesResponse {
    employees: Vec<pagelens_core::Employee>,
    total: i64,
}

async fn employees_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<EmployeesResponse>, ApiError> {
    let limit = bounded(query.limit, 20, 1, 100, "limit")?;
    let employees = state.service.store().employees(&page_id, limit).await?;
    let total = state.service.store().employee_count(&page_id).await?;
    Ok(Json(EmployeesResponse { employees, total }))
}

#[derive(Debug, Deserialize, Default)]
struct SearchEmployeesQuery {
    position: Option<String>,
    name: Option<String>,
}

async fn search_employees_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<SearchEmployeesQuery>,
) -> Result<Json<Vec<pagelens_core::Employee>>, ApiError> {
    let employees = match (query.position.as_deref(), query.name.as_deref()) {
        (Some(position), _) if !position.trim().is_empty() => {
            state
                .service
                .store()
                .employees_by_position(&page_id, position.trim())
                .await?
        }
        (_, Some(name)) if !name.trim().is_empty() => {
            state
                .service
                .store()
                .employees_by_name(&page_id, name.trim())
                .await?
        }
        _ => {
            return Err(ApiError::Validation(
                "provide a position or name to search by".to_string(),
            ))
        }
    };
    Ok(Json(employees))
}

async fn employee_distribution_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Json<Vec<PositionCount>>, ApiError> {
    let distribution = state.service.store().employee_distribution(&page_id).await?;
    Ok(Json(distribution))
}

async fn recent_employees_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<pagelens_core::Employee>>, ApiError> {
    let limit = bounded(query.limit, 10, 1, 50, "limit")?;
    let employees = state.service.store().recent_employees(&page_id, limit).await?;
    Ok(Json(employees))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pagelens_adapters::OfflineAcquirer;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let store = Store::in_memory().await.unwrap();
        let service = PageService::new(store, Arc::new(OfflineAcquirer));
        app(AppState { service })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let app = test_app().await;
        let (status, body) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get_json(app, "/api/v1/health/db").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "reachable");
    }

    #[tokio::test]
    async fn unknown_page_is_populated_on_first_request() {
        let app = test_app().await;
        let (status, body) = get_json(app, "/api/v1/pages/acme").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "acme");
        assert_eq!(body["name"], "Acme Inc.");
        assert!(body["followers"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn page_search_envelope_carries_total() {
        let app = test_app().await;
        // populate one page through the miss path first
        let (status, _) = get_json(app.clone(), "/api/v1/pages/acme").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json(app, "/api/v1/pages?page=1&limit=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["pages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_limit_is_rejected() {
        let app = test_app().await;
        let (status, body) = get_json(app.clone(), "/api/v1/pages?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("limit"));

        let (status, _) = get_json(app.clone(), "/api/v1/pages?page=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app, "/api/v1/pages/acme/top-posts?days=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_search_requires_two_character_keyword() {
        let app = test_app().await;
        let (status, _) = get_json(app.clone(), "/api/v1/pages/acme/posts/search?keyword=a").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            get_json(app, "/api/v1/pages/acme/posts/search?keyword=launch").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_array());
    }

    #[tokio::test]
    async fn employee_search_requires_a_filter() {
        let app = test_app().await;
        let (status, body) = get_json(app.clone(), "/api/v1/pages/acme/employees/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("position"));

        let (status, _) =
            get_json(app, "/api/v1/pages/acme/employees/search?position=engineer").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn read_endpoints_return_empty_for_unseen_pages() {
        let app = test_app().await;
        let (status, body) = get_json(app.clone(), "/api/v1/pages/ghost/posts/recent").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, body) = get_json(app, "/api/v1/pages/ghost/employees").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn posts_and_employees_flow_through_after_population() {
        let app = test_app().await;
        let (status, _) = get_json(app.clone(), "/api/v1/pages/acme").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_json(app.clone(), "/api/v1/pages/acme/posts/recent?limit=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = get_json(app.clone(), "/api/v1/pages/acme/engagement").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["total_posts"].as_i64().unwrap() > 0);

        let (status, body) = get_json(app, "/api/v1/pages/acme/employees/distribution").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_array());
    }

    #[tokio::test]
    async fn comment_threads_and_recent_employees_endpoints_respond() {
        let app = test_app().await;
        let (status, _) = get_json(app.clone(), "/api/v1/pages/acme").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            get_json(app.clone(), "/api/v1/pages/acme/posts/with-comments?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        let threads = body.as_array().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads[0]["comments"].is_array());

        let (status, body) =
            get_json(app.clone(), "/api/v1/pages/acme/employees/recent?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) =
            get_json(app.clone(), "/api/v1/pages/acme/posts/with-comments?limit=21").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app, "/api/v1/pages/acme/employees/recent?limit=51").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn huge_page_number_is_served_without_error() {
        let app = test_app().await;
        let (status, body) =
            get_json(app, "/api/v1/pages?page=9223372036854775807&limit=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pages"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn date_range_requires_both_bounds() {
        let app = test_app().await;
        let (status, _) = get_json(
            app.clone(),
            "/api/v1/pages/acme/posts/range?start=2026-01-01T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json(
            app,
            "/api/v1/pages/acme/posts/range?start=2026-01-01T00:00:00Z&end=2026-12-31T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_array());
    }
}
