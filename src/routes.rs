use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::db::{ArticleView, Category, Database, Page, RecordCounts, Source};
use crate::ingest::Ingestor;
use crate::report::{self, ArticleStats, TOP_SOURCES};

pub struct AppState {
    pub db: Arc<Database>,
    pub ingestor: Arc<Ingestor>,
    pub page_size: i64,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/news", get(news))
        .route("/health", get(health))
        .route("/admin", get(admin_index))
        .route("/admin/", get(admin_index))
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/category", get(list_categories))
        .route("/admin/inputCategory", post(input_category))
        .route("/admin/updateCategory/:id", post(update_category))
        .route("/admin/deleteCategory/:id", post(delete_category))
        .route("/admin/source", get(list_sources))
        .route("/admin/inputSources", get(input_sources))
        .route("/admin/article", get(article_stats))
        .route("/admin/inputArticles", post(input_articles))
        .nest_service("/static", ServeDir::new("static"))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate {
    pub categories: Vec<Category>,
    pub error: String,
}

#[derive(Template)]
#[template(path = "source.html")]
pub struct SourceTemplate {
    pub sources: Page<Source>,
    pub error: String,
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub stats: ArticleStats,
    pub categories: Vec<Category>,
    pub error: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub counts: RecordCounts,
}

#[derive(Template)]
#[template(path = "news.html")]
pub struct NewsTemplate {
    pub articles: Page<ArticleView>,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    /// Zero-based page number
    #[serde(default)]
    pub page: i64,
    pub size: Option<i64>,
}

#[derive(Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub category_name: String,
}

#[derive(Deserialize)]
pub struct UpdateCategoryForm {
    pub name: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Deserialize)]
pub struct ArticlesForm {
    #[serde(rename = "categoryName")]
    pub category_name: String,
}

const CATEGORY_PAGE: &str = "/admin/category";
const SOURCE_PAGE: &str = "/admin/source";
const ARTICLE_PAGE: &str = "/admin/article";

async fn render_categories(state: &AppState, error: String) -> Result<Response, AppError> {
    let categories = state.db.get_all_categories().await?;
    Ok(HtmlTemplate(CategoryTemplate { categories, error }).into_response())
}

async fn render_sources(
    state: &AppState,
    query: &PageQuery,
    error: String,
) -> Result<Response, AppError> {
    let size = query.size.unwrap_or(state.page_size);
    let sources = state.db.get_sources_page(query.page, size).await?;
    Ok(HtmlTemplate(SourceTemplate { sources, error }).into_response())
}

async fn render_article_stats(state: &AppState, error: String) -> Result<Response, AppError> {
    let stats = ArticleStats::collect(&state.db, TOP_SOURCES).await?;
    let categories = state.db.get_all_categories().await?;
    Ok(HtmlTemplate(ArticleTemplate {
        stats,
        categories,
        error,
    })
    .into_response())
}

// Route handlers
pub async fn index() -> Redirect {
    Redirect::to("/news")
}

pub async fn admin_index() -> Redirect {
    Redirect::to("/admin/dashboard")
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let size = query.size.unwrap_or(state.page_size);
    let articles = state.db.get_articles_page(query.page, size).await?;
    Ok(HtmlTemplate(NewsTemplate { articles }))
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let counts = report::record_counts(&state.db).await?;
    Ok(HtmlTemplate(DashboardTemplate { counts }))
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    render_categories(&state, String::new()).await
}

pub async fn input_category(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    if form.category_name.trim().is_empty() {
        return Ok(Redirect::to(CATEGORY_PAGE).into_response());
    }

    match state.db.insert_category(&form.category_name).await {
        Ok(category) => {
            info!("Created category '{}' ({})", category.name, category.id);
            Ok(Redirect::to(CATEGORY_PAGE).into_response())
        }
        Err(e) => {
            warn!("Failed to create category '{}': {}", form.category_name, e);
            render_categories(&state, format!("ERROR: {}", e)).await
        }
    }
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Form(form): Form<UpdateCategoryForm>,
) -> Result<Response, AppError> {
    match state
        .db
        .update_category(id, &form.name, Some(&form.memo))
        .await
    {
        Ok(()) => Ok(Redirect::to(CATEGORY_PAGE).into_response()),
        Err(e) => {
            warn!("Failed to update category {}: {}", id, e);
            render_categories(&state, format!("ERROR: {}", e)).await
        }
    }
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    match state.db.delete_category(id).await {
        Ok(()) => {
            info!("Deleted category {}", id);
            Ok(Redirect::to(CATEGORY_PAGE).into_response())
        }
        Err(e) => {
            warn!("Failed to delete category {}: {}", id, e);
            render_categories(&state, format!("ERROR: {}", e)).await
        }
    }
}

pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    render_sources(&state, &query, String::new()).await
}

pub async fn input_sources(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    match state.ingestor.input_sources().await {
        Ok(_) => Ok(Redirect::to(SOURCE_PAGE).into_response()),
        Err(e) => {
            warn!("Failed to import sources: {}", e);
            let first_page = PageQuery {
                page: 0,
                size: None,
            };
            render_sources(&state, &first_page, format!("ERROR: {}", e)).await
        }
    }
}

pub async fn article_stats(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    render_article_stats(&state, String::new()).await
}

pub async fn input_articles(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ArticlesForm>,
) -> Result<Response, AppError> {
    match state.ingestor.input_articles(&form.category_name).await {
        Ok(_) => Ok(Redirect::to(ARTICLE_PAGE).into_response()),
        Err(e) => {
            warn!(
                "Failed to import articles for '{}': {}",
                form.category_name, e
            );
            render_article_stats(&state, format!("ERROR: {}", e)).await
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
