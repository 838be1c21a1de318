use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::db::{self, Database, NewArticle, NewSource};
use crate::error::{Error, Result};
use crate::newsapi::{ArticleDto, NewsApiClient, SourceDto};
use crate::reconcile;

/// Outcome of one successful ingestion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl NewArticle {
    pub fn from_dto(dto: &ArticleDto, source_id: Option<i64>, category_id: i64) -> Self {
        Self {
            source_id,
            category_id,
            author: dto.author.clone(),
            title: dto.title.clone(),
            description: dto.description.clone(),
            url: dto.url.clone(),
            url_to_image: dto.url_to_image.clone(),
            published_at: dto.published_at.clone(),
            content: dto.content.clone(),
        }
    }
}

impl NewSource {
    /// Returns `None` for records without a usable name.
    pub fn from_dto(dto: &SourceDto) -> Option<Self> {
        let name = non_empty(&dto.name)?;
        Some(Self {
            sid: dto.id.clone(),
            name: name.to_string(),
            description: dto.description.clone(),
            url: dto.url.clone(),
            category: dto.category.clone(),
            language: dto.language.clone(),
            country: dto.country.clone(),
        })
    }
}

/// Fetches from the news API and writes the results, one batch per call.
/// Batches are serialized and each runs in a single transaction.
pub struct Ingestor {
    client: NewsApiClient,
    db: Arc<Database>,
    running: Mutex<()>,
}

impl Ingestor {
    pub fn new(client: NewsApiClient, db: Arc<Database>) -> Self {
        Self {
            client,
            db,
            running: Mutex::new(()),
        }
    }

    pub async fn input_sources(&self) -> Result<IngestReport> {
        let response = self.client.fetch_sources().await.map_err(|e| {
            error!("Failed to fetch sources: {}", e);
            e
        })?;
        info!("Received {} sources", response.sources.len());

        self.save_sources(&response.sources).await
    }

    pub async fn input_articles(&self, category: &str) -> Result<IngestReport> {
        let category = category.trim();
        if category.is_empty() {
            return Err(Error::EmptyCategoryName);
        }

        let response = self.client.fetch_articles(category).await.map_err(|e| {
            error!("Failed to fetch articles for '{}': {}", category, e);
            e
        })?;
        info!(
            "Received {} articles for '{}' (total results: {})",
            response.articles.len(),
            category,
            response.total_results.unwrap_or_default()
        );

        self.save_articles(&response.articles, category).await
    }

    pub async fn save_sources(&self, sources: &[SourceDto]) -> Result<IngestReport> {
        let _running = self.running.lock().await;
        let mut report = IngestReport::default();
        let mut tx = self.db.begin().await?;

        for dto in sources {
            let Some(source) = NewSource::from_dto(dto) else {
                warn!("Skipping source without a name (id: {:?})", dto.id);
                report.skipped += 1;
                continue;
            };

            if db::insert_source_if_absent(&mut tx, &source).await? {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        tx.commit().await?;
        info!(
            "Source ingestion complete: {} inserted, {} skipped",
            report.inserted, report.skipped
        );
        Ok(report)
    }

    pub async fn save_articles(&self, articles: &[ArticleDto], category: &str) -> Result<IngestReport> {
        let category = category.trim();
        if category.is_empty() {
            return Err(Error::EmptyCategoryName);
        }

        let _running = self.running.lock().await;
        let mut report = IngestReport::default();
        let mut tx = self.db.begin().await?;

        for dto in articles {
            if let Some(url) = dto.url.as_deref().filter(|u| !u.is_empty()) {
                if db::article_url_exists(&mut tx, url).await? {
                    report.skipped += 1;
                    continue;
                }
            }

            let source_id = match non_empty(&dto.source.name) {
                Some(name) => Some(reconcile::resolve_source(&mut tx, name).await?.id),
                None => None,
            };
            let category_row = reconcile::resolve_category(&mut tx, category).await?;

            db::insert_article(&mut tx, &NewArticle::from_dto(dto, source_id, category_row.id))
                .await?;
            report.inserted += 1;
        }

        tx.commit().await?;
        info!(
            "Article ingestion for '{}' complete: {} inserted, {} skipped",
            category, report.inserted, report.skipped
        );
        Ok(report)
    }
}
