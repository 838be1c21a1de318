use crate::db::{CategoryCount, Database, RecordCounts, SourceCount};
use crate::error::Result;

/// Number of sources listed individually on the statistics page.
pub const TOP_SOURCES: i64 = 10;

#[derive(Debug, Clone)]
pub struct ArticleStats {
    pub total: i64,
    pub by_category: Vec<CategoryCount>,
    pub top_sources: Vec<SourceCount>,
    /// Articles not covered by `top_sources`, including those without a source
    pub remainder: i64,
}

impl ArticleStats {
    pub async fn collect(db: &Database, top_n: i64) -> Result<Self> {
        let total = db.get_article_count().await?;
        let by_category = db.count_articles_by_category().await?;
        let top_sources = db.count_articles_by_source(top_n).await?;
        let remainder = total - top_sources.iter().map(|s| s.count).sum::<i64>();

        Ok(Self {
            total,
            by_category,
            top_sources,
            remainder,
        })
    }
}

pub async fn record_counts(db: &Database) -> Result<RecordCounts> {
    db.get_record_counts().await
}
