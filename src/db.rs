use std::str::FromStr;

use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub memo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Category {
    pub fn memo_text(&self) -> &str {
        self.memo.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Source {
    pub id: i64,
    pub sid: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Source {
    pub fn sid_text(&self) -> &str {
        self.sid.as_deref().unwrap_or("")
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn url_text(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }

    pub fn category_text(&self) -> &str {
        self.category.as_deref().unwrap_or("")
    }

    pub fn language_text(&self) -> &str {
        self.language.as_deref().unwrap_or("")
    }

    pub fn country_text(&self) -> &str {
        self.country.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Article {
    pub id: i64,
    pub source_id: Option<i64>,
    pub category_id: i64,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields of an article row before it has an id.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub source_id: Option<i64>,
    pub category_id: i64,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

/// Fields of a source row as delivered by the sources endpoint.
#[derive(Debug, Clone, Default)]
pub struct NewSource {
    pub sid: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

/// Article joined with the names of its source and category, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct ArticleView {
    pub id: i64,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
    pub category_name: String,
}

impl ArticleView {
    pub fn title_text(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }

    pub fn author_text(&self) -> &str {
        self.author.as_deref().unwrap_or("")
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn url_text(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }

    pub fn published_text(&self) -> &str {
        self.published_at.as_deref().unwrap_or("")
    }

    pub fn source_text(&self) -> &str {
        self.source_name.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SourceCount {
    pub source_name: String,
    pub url: Option<String>,
    pub count: i64,
}

impl SourceCount {
    pub fn url_text(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordCounts {
    pub articles: i64,
    pub sources: i64,
    pub categories: i64,
}

/// One page of a listing. `number` is zero-based.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    pub size: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        (self.total + self.size - 1) / self.size
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    pub fn has_next(&self) -> bool {
        self.number.saturating_add(1).saturating_mul(self.size) < self.total
    }

    pub fn previous(&self) -> i64 {
        (self.number - 1).max(0)
    }

    pub fn next(&self) -> i64 {
        self.number.saturating_add(1)
    }

    /// One-based page number for display.
    pub fn display_number(&self) -> i64 {
        self.number.saturating_add(1)
    }
}

pub const MAX_PAGE_SIZE: i64 = 100;

fn clamp_page(page: i64, size: i64) -> (i64, i64) {
    (page.max(0), size.clamp(1, MAX_PAGE_SIZE))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

        // Every connection to `:memory:` is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                memo TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sid TEXT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                url TEXT,
                category TEXT,
                language TEXT,
                country TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER REFERENCES source(id) ON DELETE SET NULL,
                category_id INTEGER NOT NULL REFERENCES category(id) ON DELETE RESTRICT,
                author TEXT,
                title TEXT,
                description TEXT,
                url TEXT,
                url_to_image TEXT,
                published_at TEXT,
                content TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_article_url ON article(url)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_article_category ON article(category_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_article_source ON article(source_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Starts a transaction; ingestion batches run entirely inside one.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // Category operations

    pub async fn get_all_categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM category ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM category WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn insert_category(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyCategoryName);
        }

        let now = now();
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO category (name, memo, created_at, updated_at)
            VALUES (?, NULL, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::from_category_write(e, name))?;

        Ok(category)
    }

    pub async fn update_category(&self, id: i64, name: &str, memo: Option<&str>) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyCategoryName);
        }
        let memo = memo.map(str::trim).filter(|m| !m.is_empty());

        let result = sqlx::query(
            r#"
            UPDATE category
            SET name = ?, memo = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(memo)
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_category_write(e, name))?;

        if result.rows_affected() == 0 {
            return Err(Error::CategoryNotFound(id));
        }
        Ok(())
    }

    /// Deletes a category. Categories still referenced by articles are
    /// refused; the foreign key enforces the same rule at the storage layer.
    pub async fn delete_category(&self, id: i64) -> Result<()> {
        if self.get_category(id).await?.is_none() {
            return Err(Error::CategoryNotFound(id));
        }

        let articles = self.get_article_count_for_category(id).await?;
        if articles > 0 {
            return Err(Error::CategoryInUse { id, articles });
        }

        let result = sqlx::query("DELETE FROM category WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                    Error::CategoryInUse { id, articles: 1 }
                }
                _ => Error::Storage(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::CategoryNotFound(id));
        }
        Ok(())
    }

    // Source operations

    pub async fn get_sources_page(&self, page: i64, size: i64) -> Result<Page<Source>> {
        let (page, size) = clamp_page(page, size);

        let items = sqlx::query_as::<_, Source>(
            "SELECT * FROM source ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(size)
        .bind(page.saturating_mul(size))
        .fetch_all(&self.pool)
        .await?;
        let total = self.get_source_count().await?;

        Ok(Page {
            items,
            number: page,
            size,
            total,
        })
    }

    pub async fn get_source_by_name(&self, name: &str) -> Result<Option<Source>> {
        let source = sqlx::query_as::<_, Source>("SELECT * FROM source WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(source)
    }

    // Article operations

    pub async fn get_articles_page(&self, page: i64, size: i64) -> Result<Page<ArticleView>> {
        let (page, size) = clamp_page(page, size);

        let items = sqlx::query_as::<_, ArticleView>(
            r#"
            SELECT a.id, a.author, a.title, a.description, a.url, a.url_to_image,
                   a.published_at, s.name AS source_name, c.name AS category_name
            FROM article a
            JOIN category c ON c.id = a.category_id
            LEFT JOIN source s ON s.id = a.source_id
            ORDER BY a.published_at DESC NULLS LAST, a.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(size)
        .bind(page.saturating_mul(size))
        .fetch_all(&self.pool)
        .await?;
        let total = self.get_article_count().await?;

        Ok(Page {
            items,
            number: page,
            size,
            total,
        })
    }

    pub async fn get_articles_by_url(&self, url: &str) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>("SELECT * FROM article WHERE url = ? ORDER BY id")
            .bind(url)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    // Aggregates

    pub async fn get_article_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM article")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn get_source_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM source")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn get_category_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM category")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn get_article_count_for_category(&self, category_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM article WHERE category_id = ?")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn get_record_counts(&self) -> Result<RecordCounts> {
        Ok(RecordCounts {
            articles: self.get_article_count().await?,
            sources: self.get_source_count().await?,
            categories: self.get_category_count().await?,
        })
    }

    pub async fn count_articles_by_category(&self) -> Result<Vec<CategoryCount>> {
        let counts = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT c.name AS category, COUNT(a.id) AS count
            FROM article a
            JOIN category c ON c.id = a.category_id
            GROUP BY c.id, c.name
            ORDER BY count DESC, c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// Sources with the most articles, at most `limit` of them. Articles
    /// without a source are not part of any group.
    pub async fn count_articles_by_source(&self, limit: i64) -> Result<Vec<SourceCount>> {
        let counts = sqlx::query_as::<_, SourceCount>(
            r#"
            SELECT s.name AS source_name, s.url AS url, COUNT(a.id) AS count
            FROM article a
            JOIN source s ON s.id = a.source_id
            GROUP BY s.id, s.name, s.url
            ORDER BY count DESC, s.name
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}

// Connection-level operations used inside ingestion transactions

pub async fn find_source_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Source>> {
    let source = sqlx::query_as::<_, Source>("SELECT * FROM source WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(source)
}

pub async fn find_category_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM category WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(category)
}

/// Inserts a source unless one with the same name exists. Returns whether a
/// row was written.
pub async fn insert_source_if_absent(conn: &mut SqliteConnection, source: &NewSource) -> Result<bool> {
    let now = now();
    let result = sqlx::query(
        r#"
        INSERT INTO source (sid, name, description, url, category, language, country,
                            created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(&source.sid)
    .bind(&source.name)
    .bind(&source.description)
    .bind(&source.url)
    .bind(&source.category)
    .bind(&source.language)
    .bind(&source.country)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_category_if_absent(conn: &mut SqliteConnection, name: &str) -> Result<bool> {
    let now = now();
    let result = sqlx::query(
        r#"
        INSERT INTO category (name, memo, created_at, updated_at)
        VALUES (?, NULL, ?, ?)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn article_url_exists(conn: &mut SqliteConnection, url: &str) -> Result<bool> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM article WHERE url = ? LIMIT 1")
        .bind(url)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub async fn insert_article(conn: &mut SqliteConnection, article: &NewArticle) -> Result<i64> {
    let now = now();
    let result = sqlx::query(
        r#"
        INSERT INTO article (source_id, category_id, author, title, description, url,
                             url_to_image, published_at, content, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(article.source_id)
    .bind(article.category_id)
    .bind(&article.author)
    .bind(&article.title)
    .bind(&article.description)
    .bind(&article.url)
    .bind(&article.url_to_image)
    .bind(&article.published_at)
    .bind(&article.content)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}
