use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("news API request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("could not decode news API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("news API returned an error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("invalid news API endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("category {0} not found")]
    CategoryNotFound(i64),

    #[error("category {id} is still used by {articles} article(s)")]
    CategoryInUse { id: i64, articles: i64 },

    #[error("category name must not be empty")]
    EmptyCategoryName,
}

impl Error {
    /// Maps a unique-constraint violation on the category name to
    /// [`Error::DuplicateCategory`]; anything else stays a storage error.
    pub(crate) fn from_category_write(err: sqlx::Error, name: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::DuplicateCategory(name.to_string())
            }
            _ => Error::Storage(err),
        }
    }
}
