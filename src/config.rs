use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Rows per page on paginated listings
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub newsapi: NewsApiConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8090".to_string()
}

fn default_database_url() -> String {
    "sqlite:news_admin.db?mode=rwc".to_string()
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsApiConfig {
    pub source_url: String,
    pub article_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies `DATABASE_URL` and `NEWSAPI_KEY` from the environment, when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(key) = std::env::var("NEWSAPI_KEY") {
            self.newsapi.api_key = key;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
        [newsapi]
        source_url = "https://newsapi.org/v2/top-headlines/sources"
        article_url = "https://newsapi.org/v2/top-headlines?country=us"
    "#;

    #[test]
    fn test_defaults() {
        assert_eq!(default_bind_addr(), "0.0.0.0:8090");
        assert_eq!(default_page_size(), 20);
        assert_eq!(default_request_timeout(), 30);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            bind_addr = "127.0.0.1:9000"
            database_url = "sqlite::memory:"
            page_size = 50

            [newsapi]
            source_url = "https://newsapi.org/v2/top-headlines/sources"
            article_url = "https://newsapi.org/v2/top-headlines?country=kr"
            api_key = "secret"
            request_timeout_secs = 5
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.page_size, 50);
        assert_eq!(
            config.newsapi.article_url,
            "https://newsapi.org/v2/top-headlines?country=kr"
        );
        assert_eq!(config.newsapi.api_key, "secret");
        assert_eq!(config.newsapi.request_timeout_secs, 5);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_str(MINIMAL).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8090");
        assert_eq!(config.database_url, "sqlite:news_admin.db?mode=rwc");
        assert_eq!(config.page_size, 20);
        assert!(config.newsapi.api_key.is_empty());
        assert_eq!(config.newsapi.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/news-admin.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"this is not valid toml {{{").unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_newsapi_section() {
        let result = Config::from_str("page_size = 10");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_article_url() {
        let content = r#"
            [newsapi]
            source_url = "https://newsapi.org/v2/top-headlines/sources"
        "#;

        assert!(Config::from_str(content).is_err());
    }
}
