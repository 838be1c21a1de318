use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::NewsApiConfig;
use crate::error::{Error, Result};

/// Body of the sources endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SourceResponse {
    pub status: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub sources: Vec<SourceDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceDto {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

/// Body of the articles endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsResponse {
    pub status: Option<String>,
    pub total_results: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub articles: Vec<ArticleDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArticleDto {
    #[serde(deserialize_with = "null_as_default")]
    pub source: SourceDto,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiStatus {
    status: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fails with [`Error::Api`] when the body is an error envelope
/// (`{"status":"error","code":..,"message":..}`).
fn check_status(body: &str) -> Result<()> {
    let envelope: ApiStatus = serde_json::from_str(body)?;
    if envelope.status.as_deref() == Some("error") {
        return Err(Error::Api {
            code: envelope.code.unwrap_or_else(|| "unknown".to_string()),
            message: envelope
                .message
                .unwrap_or_else(|| "no message".to_string()),
        });
    }
    Ok(())
}

pub fn decode_sources(body: &str) -> Result<SourceResponse> {
    check_status(body)?;
    Ok(serde_json::from_str(body)?)
}

pub fn decode_articles(body: &str) -> Result<NewsResponse> {
    check_status(body)?;
    Ok(serde_json::from_str(body)?)
}

pub struct NewsApiClient {
    client: Client,
    source_url: String,
    article_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(config: &NewsApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("NewsAdmin/1.0 (News Aggregator)")
            .build()?;

        Ok(Self {
            client,
            source_url: config.source_url.clone(),
            article_url: config.article_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn source_list_url(&self) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.source_url,
            &[("apiKey", self.api_key.as_str())],
        )?)
    }

    pub fn article_list_url(&self, category: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.article_url,
            &[("category", category), ("apiKey", self.api_key.as_str())],
        )?)
    }

    /// Issues a single GET and buffers the whole body. The body is returned
    /// whatever the status code; error envelopes are handled by the decoders.
    pub async fn fetch(&self, url: Url) -> Result<String> {
        info!("Fetching {}{}", url.origin().ascii_serialization(), url.path());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!("News API answered {} with {} bytes", status, body.len());
        Ok(body)
    }

    pub async fn fetch_sources(&self) -> Result<SourceResponse> {
        let body = self.fetch(self.source_list_url()?).await?;
        decode_sources(&body)
    }

    pub async fn fetch_articles(&self, category: &str) -> Result<NewsResponse> {
        let body = self.fetch(self.article_list_url(category)?).await?;
        decode_articles(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_config(base: &str) -> NewsApiConfig {
        NewsApiConfig {
            source_url: format!("{}/v2/top-headlines/sources", base),
            article_url: format!("{}/v2/top-headlines?country=us", base),
            api_key: "test-key".to_string(),
            request_timeout_secs: 5,
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_source_list() {
            let body = r#"{"status":"ok","sources":[
                {"id":"abc","name":"Example News","url":"http://example.com",
                 "description":"Daily","category":"general","language":"en","country":"us"}
            ]}"#;

            let response = decode_sources(body).unwrap();
            assert_eq!(response.status.as_deref(), Some("ok"));
            assert_eq!(response.sources.len(), 1);

            let source = &response.sources[0];
            assert_eq!(source.id.as_deref(), Some("abc"));
            assert_eq!(source.name.as_deref(), Some("Example News"));
            assert_eq!(source.url.as_deref(), Some("http://example.com"));
            assert_eq!(source.country.as_deref(), Some("us"));
        }

        #[test]
        fn test_decode_source_list_missing_fields() {
            let body = r#"{"status":"ok","sources":[{"name":"Bare"}]}"#;

            let response = decode_sources(body).unwrap();
            let source = &response.sources[0];
            assert_eq!(source.name.as_deref(), Some("Bare"));
            assert!(source.id.is_none());
            assert!(source.description.is_none());
        }

        #[test]
        fn test_decode_sources_absent_list() {
            let response = decode_sources(r#"{"status":"ok"}"#).unwrap();
            assert!(response.sources.is_empty());

            let response = decode_sources(r#"{"status":"ok","sources":null}"#).unwrap();
            assert!(response.sources.is_empty());
        }

        #[test]
        fn test_decode_article_list() {
            let body = r#"{
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {
                        "source": {"id": null, "name": "Example News"},
                        "author": null,
                        "title": "Markets rally",
                        "description": "Stocks up",
                        "url": "http://x/1",
                        "urlToImage": "http://x/1.png",
                        "publishedAt": "2024-12-09T12:00:00Z",
                        "content": null
                    },
                    {"title": "No source"}
                ]
            }"#;

            let response = decode_articles(body).unwrap();
            assert_eq!(response.total_results, Some(2));
            assert_eq!(response.articles.len(), 2);

            let first = &response.articles[0];
            assert_eq!(first.source.name.as_deref(), Some("Example News"));
            assert!(first.source.id.is_none());
            assert!(first.author.is_none());
            assert_eq!(first.url.as_deref(), Some("http://x/1"));
            assert_eq!(first.url_to_image.as_deref(), Some("http://x/1.png"));
            assert_eq!(first.published_at.as_deref(), Some("2024-12-09T12:00:00Z"));

            let second = &response.articles[1];
            assert!(second.source.name.is_none());
            assert!(second.url.is_none());
        }

        #[test]
        fn test_decode_null_source() {
            let body = r#"{"status":"ok","articles":[{"source":null,"url":"http://x/2"}]}"#;
            let response = decode_articles(body).unwrap();
            assert!(response.articles[0].source.name.is_none());
        }

        #[test]
        fn test_decode_malformed_json() {
            let result = decode_articles("<html>Bad gateway</html>");
            assert!(matches!(result, Err(Error::Decode(_))));
        }

        #[test]
        fn test_decode_schema_mismatch() {
            let result = decode_articles(r#"{"status":"ok","articles":"nope"}"#);
            assert!(matches!(result, Err(Error::Decode(_))));
        }

        #[test]
        fn test_decode_error_envelope() {
            let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;

            match decode_sources(body) {
                Err(Error::Api { code, message }) => {
                    assert_eq!(code, "apiKeyInvalid");
                    assert_eq!(message, "Your API key is invalid.");
                }
                other => panic!("expected API error, got {:?}", other),
            }
        }
    }

    mod endpoint_tests {
        use super::*;

        #[test]
        fn test_source_list_url_appends_key() {
            let client = NewsApiClient::new(&create_config("https://newsapi.org")).unwrap();
            let url = client.source_list_url().unwrap();

            assert_eq!(
                url.as_str(),
                "https://newsapi.org/v2/top-headlines/sources?apiKey=test-key"
            );
        }

        #[test]
        fn test_article_list_url_keeps_existing_query() {
            let client = NewsApiClient::new(&create_config("https://newsapi.org")).unwrap();
            let url = client.article_list_url("business").unwrap();

            assert_eq!(
                url.as_str(),
                "https://newsapi.org/v2/top-headlines?country=us&category=business&apiKey=test-key"
            );
        }

        #[test]
        fn test_article_list_url_encodes_category() {
            let client = NewsApiClient::new(&create_config("https://newsapi.org")).unwrap();
            let url = client.article_list_url("science & tech").unwrap();

            let category = url
                .query_pairs()
                .find(|(k, _)| k == "category")
                .map(|(_, v)| v.into_owned());
            assert_eq!(category.as_deref(), Some("science & tech"));
        }

        #[test]
        fn test_invalid_base_url() {
            let client = NewsApiClient::new(&create_config("not a url")).unwrap();
            assert!(matches!(client.source_list_url(), Err(Error::Endpoint(_))));
        }
    }

    mod fetch_tests {
        use super::*;

        #[tokio::test]
        async fn test_fetch_sources() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v2/top-headlines/sources"))
                .and(query_param("apiKey", "test-key"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"{"status":"ok","sources":[{"id":"abc","name":"Example News"}]}"#,
                ))
                .expect(1)
                .mount(&server)
                .await;

            let client = NewsApiClient::new(&create_config(&server.uri())).unwrap();
            let response = client.fetch_sources().await.unwrap();

            assert_eq!(response.sources.len(), 1);
            assert_eq!(response.sources[0].id.as_deref(), Some("abc"));
        }

        #[tokio::test]
        async fn test_fetch_articles_sends_category() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v2/top-headlines"))
                .and(query_param("country", "us"))
                .and(query_param("category", "sports"))
                .and(query_param("apiKey", "test-key"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"{"status":"ok","totalResults":1,"articles":[{"url":"http://x/9"}]}"#,
                ))
                .expect(1)
                .mount(&server)
                .await;

            let client = NewsApiClient::new(&create_config(&server.uri())).unwrap();
            let response = client.fetch_articles("sports").await.unwrap();

            assert_eq!(response.articles.len(), 1);
            assert_eq!(response.articles[0].url.as_deref(), Some("http://x/9"));
        }

        #[tokio::test]
        async fn test_fetch_surfaces_api_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(401).set_body_string(
                    r#"{"status":"error","code":"apiKeyMissing","message":"missing key"}"#,
                ))
                .mount(&server)
                .await;

            let client = NewsApiClient::new(&create_config(&server.uri())).unwrap();
            let result = client.fetch_sources().await;

            assert!(matches!(result, Err(Error::Api { .. })));
        }

        #[tokio::test]
        async fn test_fetch_transport_failure() {
            // Nothing listens on this port
            let client = NewsApiClient::new(&create_config("http://127.0.0.1:9")).unwrap();
            let result = client.fetch_sources().await;

            assert!(matches!(result, Err(Error::Fetch(_))));
        }
    }
}
