//! NewsAPI-style search endpoint.
//!
//! The request asks for English articles about the source's category, newest
//! first. The response maps `articles[]` onto [`RawItem`]s; NewsAPI's
//! `"[Removed]"` placeholders are skipped.

use super::{RawItem, parse_date};
use crate::error::FetchError;
use crate::models::{Article, SourceSpec};
use crate::utils::truncate_for_log;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

const REMOVED_PLACEHOLDER: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<SearchArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArticle {
    #[serde(default)]
    source: Option<SearchSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSource {
    name: Option<String>,
}

/// Build the search request for `spec`.
///
/// Fails with [`FetchError::MissingCredentials`] when the source has no API key.
pub fn request(client: &Client, spec: &SourceSpec, page_size: usize) -> Result<RequestBuilder, FetchError> {
    let key = spec
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(FetchError::MissingCredentials)?;

    let page_size = page_size.clamp(1, 100).to_string();
    Ok(client
        .get(&spec.endpoint)
        .header("X-Api-Key", key)
        .query(&[
            ("q", spec.category.as_str()),
            ("language", "en"),
            ("sortBy", "publishedAt"),
            ("pageSize", page_size.as_str()),
        ]))
}

/// Parse a search response body into at most `max_items` articles.
pub fn parse(body: &str, spec: &SourceSpec, max_items: usize) -> Result<Vec<Article>, FetchError> {
    let resp: SearchResponse = serde_json::from_str(body).map_err(|e| {
        debug!(preview = %truncate_for_log(body, 200), "Unparseable search response");
        FetchError::Malformed(format!("search response: {e}"))
    })?;

    if resp.status.as_deref() == Some("error") {
        return Err(FetchError::Malformed(format!(
            "search API error {}: {}",
            resp.code.as_deref().unwrap_or("unknown"),
            resp.message.as_deref().unwrap_or("no message")
        )));
    }

    let articles = resp
        .articles
        .into_iter()
        .filter(|a| a.title.as_deref() != Some(REMOVED_PLACEHOLDER))
        .take(max_items)
        .filter_map(|a| {
            let outlet = a.source.and_then(|s| s.name);
            let mut article = RawItem {
                title: a.title,
                link: a.url,
                summary: a.description,
                content_html: None,
                published: a.published_at.as_deref().and_then(parse_date),
                author: a.author,
                image_url: a.url_to_image,
            }
            .into_article(spec)?;
            // Name the outlet when the API reports one.
            if let Some(outlet) = outlet.filter(|o| !o.trim().is_empty()) {
                article.source = outlet;
            }
            Some(article)
        })
        .collect();
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SourceKind};
    use chrono::{TimeZone, Utc};

    fn spec(key: Option<&str>) -> SourceSpec {
        SourceSpec {
            name: "NewsAPI (crypto)".into(),
            endpoint: "https://newsapi.org/v2/everything".into(),
            category: Category::Crypto,
            kind: SourceKind::SearchApi,
            api_key: key.map(str::to_string),
        }
    }

    #[test]
    fn maps_articles_and_skips_placeholders() {
        let body = r#"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {"source": {"id": null, "name": "CoinDesk"}, "author": "Sam",
                 "title": "Bitcoin ETF inflows", "description": "Big <b>week</b>",
                 "url": "https://coindesk.com/a", "urlToImage": "https://img.test/a.jpg",
                 "publishedAt": "2024-01-03T10:00:00Z", "content": "..."},
                {"source": {"id": null, "name": "[Removed]"}, "author": null,
                 "title": "[Removed]", "description": "[Removed]",
                 "url": "https://removed.com", "urlToImage": null, "publishedAt": "1970-01-01T00:00:00Z"},
                {"source": {"name": "NoUrl"}, "title": "Missing url"}
            ]
        }"#;
        let articles = parse(body, &spec(Some("k")), 25).unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.title, "Bitcoin ETF inflows");
        assert_eq!(a.description, "Big week");
        assert_eq!(a.source, "CoinDesk");
        assert_eq!(a.author.as_deref(), Some("Sam"));
        assert_eq!(a.image_url.as_deref(), Some("https://img.test/a.jpg"));
        assert_eq!(
            a.published_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn api_error_is_malformed() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;
        let err = parse(body, &spec(Some("k")), 25).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(ref m) if m.contains("apiKeyInvalid")));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse("<html></html>", &spec(Some("k")), 25),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn request_requires_a_key() {
        let client = Client::new();
        assert!(matches!(
            request(&client, &spec(None), 10),
            Err(FetchError::MissingCredentials)
        ));
        assert!(matches!(
            request(&client, &spec(Some("  ")), 10),
            Err(FetchError::MissingCredentials)
        ));
    }

    #[test]
    fn request_carries_category_query() {
        let client = Client::new();
        let req = request(&client, &spec(Some("k")), 10).unwrap().build().unwrap();
        let url = req.url().as_str();
        assert!(url.contains("q=crypto"));
        assert!(url.contains("sortBy=publishedAt"));
        assert!(url.contains("pageSize=10"));
        assert_eq!(req.headers()["X-Api-Key"], "k");
    }
}
