/// External content-metadata client (TMDB)
///
/// Wraps the handful of TMDB query shapes the term generator needs:
/// now-playing per region, weekly trending, native-language discovery, and
/// airing-today TV. Every shape's raw response is cached in the store for a
/// configurable number of hours keyed by its exact query parameters, and a
/// failing shape contributes zero items instead of failing the aggregate.

use anyhow::{Context, Result};
use chrono::Duration;
use std::collections::HashSet;
use std::time::Duration as StdDuration;

use crate::config::Config;
use crate::store::Store;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// One piece of content known to the external source
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub popularity: f64,
}

pub struct ContentClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    cache_ttl: Duration,
    store: Store,
}

impl ContentClient {
    pub fn new(config: &Config, store: Store) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.external_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.tmdb_api_key.clone(),
            base_url: TMDB_BASE_URL.to_string(),
            cache_ttl: Duration::hours(config.content_cache_ttl_hours),
            store,
        })
    }

    /// Deduplicated content for a region and language, most popular first.
    ///
    /// Combines four query shapes; shapes that error are logged and skipped
    /// so a partial outage still produces whatever the rest returned.
    pub async fn trending_content(&self, content_region: &str, lang: &str) -> Vec<ContentItem> {
        if self.api_key.is_none() {
            log::debug!("No content-source API key configured, returning no items");
            return Vec::new();
        }

        let shapes: [(String, String, Vec<(String, String)>); 4] = [
            (
                format!("now_playing:{}", content_region),
                "/movie/now_playing".to_string(),
                vec![("region".to_string(), content_region.to_string())],
            ),
            (
                "trending:movie:week".to_string(),
                "/trending/movie/week".to_string(),
                vec![],
            ),
            (
                format!("discover:{}", lang),
                "/discover/movie".to_string(),
                vec![
                    ("with_original_language".to_string(), lang.to_string()),
                    ("sort_by".to_string(), "popularity.desc".to_string()),
                ],
            ),
            (
                "tv:airing_today".to_string(),
                "/tv/airing_today".to_string(),
                vec![],
            ),
        ];

        let mut combined = Vec::new();
        for (cache_key, path, params) in shapes {
            match self.fetch_shape(&cache_key, &path, &params).await {
                Ok(items) => combined.extend(items),
                Err(e) => {
                    log::warn!("Content query shape {} failed: {}", cache_key, e);
                }
            }
        }

        combine(combined)
    }

    /// Fetch one query shape through the cache.
    ///
    /// Within the TTL the cached payload is returned with no network call;
    /// past it the shape is refetched and the cache row overwritten.
    async fn fetch_shape(
        &self,
        cache_key: &str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Vec<ContentItem>> {
        if let Some(cached) = self.store.content_cache_get(cache_key, self.cache_ttl).await? {
            log::debug!("Content cache hit for {}", cache_key);
            let payload: serde_json::Value =
                serde_json::from_str(&cached).context("Failed to parse cached content payload")?;
            return Ok(parse_items(&payload));
        }

        let api_key = self.api_key.as_ref().context("Content API key not set")?;
        let url = format!("{}{}", self.base_url, path);

        let mut query: Vec<(String, String)> = params.to_vec();
        query.push(("api_key".to_string(), api_key.clone()));

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("Failed to reach content source")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Content source error (status {}): {}", status, text);
        }

        let body = response
            .text()
            .await
            .context("Failed to read content response body")?;

        self.store.content_cache_put(cache_key, &body).await?;

        let payload: serde_json::Value =
            serde_json::from_str(&body).context("Failed to parse content response")?;
        Ok(parse_items(&payload))
    }
}

/// Extract content items from a TMDB-style response
///
/// Movies carry `title`, TV shows carry `name`; entries without an id or a
/// usable title are dropped.
fn parse_items(payload: &serde_json::Value) -> Vec<ContentItem> {
    let results = match payload.get("results").and_then(|r| r.as_array()) {
        Some(results) => results,
        None => return Vec::new(),
    };

    results
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_i64()?;
            let title = entry
                .get("title")
                .or_else(|| entry.get("name"))?
                .as_str()?
                .trim();
            if title.is_empty() {
                return None;
            }
            let popularity = entry
                .get("popularity")
                .and_then(|p| p.as_f64())
                .unwrap_or(0.0);
            Some(ContentItem {
                id,
                title: title.to_string(),
                popularity,
            })
        })
        .collect()
}

/// Deduplicate by content id (first occurrence wins) and re-sort by
/// popularity descending
fn combine(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id))
        .collect();
    unique.sort_by(|a, b| {
        b.popularity
            .partial_cmp(&a.popularity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::setup_test_store;

    #[test]
    fn parses_movie_and_tv_results() {
        let payload = serde_json::json!({
            "results": [
                { "id": 1, "title": "Dune: Part Two", "popularity": 812.5 },
                { "id": 2, "name": "Shogun", "popularity": 401.2 },
                { "id": 3, "title": "No Popularity" },
                { "title": "No Id", "popularity": 5.0 },
                { "id": 4, "title": "   " }
            ]
        });

        let items = parse_items(&payload);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Dune: Part Two");
        assert_eq!(items[1].title, "Shogun");
        assert_eq!(items[2].popularity, 0.0);
    }

    #[test]
    fn parses_missing_results_as_empty() {
        assert!(parse_items(&serde_json::json!({})).is_empty());
        assert!(parse_items(&serde_json::json!({ "results": "nope" })).is_empty());
    }

    #[test]
    fn combine_dedups_first_wins_then_sorts() {
        let items = vec![
            ContentItem { id: 1, title: "From Now Playing".to_string(), popularity: 10.0 },
            ContentItem { id: 2, title: "Trending Hit".to_string(), popularity: 900.0 },
            // Same id seen again from a later shape with a different score
            ContentItem { id: 1, title: "From Trending".to_string(), popularity: 999.0 },
        ];

        let combined = combine(items);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0].id, 2);
        // First occurrence of id 1 won, so its title and score survive
        assert_eq!(combined[1].title, "From Now Playing");
        assert_eq!(combined[1].popularity, 10.0);
    }

    #[tokio::test]
    async fn keyless_client_returns_no_items() {
        let (store, _dir) = setup_test_store().await;
        let config = crate::config::Config::test_default();

        let client = ContentClient::new(&config, store).unwrap();
        assert!(client.trending_content("FR", "fr").await.is_empty());
    }
}
