/// Persistent store backed by a single-file SQLite database
///
/// This module owns every durable table: replied posts, scanned posts, the
/// per-region trend cache, the search-term pool, and the content-source
/// response cache. All writes are individually atomic; unique-key conflicts
/// from racing writers resolve to exactly one winner and a silent no-op for
/// the loser.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::collections::HashMap;

/// A confirmed, posted reply
#[derive(Debug, Clone)]
pub struct RepliedPost {
    pub post_id: String,
    pub author_handle: String,
    pub replied_at: DateTime<Utc>,
    pub region: String,
    pub language: String,
    pub reply_text: String,
    pub search_term: Option<String>,
    pub sentiment: Option<String>,
}

/// One row of the search-term pool
#[derive(Debug, Clone)]
pub struct TermRow {
    pub term: String,
    pub language: String,
    pub category: String,
    pub title: Option<String>,
    pub content_id: Option<i64>,
    pub popularity: f64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub use_count: i64,
}

/// Read-only aggregate over the replied table
#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_replies: i64,
    pub replies_today: i64,
    pub unique_authors: i64,
    pub by_language: HashMap<String, i64>,
    pub by_sentiment: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the database and create tables if they don't exist
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to open SQLite database")?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Access the underlying pool (used by tests and diagnostics)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        log::info!("Initializing database tables...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS replied_posts (
                post_id TEXT PRIMARY KEY,
                author_handle TEXT NOT NULL,
                replied_at TEXT NOT NULL,
                region TEXT NOT NULL,
                language TEXT NOT NULL,
                reply_text TEXT NOT NULL,
                search_term TEXT,
                sentiment TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create replied_posts table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_replied_author ON replied_posts(author_handle)")
            .execute(&self.pool)
            .await
            .context("Failed to create author index")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_replied_at ON replied_posts(replied_at)")
            .execute(&self.pool)
            .await
            .context("Failed to create timestamp index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scanned_posts (
                post_id TEXT PRIMARY KEY,
                scanned_at TEXT NOT NULL,
                skip_reason TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create scanned_posts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trend_cache (
                region TEXT PRIMARY KEY,
                trends TEXT NOT NULL,
                harvested_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create trend_cache table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_terms (
                term TEXT NOT NULL,
                language TEXT NOT NULL,
                category TEXT NOT NULL,
                title TEXT,
                content_id INTEGER,
                popularity REAL NOT NULL DEFAULT 0,
                last_used_at TEXT,
                use_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE(term, language)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create search_terms table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_cache (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create content_cache table")?;

        log::info!("Database tables initialized successfully");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Replied posts
    // ------------------------------------------------------------------

    /// Record a confirmed reply. A duplicate post_id is a silent no-op;
    /// returns whether a new row was actually written.
    pub async fn insert_replied(&self, reply: &RepliedPost) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO replied_posts
                (post_id, author_handle, replied_at, region, language, reply_text, search_term, sentiment)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reply.post_id)
        .bind(&reply.author_handle)
        .bind(reply.replied_at)
        .bind(&reply.region)
        .bind(&reply.language)
        .bind(&reply.reply_text)
        .bind(&reply.search_term)
        .bind(&reply.sentiment)
        .execute(&self.pool)
        .await
        .context("Failed to insert replied post")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn has_replied(&self, post_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM replied_posts WHERE post_id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check replied_posts")?;
        Ok(row.is_some())
    }

    /// Count replies to an author since a point in time (sliding window)
    pub async fn replies_for_author_since(
        &self,
        author_handle: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM replied_posts WHERE author_handle = ? AND replied_at > ?",
        )
        .bind(author_handle)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count author replies")?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Scanned posts
    // ------------------------------------------------------------------

    /// Record a skipped post. Idempotent: re-inserting the same post_id
    /// leaves exactly one row.
    pub async fn insert_scanned(&self, post_id: &str, skip_reason: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO scanned_posts (post_id, scanned_at, skip_reason) VALUES (?, ?, ?)",
        )
        .bind(post_id)
        .bind(Utc::now())
        .bind(skip_reason)
        .execute(&self.pool)
        .await
        .context("Failed to insert scanned post")?;
        Ok(())
    }

    pub async fn has_scanned(&self, post_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM scanned_posts WHERE post_id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check scanned_posts")?;
        Ok(row.is_some())
    }

    // ------------------------------------------------------------------
    // Trend cache
    // ------------------------------------------------------------------

    /// Cached trends for a region; empty vec if nothing was harvested yet
    pub async fn trends_for(&self, region: &str) -> Result<Vec<String>> {
        let row = sqlx::query("SELECT trends FROM trend_cache WHERE region = ?")
            .bind(region)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read trend cache")?;

        match row {
            Some(row) => {
                let raw: String = row.get("trends");
                let trends: Vec<String> =
                    serde_json::from_str(&raw).context("Failed to parse cached trends")?;
                Ok(trends)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Replace the trend list for a region wholesale (last-write-wins)
    pub async fn upsert_trends(&self, region: &str, trends: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(trends).context("Failed to encode trends")?;
        sqlx::query(
            "INSERT OR REPLACE INTO trend_cache (region, trends, harvested_at) VALUES (?, ?, ?)",
        )
        .bind(region)
        .bind(encoded)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to upsert trend cache")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search-term pool
    // ------------------------------------------------------------------

    /// Add a term to the pool. Duplicate (term, language) pairs are a
    /// no-op; returns whether a new row was written.
    pub async fn insert_term(
        &self,
        term: &str,
        language: &str,
        category: &str,
        title: Option<&str>,
        content_id: Option<i64>,
        popularity: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO search_terms (term, language, category, title, content_id, popularity)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(term)
        .bind(language)
        .bind(category)
        .bind(title)
        .bind(content_id)
        .bind(popularity)
        .execute(&self.pool)
        .await
        .context("Failed to insert search term")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn term_count(&self, language: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_terms WHERE language = ?")
            .bind(language)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count search terms")?;
        Ok(count)
    }

    /// Candidate terms for selection, most popular first.
    ///
    /// `generic` filters on the evergreen category when set; `not_used_since`
    /// excludes terms selected after that instant (recency filter).
    pub async fn candidate_terms(
        &self,
        language: &str,
        generic: Option<bool>,
        not_used_since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<TermRow>> {
        let mut sql = String::from(
            "SELECT term, language, category, title, content_id, popularity, last_used_at, use_count \
             FROM search_terms WHERE language = ?",
        );
        if let Some(generic) = generic {
            if generic {
                sql.push_str(" AND category = 'generic'");
            } else {
                sql.push_str(" AND category != 'generic'");
            }
        }
        if not_used_since.is_some() {
            sql.push_str(" AND (last_used_at IS NULL OR last_used_at < ?)");
        }
        sql.push_str(" ORDER BY popularity DESC, use_count ASC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(language);
        if let Some(cutoff) = not_used_since {
            query = query.bind(cutoff);
        }
        let rows = query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch candidate terms")?;

        Ok(rows
            .into_iter()
            .map(|row| TermRow {
                term: row.get("term"),
                language: row.get("language"),
                category: row.get("category"),
                title: row.get("title"),
                content_id: row.get("content_id"),
                popularity: row.get("popularity"),
                last_used_at: row.get("last_used_at"),
                use_count: row.get("use_count"),
            })
            .collect())
    }

    /// Stamp a term as just used and bump its use count
    pub async fn mark_term_used(&self, term: &str, language: &str) -> Result<()> {
        sqlx::query(
            "UPDATE search_terms SET last_used_at = ?, use_count = use_count + 1 \
             WHERE term = ? AND language = ?",
        )
        .bind(Utc::now())
        .bind(term)
        .bind(language)
        .execute(&self.pool)
        .await
        .context("Failed to mark term used")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Content-source response cache
    // ------------------------------------------------------------------

    /// Cached payload for a query key, only if fetched within `max_age`
    pub async fn content_cache_get(
        &self,
        cache_key: &str,
        max_age: Duration,
    ) -> Result<Option<String>> {
        let cutoff = Utc::now() - max_age;
        let row = sqlx::query(
            "SELECT payload FROM content_cache WHERE cache_key = ? AND fetched_at > ?",
        )
        .bind(cache_key)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read content cache")?;

        Ok(row.map(|r| r.get("payload")))
    }

    /// Store a fresh payload, overwriting any stale entry for the key
    pub async fn content_cache_put(&self, cache_key: &str, payload: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO content_cache (cache_key, payload, fetched_at) VALUES (?, ?, ?)",
        )
        .bind(cache_key)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to write content cache")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> Result<Stats> {
        let total_replies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replied_posts")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count replies")?;

        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc();
        let replies_today: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM replied_posts WHERE replied_at > ?")
                .bind(midnight)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count today's replies")?;

        let unique_authors: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT author_handle) FROM replied_posts")
                .fetch_one(&self.pool)
                .await
                .context("Failed to count unique authors")?;

        let language_rows =
            sqlx::query("SELECT language, COUNT(*) AS n FROM replied_posts GROUP BY language")
                .fetch_all(&self.pool)
                .await
                .context("Failed to group replies by language")?;
        let by_language = language_rows
            .into_iter()
            .map(|row| (row.get::<String, _>("language"), row.get::<i64, _>("n")))
            .collect();

        let sentiment_rows = sqlx::query(
            "SELECT sentiment, COUNT(*) AS n FROM replied_posts \
             WHERE sentiment IS NOT NULL GROUP BY sentiment",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to group replies by sentiment")?;
        let by_sentiment = sentiment_rows
            .into_iter()
            .map(|row| (row.get::<String, _>("sentiment"), row.get::<i64, _>("n")))
            .collect();

        Ok(Stats {
            total_replies,
            replies_today,
            unique_authors,
            by_language,
            by_sentiment,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let store = Store::connect(&db_url).await.unwrap();
        (store, temp_dir)
    }

    pub(crate) fn reply(post_id: &str, author: &str, replied_at: DateTime<Utc>) -> RepliedPost {
        RepliedPost {
            post_id: post_id.to_string(),
            author_handle: author.to_string(),
            replied_at,
            region: "Paris".to_string(),
            language: "fr".to_string(),
            reply_text: "test reply".to_string(),
            search_term: None,
            sentiment: None,
        }
    }

    #[tokio::test]
    async fn replied_insert_is_unique_per_post() {
        let (store, _dir) = setup_test_store().await;

        assert!(store.insert_replied(&reply("p1", "alice", Utc::now())).await.unwrap());
        // Second insert for the same post_id is silently dropped
        assert!(!store.insert_replied(&reply("p1", "bob", Utc::now())).await.unwrap());

        assert!(store.has_replied("p1").await.unwrap());
        assert!(!store.has_replied("p2").await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replied_posts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn scanned_insert_is_idempotent() {
        let (store, _dir) = setup_test_store().await;

        store.insert_scanned("p1", "Not about streaming").await.unwrap();
        store.insert_scanned("p1", "different reason").await.unwrap();

        assert!(store.has_scanned("p1").await.unwrap());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scanned_posts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn author_window_counts_only_recent_replies() {
        let (store, _dir) = setup_test_store().await;
        let now = Utc::now();

        store.insert_replied(&reply("p1", "alice", now - Duration::hours(1))).await.unwrap();
        store.insert_replied(&reply("p2", "alice", now - Duration::hours(30))).await.unwrap();
        store.insert_replied(&reply("p3", "bob", now)).await.unwrap();

        let window = now - Duration::hours(24);
        assert_eq!(store.replies_for_author_since("alice", window).await.unwrap(), 1);
        assert_eq!(store.replies_for_author_since("bob", window).await.unwrap(), 1);
        assert_eq!(store.replies_for_author_since("carol", window).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn trend_cache_replaces_wholesale() {
        let (store, _dir) = setup_test_store().await;

        assert!(store.trends_for("Paris").await.unwrap().is_empty());

        store
            .upsert_trends("Paris", &["#CinemaFrancais".to_string(), "#Paris".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.trends_for("Paris").await.unwrap(),
            vec!["#CinemaFrancais", "#Paris"]
        );

        store.upsert_trends("Paris", &["#Cannes".to_string()]).await.unwrap();
        assert_eq!(store.trends_for("Paris").await.unwrap(), vec!["#Cannes"]);
    }

    #[tokio::test]
    async fn term_pool_pair_is_unique() {
        let (store, _dir) = setup_test_store().await;

        assert!(store
            .insert_term("where to watch Dune", "en", "direct", Some("Dune"), Some(438631), 90.0)
            .await
            .unwrap());
        assert!(!store
            .insert_term("where to watch Dune", "en", "direct", Some("Dune"), Some(438631), 90.0)
            .await
            .unwrap());
        // Same term under another language is a distinct row
        assert!(store
            .insert_term("where to watch Dune", "fr", "direct", Some("Dune"), Some(438631), 90.0)
            .await
            .unwrap());

        assert_eq!(store.term_count("en").await.unwrap(), 1);
        assert_eq!(store.term_count("fr").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn candidate_terms_respect_recency_and_category() {
        let (store, _dir) = setup_test_store().await;

        store.insert_term("fresh term", "en", "direct", None, None, 50.0).await.unwrap();
        store.insert_term("used term", "en", "direct", None, None, 99.0).await.unwrap();
        store.insert_term("evergreen", "en", "generic", None, None, 10.0).await.unwrap();
        store.mark_term_used("used term", "en").await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        let fresh = store.candidate_terms("en", None, Some(cutoff), 10).await.unwrap();
        let names: Vec<_> = fresh.iter().map(|t| t.term.as_str()).collect();
        assert!(names.contains(&"fresh term"));
        assert!(names.contains(&"evergreen"));
        assert!(!names.contains(&"used term"));

        let generic_only = store.candidate_terms("en", Some(true), None, 10).await.unwrap();
        assert_eq!(generic_only.len(), 1);
        assert_eq!(generic_only[0].term, "evergreen");

        // With the recency filter relaxed the used term comes back, ranked first
        let all = store.candidate_terms("en", Some(false), None, 10).await.unwrap();
        assert_eq!(all[0].term, "used term");
        assert_eq!(all[0].use_count, 1);
        assert!(all[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn content_cache_expires_after_ttl() {
        let (store, _dir) = setup_test_store().await;
        let ttl = Duration::hours(6);

        store.content_cache_put("now_playing:FR", r#"{"results":[]}"#).await.unwrap();
        assert!(store.content_cache_get("now_playing:FR", ttl).await.unwrap().is_some());

        // Backdate the entry to just inside, then just past, the TTL
        let fresh_enough = Utc::now() - ttl + Duration::minutes(5);
        sqlx::query("UPDATE content_cache SET fetched_at = ? WHERE cache_key = ?")
            .bind(fresh_enough)
            .bind("now_playing:FR")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.content_cache_get("now_playing:FR", ttl).await.unwrap().is_some());

        let stale = Utc::now() - ttl - Duration::minutes(5);
        sqlx::query("UPDATE content_cache SET fetched_at = ? WHERE cache_key = ?")
            .bind(stale)
            .bind("now_playing:FR")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.content_cache_get("now_playing:FR", ttl).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_aggregate_replies() {
        let (store, _dir) = setup_test_store().await;
        let now = Utc::now();

        let mut r1 = reply("p1", "alice", now);
        r1.sentiment = Some("frustration".to_string());
        store.insert_replied(&r1).await.unwrap();

        let mut r2 = reply("p2", "alice", now - Duration::days(3));
        r2.language = "en".to_string();
        store.insert_replied(&r2).await.unwrap();

        store.insert_replied(&reply("p3", "bob", now)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_replies, 3);
        assert_eq!(stats.unique_authors, 2);
        assert!(stats.replies_today >= 2);
        assert_eq!(stats.by_language.get("fr"), Some(&2));
        assert_eq!(stats.by_language.get("en"), Some(&1));
        assert_eq!(stats.by_sentiment.get("frustration"), Some(&1));
    }
}
