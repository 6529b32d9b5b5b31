/// Configuration module for managing environment variables and API keys
///
/// This module loads all configuration values from environment variables
/// (typically from a .env file). Missing credentials for external services
/// degrade the service (stub generator, empty content source) instead of
/// failing startup.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL (e.g., "sqlite:xbot_memory.db?mode=rwc")
    pub database_url: String,

    /// Port for the HTTP API server
    pub port: u16,

    /// Groq API key for the draft generator
    /// If not set, a deterministic stub generator is used instead
    pub groq_api_key: Option<String>,

    /// Groq model to use for drafting replies
    pub groq_model: String,

    /// TMDB API key for trending content lookups
    /// If not set, every content query shape yields zero items
    pub tmdb_api_key: Option<String>,

    /// The site promoted in drafted replies
    pub site_url: String,

    /// Hours before a cached content-source response is considered stale
    pub content_cache_ttl_hours: i64,

    /// Probability of preferring an evergreen search term over a
    /// content-specific one (0.0 - 1.0)
    pub evergreen_ratio: f64,

    /// Replies-per-day count that triggers a health warning
    pub daily_reply_warning: i64,

    /// Timeout in seconds applied to external network calls
    pub external_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let groq_api_key = env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());
        if groq_api_key.is_none() {
            log::warn!("GROQ_API_KEY not set - using stub draft generator");
        }

        let tmdb_api_key = env::var("TMDB_API_KEY").ok().filter(|k| !k.is_empty());
        if tmdb_api_key.is_none() {
            log::warn!("TMDB_API_KEY not set - content lookups will return no items");
        }

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:xbot_memory.db?mode=rwc".to_string()),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),

            groq_api_key,

            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "meta-llama/llama-4-maverick-17b-128e-instruct".to_string()),

            tmdb_api_key,

            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "streamixapp.pages.dev".to_string()),

            content_cache_ttl_hours: env::var("CONTENT_CACHE_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),

            evergreen_ratio: env::var("EVERGREEN_RATIO")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.6),

            daily_reply_warning: env::var("DAILY_REPLY_WARNING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(150),

            external_timeout_secs: env::var("EXTERNAL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Baseline configuration for tests (no external credentials)
    #[cfg(test)]
    pub(crate) fn test_default() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            port: 8000,
            groq_api_key: None,
            groq_model: "test-model".to_string(),
            tmdb_api_key: None,
            site_url: "example.dev".to_string(),
            content_cache_ttl_hours: 6,
            evergreen_ratio: 0.6,
            daily_reply_warning: 150,
            external_timeout_secs: 5,
        }
    }

    /// Validate that the database is reachable
    pub async fn validate(&self) -> Result<()> {
        log::info!("Validating configuration...");

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&self.database_url)
            .await
            .context("Failed to open SQLite database")?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .context("Database connection test query failed")?;

        log::info!("Configuration validated successfully");
        Ok(())
    }
}
