/// Decision engine
///
/// Composes the guard, the schedule, the trend cache, and the draft
/// generator into the single analyze decision, and owns the mutating
/// operations the driver reports back through (reply logging, trend
/// updates). The generator and content source are injected so the whole
/// pipeline runs with stubs when credentials are absent.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::guard;
use crate::llm::{Action, DraftGenerator, DraftRequest};
use crate::schedule;
use crate::store::{RepliedPost, Stats, Store};
use crate::terms::{SearchTerm, TermPool};

/// Trends used for prompt construction when a region has no harvested
/// entry yet; downstream always needs at least one trend-like token
const DEFAULT_TRENDS: [&str; 3] = ["#Movies", "#Netflix", "#Streaming"];

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub post_id: String,
    pub post_text: String,
    pub author_handle: String,
    #[serde(default)]
    pub parent_text: Option<String>,
    #[serde(default)]
    pub thread_context: Option<String>,
    #[serde(default)]
    pub author_bio: Option<String>,
    #[serde(default)]
    pub content_title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub action: Action,
    pub reason: String,
    pub draft: Option<String>,
    pub language: String,
    pub trend_injected: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogReplyRequest {
    pub post_id: String,
    pub author_handle: String,
    pub reply_text: String,
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub region: String,
    pub location: String,
    pub language: String,
    pub lang_code: String,
    pub keywords: Vec<String>,
    pub current_trends: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub warnings: Vec<String>,
    pub stats: Stats,
}

pub struct DecisionEngine {
    store: Store,
    generator: Arc<dyn DraftGenerator>,
    terms: TermPool,
    daily_reply_warning: i64,
}

impl DecisionEngine {
    pub fn new(
        store: Store,
        generator: Arc<dyn DraftGenerator>,
        terms: TermPool,
        config: &Config,
    ) -> Self {
        Self {
            store,
            generator,
            terms,
            daily_reply_warning: config.daily_reply_warning,
        }
    }

    /// Analyze one candidate post and decide whether to reply.
    ///
    /// Duplicates and cooled-down authors are skipped before any external
    /// call. A REPLY decision persists nothing: the drafted state is
    /// transient until the driver confirms the post via log_reply.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        if let Some(reason) = guard::check(&self.store, &request.post_id, &request.author_handle).await? {
            log::info!("Skipping post {}: {}", request.post_id, reason.message());
            return Ok(AnalyzeResponse {
                action: Action::Skip,
                reason: reason.message().to_string(),
                draft: None,
                language: String::new(),
                trend_injected: None,
            });
        }

        let slot = schedule::current_target();
        let language = schedule::language_name(slot.lang).to_string();
        let trends = self.trends_for(slot.region).await?;

        let draft_request = DraftRequest {
            post_text: request.post_text.clone(),
            parent_text: request.parent_text.clone(),
            thread_context: request.thread_context.clone(),
            author_bio: request.author_bio.clone(),
            lang_code: slot.lang.to_string(),
            language: language.clone(),
            region: slot.region.to_string(),
            trends,
            content_title: request.content_title.clone(),
            category: request.category.clone(),
        };

        let decision = match self.generator.analyze_and_draft(&draft_request).await {
            Ok(decision) => decision,
            Err(e) => {
                // Recovered locally: the caller gets a well-formed SKIP.
                // No scan record either - a transient provider failure must
                // not mark the post as permanently seen.
                log::error!("Draft generator failed for post {}: {:#}", request.post_id, e);
                return Ok(AnalyzeResponse {
                    action: Action::Skip,
                    reason: format!("Generator error: {}", e),
                    draft: None,
                    language,
                    trend_injected: None,
                });
            }
        };

        if decision.action == Action::Skip {
            self.store
                .insert_scanned(&request.post_id, &decision.reason)
                .await?;
        }

        Ok(AnalyzeResponse {
            action: decision.action,
            reason: decision.reason,
            draft: decision.draft,
            language,
            trend_injected: decision.trend,
        })
    }

    /// Persist a confirmed reply using the current slot's region and
    /// language. A duplicate post_id is a silent no-op.
    pub async fn log_reply(&self, request: &LogReplyRequest) -> Result<()> {
        let slot = schedule::current_target();
        let inserted = self
            .store
            .insert_replied(&RepliedPost {
                post_id: request.post_id.clone(),
                author_handle: request.author_handle.clone(),
                replied_at: Utc::now(),
                region: slot.region.to_string(),
                language: slot.lang.to_string(),
                reply_text: request.reply_text.clone(),
                search_term: request.search_term.clone(),
                sentiment: request.sentiment.clone(),
            })
            .await?;

        if inserted {
            log::info!("Logged reply to post {} by @{}", request.post_id, request.author_handle);
        } else {
            log::info!("Reply to post {} was already logged, ignoring", request.post_id);
        }
        Ok(())
    }

    /// Replace the trend list for a region; returns how many were stored
    pub async fn update_trends(&self, region: &str, trends: &[String]) -> Result<usize> {
        self.store.upsert_trends(region, trends).await?;
        log::info!("Trend cache updated for {}: {} trends", region, trends.len());
        Ok(trends.len())
    }

    /// Current target plus its keywords and cached trends
    pub async fn schedule_response(&self) -> Result<ScheduleResponse> {
        let slot = schedule::current_target();
        let trends = self.trends_for(slot.region).await?;

        Ok(ScheduleResponse {
            region: slot.region.to_string(),
            location: slot.location.to_string(),
            language: schedule::language_name(slot.lang).to_string(),
            lang_code: slot.lang.to_string(),
            keywords: schedule::keywords_for(slot.lang)
                .iter()
                .map(|k| k.to_string())
                .collect(),
            current_trends: trends,
        })
    }

    /// Next discovery search term for the current slot
    pub async fn smart_search(&self) -> SearchTerm {
        let slot = schedule::current_target();
        self.terms.next_search_term(slot.lang, slot.content_region).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.store.stats().await
    }

    /// Stats snapshot plus operational warnings
    pub async fn health(&self) -> Result<HealthReport> {
        let stats = self.store.stats().await?;

        let mut warnings = Vec::new();
        if stats.replies_today >= self.daily_reply_warning {
            warnings.push(format!(
                "Daily limit approaching ({})",
                self.daily_reply_warning
            ));
        }

        Ok(HealthReport {
            status: if warnings.is_empty() { "HEALTHY" } else { "WARNING" },
            warnings,
            stats,
        })
    }

    /// Cached trends for a region, falling back to a fixed non-empty
    /// default so prompt construction always has a trend-like token
    async fn trends_for(&self, region: &str) -> Result<Vec<String>> {
        let trends = self.store.trends_for(region).await?;
        if trends.is_empty() {
            return Ok(DEFAULT_TRENDS.iter().map(|t| t.to_string()).collect());
        }
        Ok(trends)
    }
}
