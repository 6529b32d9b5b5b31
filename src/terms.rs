/// Search-term pool manager
///
/// Hands the driver its next discovery query. Terms come from two places:
/// the evergreen native keyword lists, and template-expanded queries tied to
/// currently trending titles from the content source. Selection prefers
/// popular terms that haven't been used in the last day and must never fail:
/// when everything else goes wrong the caller gets a hardcoded fallback.

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Mutex;

use crate::config::Config;
use crate::content::ContentClient;
use crate::schedule;
use crate::store::Store;

/// Hours a term stays excluded from selection after being used
const TERM_REUSE_HOURS: i64 = 24;

/// Titles expanded into queries per pool refresh
const MAX_TITLES_PER_REFRESH: usize = 8;

/// Candidates considered for the pseudo-random tie-break
const SELECTION_POOL_SIZE: i64 = 5;

/// Last-resort queries when the pool and the content source are both dead
const FALLBACK_TERMS: [&str; 3] = [
    "\"where to watch\" free",
    "\"best free streaming\" site",
    "\"streaming site\" no ads",
];

/// A selected search term handed to the driver
#[derive(Debug, Clone, Serialize)]
pub struct SearchTerm {
    pub search_term: String,
    pub category: String,
    pub title: Option<String>,
    pub content_id: Option<i64>,
    pub language: String,
}

/// Per-title query templates for a language; `{title}` is substituted.
/// Languages without native templates fall back to English.
fn templates_for(lang: &str) -> &'static [(&'static str, &'static str)] {
    match lang {
        "en" => &[
            ("direct", "where to watch {title}"),
            ("discussion", "just watched {title}"),
            ("frustration", "{title} not on netflix"),
            ("recommendation", "movies like {title}"),
        ],
        "es" => &[
            ("direct", "dónde ver {title}"),
            ("discussion", "acabo de ver {title}"),
            ("frustration", "{title} no está en netflix"),
            ("recommendation", "películas como {title}"),
        ],
        "fr" => &[
            ("direct", "où regarder {title}"),
            ("discussion", "je viens de voir {title}"),
            ("frustration", "{title} pas sur netflix"),
            ("recommendation", "films comme {title}"),
        ],
        "de" => &[
            ("direct", "wo kann ich {title} schauen"),
            ("discussion", "habe gerade {title} gesehen"),
            ("frustration", "{title} nicht auf netflix"),
            ("recommendation", "filme wie {title}"),
        ],
        "pt" => &[
            ("direct", "onde assistir {title}"),
            ("discussion", "acabei de ver {title}"),
            ("frustration", "{title} não está na netflix"),
            ("recommendation", "filmes como {title}"),
        ],
        _ => templates_for("en"),
    }
}

pub struct TermPool {
    store: Store,
    content: ContentClient,
    evergreen_ratio: f64,
    rng: Mutex<StdRng>,
}

impl TermPool {
    pub fn new(store: Store, content: ContentClient, config: &Config) -> Self {
        Self::with_rng(store, content, config, StdRng::from_entropy())
    }

    /// Construct with a caller-supplied RNG so tests can fix the seed
    pub fn with_rng(store: Store, content: ContentClient, config: &Config, rng: StdRng) -> Self {
        Self {
            store,
            content,
            evergreen_ratio: config.evergreen_ratio,
            rng: Mutex::new(rng),
        }
    }

    /// Next discovery query for a language. Never fails: any internal error
    /// degrades to a static fallback term.
    pub async fn next_search_term(&self, lang: &str, content_region: &str) -> SearchTerm {
        match self.next_inner(lang, content_region).await {
            Ok(term) => term,
            Err(e) => {
                log::error!("Term selection failed, using fallback: {:#}", e);
                self.fallback_term(lang)
            }
        }
    }

    async fn next_inner(&self, lang: &str, content_region: &str) -> Result<SearchTerm> {
        self.ensure_pool(lang, content_region).await?;

        let prefer_evergreen = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            rng.gen::<f64>() < self.evergreen_ratio
        };
        let cutoff = Utc::now() - Duration::hours(TERM_REUSE_HOURS);

        // Widen the filters step by step: preferred category with the
        // recency filter, any category, then recency relaxed entirely.
        let mut candidates = self
            .store
            .candidate_terms(lang, Some(prefer_evergreen), Some(cutoff), SELECTION_POOL_SIZE)
            .await?;
        if candidates.is_empty() {
            candidates = self
                .store
                .candidate_terms(lang, None, Some(cutoff), SELECTION_POOL_SIZE)
                .await?;
        }
        if candidates.is_empty() {
            candidates = self
                .store
                .candidate_terms(lang, None, None, SELECTION_POOL_SIZE)
                .await?;
        }

        let chosen = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            let index = rng.gen_range(0..candidates.len().max(1));
            candidates.into_iter().nth(index)
        };
        let row = match chosen {
            Some(row) => row,
            None => anyhow::bail!("term pool is empty for language {}", lang),
        };

        self.store.mark_term_used(&row.term, &row.language).await?;
        log::info!(
            "Selected search term \"{}\" ({}, {})",
            row.term,
            row.category,
            row.language
        );

        Ok(SearchTerm {
            search_term: row.term,
            category: row.category,
            title: row.title,
            content_id: row.content_id,
            language: row.language,
        })
    }

    /// Populate the pool for a language if it is empty: seed the evergreen
    /// keyword list, then expand templates over trending titles.
    async fn ensure_pool(&self, lang: &str, content_region: &str) -> Result<()> {
        if self.store.term_count(lang).await? > 0 {
            return Ok(());
        }

        log::info!("Term pool empty for {}, generating...", lang);
        let mut added = 0;

        for (index, keyword) in schedule::keywords_for(lang).iter().enumerate() {
            // Earlier keywords in the list rank higher
            let popularity = (100 - index * 10) as f64;
            if self
                .store
                .insert_term(keyword, lang, "generic", None, None, popularity)
                .await?
            {
                added += 1;
            }
        }

        let items = self.content.trending_content(content_region, lang).await;
        for item in items.iter().take(MAX_TITLES_PER_REFRESH) {
            for (category, template) in templates_for(lang) {
                let term = template.replace("{title}", &item.title);
                if self
                    .store
                    .insert_term(&term, lang, category, Some(item.title.as_str()), Some(item.id), item.popularity)
                    .await?
                {
                    added += 1;
                }
            }
        }

        log::info!("Term pool generated for {}: {} new terms", lang, added);
        Ok(())
    }

    fn fallback_term(&self, lang: &str) -> SearchTerm {
        let index = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            rng.gen_range(0..FALLBACK_TERMS.len())
        };
        SearchTerm {
            search_term: FALLBACK_TERMS[index].to_string(),
            category: "generic".to_string(),
            title: None,
            content_id: None,
            language: lang.to_string(),
        }
    }
}
