/// Draft generator boundary
///
/// The generator is the one untrusted external collaborator: text in,
/// JSON-ish text out. This module holds the trait seam, the Groq-backed
/// implementation, the keyless stub, and the fail-closed response parser.
/// Anything the generator returns that can't be parsed becomes a SKIP
/// upstream, never a hard failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::Config;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Phrasing hints rotated into the prompt so drafts don't converge on one
/// sentence shape
const REPLY_TEMPLATES: [&str; 8] = [
    "I use {site} for this - works great!",
    "Been using {site} for months, no complaints",
    "{site} has it, saved me so much time",
    "Try {site} - that's what I use",
    "Found it on {site} last week",
    "Someone recommended {site} to me, solid choice",
    "{site} is underrated for this",
    "My friends use {site}, works well",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Reply,
    Skip,
}

/// Context assembled by the orchestrator for one drafting call
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub post_text: String,
    pub parent_text: Option<String>,
    pub thread_context: Option<String>,
    pub author_bio: Option<String>,
    pub lang_code: String,
    pub language: String,
    pub region: String,
    pub trends: Vec<String>,
    pub content_title: Option<String>,
    pub category: Option<String>,
}

/// The generator's structured verdict
#[derive(Debug, Clone, Deserialize)]
pub struct DraftDecision {
    pub action: Action,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub draft: Option<String>,
    #[serde(default)]
    pub trend: Option<String>,
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn analyze_and_draft(&self, request: &DraftRequest) -> Result<DraftDecision>;
}

// ----------------------------------------------------------------------
// Chat API structures
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// ----------------------------------------------------------------------
// Groq implementation
// ----------------------------------------------------------------------

pub struct GroqGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    site_url: String,
    rng: Mutex<StdRng>,
}

impl GroqGenerator {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .groq_api_key
            .clone()
            .context("GROQ_API_KEY is required for the Groq generator")?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.external_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: config.groq_model.clone(),
            site_url: config.site_url.clone(),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    fn build_system_prompt(&self, request: &DraftRequest) -> String {
        let trends_str = if request.trends.is_empty() {
            "None".to_string()
        } else {
            request.trends[..request.trends.len().min(5)].join(", ")
        };

        let template_hint = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            REPLY_TEMPLATES[rng.gen_range(0..REPLY_TEMPLATES.len())]
        };

        let mut content_hint = String::new();
        if let Some(title) = &request.content_title {
            content_hint.push_str(&format!(
                "\nThe search that surfaced this post targeted \"{}\" - if the post is about it, reference it naturally.",
                title
            ));
        }
        if let Some(category) = &request.category {
            content_hint.push_str(&format!(
                "\nThe post was found via a {} style search.",
                category
            ));
        }

        format!(
            r#"You are a NATIVE {language} speaker and movie enthusiast on X (Twitter).
You are located in {region}. You speak ONLY {language}.

=== CRITICAL RULES ===

RULE 1 - LANGUAGE: Your ENTIRE reply MUST be in {language}.
- ZERO English words allowed in non-English replies (except the URL)

RULE 2 - TREND INJECTION: You MUST include a hashtag from these local trends:
LOCAL TRENDS: {trends}
Pick ONE that relates to movies/entertainment if possible. If none provided, skip hashtag.

RULE 3 - REPLY VARIATION: Each reply must be UNIQUE. Use different phrasings.
Example variation style: "{template_hint}"
DO NOT always say "My go-to is..." - vary your responses!

RULE 4 - NATURAL TONE: Sound like a real person, not a bot or ad.
- Be casual and conversational
- Reference the specific movie/show they mentioned
- Don't be overly enthusiastic or promotional
{content_hint}
=== YOUR TASK ===

1. CLASSIFY the post:
   - MOVIE_INTENT: Wants to watch movies/TV shows/anime/drama
   - SPORT_INTENT: Wants live sports (skip these)
   - OTHER: Not about streaming (skip these)

2. IF MOVIE_INTENT:
   - Write a short, casual reply in {language}
   - Mention the specific content they asked about
   - Include link: {site}
   - Include ONE hashtag from the trends
   - Keep it under 200 characters

3. IF SPORT_INTENT or OTHER:
   - action = "SKIP"

=== OUTPUT FORMAT ===
JSON only, no markdown:
{{"action": "REPLY" or "SKIP", "reason": "brief explanation", "draft": "your {language} reply with hashtag" or null, "trend": "hashtag you used" or null}}
"#,
            language = request.language,
            region = request.region,
            trends = trends_str,
            template_hint = template_hint,
            content_hint = content_hint,
            site = self.site_url,
        )
    }

    fn build_user_message(request: &DraftRequest) -> String {
        let mut message = format!("Post: {}", request.post_text);
        if let Some(parent) = &request.parent_text {
            message.push_str(&format!("\nContext (parent post): {}", parent));
        }
        if let Some(thread) = &request.thread_context {
            message.push_str(&format!("\nThread context: {}", thread));
        }
        if let Some(bio) = &request.author_bio {
            message.push_str(&format!("\nAuthor bio: {}", bio));
        }
        message
    }
}

#[async_trait]
impl DraftGenerator for GroqGenerator {
    async fn analyze_and_draft(&self, request: &DraftRequest) -> Result<DraftDecision> {
        let chat_request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.build_system_prompt(request),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_user_message(request),
                },
            ],
            temperature: 0.7,
            max_tokens: 500,
        };

        let response = self
            .http
            .post(GROQ_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&chat_request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            anyhow::bail!("Generator API error (status {}): {}", status, error_text);
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let raw = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("No completion returned by the generator")?;

        parse_decision(&raw)
    }
}

// ----------------------------------------------------------------------
// Stub implementation
// ----------------------------------------------------------------------

/// Deterministic generator used when no API key is configured. Keeps the
/// rest of the pipeline exercisable without the external dependency.
pub struct StubGenerator {
    site_url: String,
}

impl StubGenerator {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.to_string(),
        }
    }
}

#[async_trait]
impl DraftGenerator for StubGenerator {
    async fn analyze_and_draft(&self, request: &DraftRequest) -> Result<DraftDecision> {
        Ok(DraftDecision {
            action: Action::Reply,
            reason: "Movie/TV intent detected (stub)".to_string(),
            draft: Some(format!(
                "[STUB] Check out {} for free streaming!",
                self.site_url
            )),
            trend: request.trends.first().cloned(),
        })
    }
}

// ----------------------------------------------------------------------
// Response parsing
// ----------------------------------------------------------------------

/// Parse free-form generator output into a decision.
///
/// Fallback chain: strict JSON, then the first fenced code block, then any
/// balanced brace span (a reasoning preamble before the JSON is common).
/// Everything else is an error the orchestrator downgrades to SKIP.
pub fn parse_decision(raw: &str) -> Result<DraftDecision> {
    let trimmed = raw.trim();

    if let Ok(decision) = serde_json::from_str::<DraftDecision>(trimmed) {
        return Ok(decision);
    }

    if let Some(block) = extract_fenced_block(trimmed) {
        if let Ok(decision) = serde_json::from_str::<DraftDecision>(block.trim()) {
            return Ok(decision);
        }
    }

    for span in brace_spans(trimmed) {
        if let Ok(decision) = serde_json::from_str::<DraftDecision>(span) {
            return Ok(decision);
        }
    }

    let preview: String = trimmed.chars().take(120).collect();
    anyhow::bail!("Unparseable generator output: {}", preview)
}

/// Contents of the first ``` fenced block, with an optional language tag
/// stripped
fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```")?;
    let mut block = &rest[..end];
    if let Some(stripped) = block.strip_prefix("json") {
        block = stripped;
    }
    Some(block)
}

/// Every balanced `{...}` span in the text, in order of appearance
fn brace_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'{' {
            let mut depth = 0usize;
            for (offset, &byte) in bytes[index..].iter().enumerate() {
                match byte {
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            spans.push(&text[index..index + offset + 1]);
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        index += 1;
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let raw = r##"{"action": "REPLY", "reason": "movie intent", "draft": "try it", "trend": "#Netflix"}"##;
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, Action::Reply);
        assert_eq!(decision.draft.as_deref(), Some("try it"));
        assert_eq!(decision.trend.as_deref(), Some("#Netflix"));
    }

    #[test]
    fn parses_skip_with_null_draft() {
        let raw = r#"{"action": "SKIP", "reason": "sports", "draft": null, "trend": null}"#;
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, Action::Skip);
        assert!(decision.draft.is_none());
    }

    #[test]
    fn parses_fenced_block_with_language_tag() {
        let raw = "```json\n{\"action\": \"REPLY\", \"reason\": \"ok\", \"draft\": \"d\"}\n```";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, Action::Reply);
    }

    #[test]
    fn parses_fenced_block_without_tag() {
        let raw = "Here you go:\n```\n{\"action\": \"SKIP\", \"reason\": \"other\"}\n```\nanything else?";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, Action::Skip);
    }

    #[test]
    fn parses_json_after_reasoning_preamble() {
        let raw = "Let me think about this. The post asks about a movie, so I will reply.\n\n\
                   {\"action\": \"REPLY\", \"reason\": \"movie intent\", \"draft\": \"found it\"}";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, Action::Reply);
    }

    #[test]
    fn skips_non_decision_objects_before_the_real_one() {
        let raw = "{\"reasoning\": \"the user wants a movie\"}\n\
                   {\"action\": \"REPLY\", \"reason\": \"movie intent\", \"draft\": \"d\"}";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.action, Action::Reply);
        assert_eq!(decision.reason, "movie intent");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_decision("I'd rather not say.").is_err());
        assert!(parse_decision("").is_err());
        assert!(parse_decision("{\"action\": \"MAYBE\"}").is_err());
    }

    #[test]
    fn missing_optional_fields_default() {
        let decision = parse_decision(r#"{"action": "SKIP"}"#).unwrap();
        assert_eq!(decision.action, Action::Skip);
        assert_eq!(decision.reason, "");
        assert!(decision.draft.is_none());
        assert!(decision.trend.is_none());
    }

    #[tokio::test]
    async fn stub_generator_always_replies() {
        let stub = StubGenerator::new("example.dev");
        let request = DraftRequest {
            post_text: "where can I watch Dune 2".to_string(),
            parent_text: None,
            thread_context: None,
            author_bio: None,
            lang_code: "en".to_string(),
            language: "English".to_string(),
            region: "London".to_string(),
            trends: vec!["#Film".to_string()],
            content_title: None,
            category: None,
        };

        let decision = stub.analyze_and_draft(&request).await.unwrap();
        assert_eq!(decision.action, Action::Reply);
        assert!(decision.draft.unwrap().contains("example.dev"));
        assert_eq!(decision.trend.as_deref(), Some("#Film"));
    }
}
