//! Anthropic Messages API client for running deal analyses, plus response
//! section parsing for feedback targeting.
//!
//! One analysis = one request. Retries, if wanted, belong to the caller
//! wrapping the whole pipeline, not here.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use dealscope_shared::{DealScopeError, Result};

/// API version header sent with every request.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Analysis calls wait on model generation, so the timeout is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// User-Agent string for analysis requests.
const USER_AGENT: &str = concat!("DealScope/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Prompt & result types
// ---------------------------------------------------------------------------

/// A prompt template drawn from the analysis-type catalog. Opaque to the
/// pipeline: the system text is passed through unchanged.
#[derive(Debug, Clone)]
pub struct AnalysisPrompt {
    pub type_id: String,
    pub system_prompt: String,
    pub version: i64,
}

/// The model's answer to one analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub text: String,
    pub model: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ---------------------------------------------------------------------------
// AnalysisClient
// ---------------------------------------------------------------------------

/// Client for the Anthropic Messages API.
pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnalysisClient {
    /// Create a new client. `base_url` is overridable for tests.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DealScopeError::Analysis(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        })
    }

    /// Run one analysis: the assembled deal document plus the prompt's system
    /// text in, the model's answer out. Non-success responses surface the
    /// API's own error message where one is present.
    #[instrument(skip_all, fields(model = %self.model, prompt = %prompt.type_id))]
    pub async fn analyze(&self, document: &str, prompt: &AnalysisPrompt) -> Result<AnalysisOutcome> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &prompt.system_prompt,
            messages: vec![Message {
                role: "user",
                content: format!("Analyze the following CRM deal:\n\n{document}"),
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| DealScopeError::Analysis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .map(|detail| detail.message)
                .unwrap_or_else(|| format!("analysis API error: HTTP {status}"));
            return Err(DealScopeError::Analysis(message));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DealScopeError::Analysis(format!("malformed response: {e}")))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DealScopeError::Analysis("response contained no text".into()))?;

        info!(chars = text.len(), model = %parsed.model, "analysis complete");
        Ok(AnalysisOutcome {
            text,
            model: parsed.model,
        })
    }
}

// ---------------------------------------------------------------------------
// Section parsing
// ---------------------------------------------------------------------------

/// One `## `-delimited section of a Markdown analysis response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Stable id (`section_1`, `section_2`, …) used as the feedback key.
    pub section_id: String,
    pub section_title: String,
    pub content: String,
}

/// Split a Markdown response into sections on `## ` headers.
///
/// Sections are numbered in order of appearance; content is trimmed. Text
/// before the first header is not part of any section, and a header-free
/// response yields no sections at all.
pub fn parse_sections(markdown: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in markdown.lines() {
        if let Some(title) = line.strip_prefix("## ") {
            if let Some((prev_title, content)) = current.take() {
                push_section(&mut sections, prev_title, &content);
            }
            current = Some((title.trim().to_string(), Vec::new()));
        } else if let Some((_, content)) = current.as_mut() {
            content.push(line);
        }
    }

    if let Some((title, content)) = current {
        push_section(&mut sections, title, &content);
    }

    sections
}

fn push_section(sections: &mut Vec<Section>, title: String, content: &[&str]) {
    let section_id = format!("section_{}", sections.len() + 1);
    sections.push(Section {
        section_id,
        section_title: title,
        content: content.join("\n").trim().to_string(),
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
