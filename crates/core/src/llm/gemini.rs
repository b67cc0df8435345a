use crate::config::Settings;
use crate::error::{ErrorKind, StageError};
use crate::llm::{GroundedAnswer, GroundedModel, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const TEMPERATURE: f32 = 0.3;

const STAGE: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiOptions {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GeminiOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            base_url: settings.gemini_base_url.clone().unwrap_or(defaults.base_url),
            model: settings.gemini_model.clone().unwrap_or(defaults.model),
            timeout: settings
                .gemini_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, options: GeminiOptions) -> anyhow::Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "Gemini API key must be non-empty");

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            base_url: options.base_url,
            model: options.model,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        }
    }

    async fn generate_content(&self, prompt: &str) -> Result<GenerateContentResponse, StageError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| StageError::new(ErrorKind::Auth, STAGE, "API key is not a valid header value"))?;
        headers.insert("x-goog-api-key", key);

        let res = self
            .http
            .post(self.url())
            .headers(headers)
            .json(&Self::request(prompt))
            .send()
            .await
            .map_err(|err| {
                StageError::new(ErrorKind::TransientApi, STAGE, format!("request failed: {err}"))
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| {
            StageError::new(
                ErrorKind::TransientApi,
                STAGE,
                format!("failed to read response body: {err}"),
            )
        })?;

        if !status.is_success() {
            return Err(StageError::new(
                classify_status(status, &text),
                STAGE,
                format!("status={status} body={}", truncate(&text, 500)),
            ));
        }

        serde_json::from_str::<GenerateContentResponse>(&text).map_err(|err| {
            StageError::new(
                ErrorKind::MalformedResponse,
                STAGE,
                format!("failed to decode generateContent response: {err}"),
            )
        })
    }
}

#[async_trait::async_trait]
impl GroundedModel for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, prompt: &str) -> Result<GroundedAnswer, StageError> {
        let res = self.generate_content(prompt).await?;
        into_answer(res)
    }
}

fn classify_status(status: StatusCode, body: &str) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Auth,
        // Gemini reports a bad key as 400 INVALID_ARGUMENT.
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => ErrorKind::Auth,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ErrorKind::TransientApi,
        s if s.is_server_error() => ErrorKind::TransientApi,
        _ => ErrorKind::MalformedResponse,
    }
}

fn into_answer(res: GenerateContentResponse) -> Result<GroundedAnswer, StageError> {
    let Some(candidate) = res.candidates.into_iter().next() else {
        return Err(StageError::new(
            ErrorKind::MalformedResponse,
            STAGE,
            "response has no candidates",
        ));
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let mut sources: Vec<String> = Vec::new();
    let chunks = candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default();
    for chunk in chunks {
        if let Some(uri) = chunk.web.and_then(|w| w.uri) {
            if !sources.contains(&uri) {
                sources.push(uri);
            }
        }
    }

    Ok(GroundedAnswer {
        text: text.trim().to_string(),
        sources,
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
}
