use crate::error::OverlayError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Prompt sent when checking a newly entered API key.
pub const KEY_CHECK_PROMPT: &str = "Hi";

// Non-JSON error bodies (proxy pages and the like) are cut to this many chars.
const MAX_ERROR_SNIPPET: usize = 200;

/// Display name and model id of the models offered in the UI.
pub const AVAILABLE_MODELS: &[(&str, &str)] = &[
    ("Gemini 2.5 Flash", "gemini-2.5-flash"),
    ("Gemini 2.5 Pro", "gemini-2.5-pro"),
];

pub fn model_display_name(model: &str) -> &str {
    AVAILABLE_MODELS
        .iter()
        .find(|(_, id)| *id == model)
        .map(|(name, _)| *name)
        .unwrap_or(model)
}

/// Text generation backend. Calls block and are made from a worker thread.
pub trait GenerationClient: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, OverlayError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            api_base: DEFAULT_API_BASE.into(),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    config: ClientConfig,
}

impl GeminiClient {
    pub fn new(config: ClientConfig) -> Result<Self, OverlayError> {
        if config.api_key.trim().is_empty() {
            return Err(OverlayError::Config("API key is empty".into()));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("gemini-overlay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OverlayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }
}

impl GenerationClient for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, OverlayError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        tracing::debug!(model = %self.config.model, chars = prompt.len(), "sending generation request");
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            let err = classify_failure(status.as_u16(), &text);
            tracing::warn!("generation request failed: {err}");
            return Err(err);
        }
        extract_text(&text)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Pull the response text out of a successful `generateContent` body.
pub fn extract_text(body: &str) -> Result<String, OverlayError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| OverlayError::Transport(format!("unexpected response: {e}")))?;

    let text: String = parsed
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| {
            c.parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text.trim().to_string());
    }
    match parsed.prompt_feedback.and_then(|f| f.block_reason) {
        Some(reason) => Ok(format!("No response (blocked: {reason})")),
        None => Ok("No response".into()),
    }
}

/// Map a non-success HTTP reply onto the error taxonomy.
pub fn classify_failure(status: u16, body: &str) -> OverlayError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .or_else(|| {
            let body = body.trim();
            (!body.is_empty()).then(|| body.chars().take(MAX_ERROR_SNIPPET).collect())
        });

    if status == 401 || status == 403 || body.contains("API_KEY_INVALID") {
        OverlayError::InvalidCredential(message.unwrap_or_else(|| format!("HTTP {status}")))
    } else {
        match message {
            Some(m) => OverlayError::Transport(format!("HTTP {status}: {m}")),
            None => OverlayError::Transport(format!("HTTP {status}")),
        }
    }
}
