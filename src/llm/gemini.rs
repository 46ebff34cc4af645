use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::StudioError;
use crate::llm::media::DataUrl;
use crate::utils::http::get_http_client;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        GeminiPart::Text { text: text.into() }
    }

    pub fn inline(data_url: &DataUrl) -> Self {
        GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: data_url.mime_type.clone(),
                data: data_url.data.clone(),
            },
        }
    }
}

impl GenerateContentRequest {
    pub fn user(parts: Vec<GeminiPart>, generation_config: Option<GenerationConfig>) -> Self {
        GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config,
        }
    }

    #[cfg(test)]
    pub fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.contents.iter().flat_map(|content| content.parts.iter())
    }
}

impl GenerationConfig {
    /// JSON mode with an OBJECT schema whose properties are all STRING.
    pub fn json_object(keys: &[&str]) -> Self {
        let properties = keys
            .iter()
            .map(|key| (key.to_string(), json!({ "type": "STRING" })))
            .collect::<Map<String, Value>>();
        GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(json!({ "type": "OBJECT", "properties": properties })),
            ..GenerationConfig::default()
        }
    }

    pub fn image(aspect_ratio: &str) -> Self {
        GenerationConfig {
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            image_config: build_image_config(aspect_ratio),
            ..GenerationConfig::default()
        }
    }
}

fn build_image_config(aspect_ratio: &str) -> Option<Value> {
    let trimmed = aspect_ratio.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(json!({ "aspectRatio": trimmed }))
    }
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.candidates
            .iter()
            .flatten()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
    }

    /// Concatenated text of every text part, in order.
    pub fn text(&self) -> String {
        self.parts()
            .filter_map(|part| match part {
                GeminiPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn first_inline_data(&self) -> Option<&GeminiInlineData> {
        self.parts().find_map(|part| match part {
            GeminiPart::InlineData { inline_data } => Some(inline_data),
            _ => None,
        })
    }
}

/// One generateContent round trip against a generative backend.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeminiResponse, StudioError>;
}

/// Builds a short-lived backend handle for a resolved credential.
pub trait BackendFactory: Send + Sync {
    fn connect(&self, api_key: &str) -> Arc<dyn GenerativeBackend>;
}

/// Explicit key first, then the process-wide default.
pub fn resolve_api_key(
    explicit: Option<&str>,
    default: Option<&str>,
) -> Result<String, StudioError> {
    explicit
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| default.map(str::trim).filter(|key| !key.is_empty()))
        .map(str::to_string)
        .ok_or(StudioError::MissingApiKey)
}

/// Everything the core components need to reach the backend.
#[derive(Clone)]
pub struct GenAi {
    factory: Arc<dyn BackendFactory>,
    default_api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
}

impl GenAi {
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        default_api_key: Option<String>,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        GenAi {
            factory,
            default_api_key,
            text_model: text_model.into(),
            image_model: image_model.into(),
        }
    }

    pub fn client(&self, api_key: Option<&str>) -> Result<Arc<dyn GenerativeBackend>, StudioError> {
        let key = resolve_api_key(api_key, self.default_api_key.as_deref())?;
        Ok(self.factory.connect(&key))
    }
}

pub struct GeminiClient {
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        GeminiClient {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    fn redact(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeminiResponse, StudioError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_request(request);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = get_http_client()
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect()
                );
                StudioError::backend(None, err_text)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&self.redact(&body));
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(StudioError::backend(
                Some(status.as_u16()),
                message.unwrap_or(body_summary),
            ));
        }

        let value = response.json::<GeminiResponse>().await.map_err(|err| {
            StudioError::backend(
                Some(status.as_u16()),
                format!("unreadable response body: {}", self.redact(&err.to_string())),
            )
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }
}

/// Creates a fresh [`GeminiClient`] per call against one base URL.
#[derive(Debug, Clone)]
pub struct GeminiClientFactory {
    base_url: String,
}

impl GeminiClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        GeminiClientFactory {
            base_url: base_url.into(),
        }
    }
}

impl BackendFactory for GeminiClientFactory {
    fn connect(&self, api_key: &str) -> Arc<dyn GenerativeBackend> {
        Arc::new(GeminiClient::new(api_key, self.base_url.clone()))
    }
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_parts<'a>(parts: impl Iterator<Item = &'a GeminiPart>) -> Vec<Value> {
    parts
        .map(|part| match part {
            GeminiPart::Text { text } => json!({ "text": truncate_for_log(text, 200) }),
            GeminiPart::InlineData { inline_data } => json!({
                "inlineData": {
                    "mimeType": inline_data.mime_type,
                    "dataLen": inline_data.data.len()
                }
            }),
            GeminiPart::Other(_) => json!({ "unknownPart": true }),
        })
        .collect()
}

fn summarize_request(request: &GenerateContentRequest) -> Value {
    let contents = request
        .contents
        .iter()
        .map(|content| {
            json!({
                "role": content.role.as_deref().unwrap_or("user"),
                "parts": summarize_parts(content.parts.iter())
            })
        })
        .collect::<Vec<_>>();
    let mut summary = Map::new();
    summary.insert("contents".to_string(), Value::Array(contents));
    if let Some(config) = &request.generation_config {
        summary.insert(
            "generationConfig".to_string(),
            serde_json::to_value(config).unwrap_or(Value::Null),
        );
    }
    Value::Object(summary)
}

fn summarize_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    for part in response.parts() {
        match part {
            GeminiPart::Text { text } => {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if inline_data.mime_type.starts_with("image/") {
                    image_parts += 1;
                }
            }
            GeminiPart::Other(_) => {}
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}
