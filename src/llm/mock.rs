//! Recording backend used by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::StudioError;
use crate::llm::gemini::{
    BackendFactory, GenAi, GenerateContentRequest, GeminiResponse, GenerativeBackend,
};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub api_key: String,
    pub model: String,
    pub request: GenerateContentRequest,
}

type Reply = Result<GeminiResponse, StudioError>;

#[derive(Default)]
struct Inner {
    calls: Vec<RecordedCall>,
    replies: VecDeque<Reply>,
    delay: Option<Duration>,
}

/// Answers calls from a queue of canned replies and remembers every request.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<Inner>>,
}

struct Handle {
    api_key: String,
    inner: Arc<Mutex<Inner>>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.inner.lock().replies.push_back(reply);
        self
    }

    /// Every call waits this long before answering.
    pub fn with_delay(&self, delay: Duration) -> &Self {
        self.inner.lock().delay = Some(delay);
        self
    }

    pub fn reply_text(&self, text: &str) -> &Self {
        self.reply(Ok(text_response(text)))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn genai(&self, default_api_key: Option<&str>) -> GenAi {
        GenAi::new(
            Arc::new(self.clone()),
            default_api_key.map(str::to_string),
            "text-model",
            "image-model",
        )
    }
}

impl BackendFactory for MockBackend {
    fn connect(&self, api_key: &str) -> Arc<dyn GenerativeBackend> {
        Arc::new(Handle {
            api_key: api_key.to_string(),
            inner: self.inner.clone(),
        })
    }
}

#[async_trait]
impl GenerativeBackend for Handle {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeminiResponse, StudioError> {
        let (reply, delay) = {
            let mut inner = self.inner.lock();
            inner.calls.push(RecordedCall {
                api_key: self.api_key.clone(),
                model: model.to_string(),
                request: request.clone(),
            });
            let reply = inner
                .replies
                .pop_front()
                .unwrap_or_else(|| Err(StudioError::backend(None, "no canned reply")));
            (reply, inner.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

pub fn response_from_parts(parts: Vec<Value>) -> GeminiResponse {
    serde_json::from_value(json!({ "candidates": [{ "content": { "parts": parts } }] }))
        .expect("valid canned response")
}

pub fn text_response(text: &str) -> GeminiResponse {
    response_from_parts(vec![json!({ "text": text })])
}

pub fn image_response(data: &str) -> GeminiResponse {
    response_from_parts(vec![
        json!({ "text": "Here is your render." }),
        json!({ "inlineData": { "mimeType": "image/png", "data": data } }),
    ])
}
