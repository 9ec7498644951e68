//! Shared fixtures: a scripted vision provider and case helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use scan_review::models::image::ScanImage;
use scan_review::services::analysis::{AnalysisConfig, SliceAnalysisScheduler};
use scan_review::services::workflow::{CaseSession, WorkflowPolicy};
use scan_review::storage::MemoryStateStore;
use scan_review_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent,
    ProviderConfig,
};

pub const EXAM_TITLE: &str = "MRI PELVIS FOR ENDOMETRIOSIS";

/// Answers image prompts by sequence label and text prompts with a fixed
/// translation. Tracks how many calls overlap.
pub struct MockVisionProvider {
    config: ProviderConfig,
    replies: HashMap<String, LlmResult<String>>,
    default_reply: String,
    translation: LlmResult<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockVisionProvider {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig {
                api_key: Some("test-key".to_string()),
                ..Default::default()
            },
            replies: HashMap::new(),
            default_reply: slice_json(true, "Axial T2 pelvis", vec![]),
            translation: Ok(translation_json("Your scan shows a small cyst.")),
            delay: Duration::from_millis(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_key(mut self) -> Self {
        self.config.api_key = None;
        self
    }

    /// Reply for the image labelled `label` (e.g. "Image 2").
    pub fn reply(mut self, label: &str, body: impl Into<String>) -> Self {
        self.replies.insert(label.to_string(), Ok(body.into()));
        self
    }

    pub fn fail(mut self, label: &str) -> Self {
        self.replies.insert(
            label.to_string(),
            Err(LlmError::ServerError {
                message: format!("{} rejected", label),
                status: Some(500),
            }),
        );
        self
    }

    pub fn fail_translation(mut self) -> Self {
        self.translation = Err(LlmError::NetworkError {
            message: "connection reset".to_string(),
        });
        self
    }

    pub fn delay(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Labels of every call received, "translation" for text-only calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn prompt_text(message: &Message) -> &str {
    message
        .content
        .iter()
        .find_map(|block| match block {
            MessageContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .unwrap_or("")
}

/// Pull "Image N" out of "(Sequence: Image N)".
fn sequence_label(prompt: &str) -> String {
    prompt
        .split("Sequence: ")
        .nth(1)
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("")
        .to_string()
}

#[async_trait]
impl LlmProvider for MockVisionProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-vision"
    }

    fn supports_multimodal(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        _system: Option<String>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        assert!(request_options.json_response);
        let message = &messages[0];

        if !message.has_image() {
            self.calls.lock().unwrap().push("translation".to_string());
            return self
                .translation
                .clone()
                .map(|body| LlmResponse::text("mock-vision", body));
        }

        let label = sequence_label(prompt_text(message));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(label.clone());

        match self.replies.get(&label) {
            Some(Ok(body)) => Ok(LlmResponse::text("mock-vision", body.clone())),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(LlmResponse::text("mock-vision", self.default_reply.clone())),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

// ============================================================================
// Response builders
// ============================================================================

pub fn finding(title: &str, confidence: &str, region: &str, description: &str) -> Value {
    json!({
        "title": title,
        "confidence": confidence,
        "region": region,
        "description": description,
    })
}

pub fn slice_json(valid: bool, description: &str, findings: Vec<Value>) -> String {
    json!({
        "isValidModality": valid,
        "modalityDescription": description,
        "findings": findings,
    })
    .to_string()
}

pub fn translation_json(summary: &str) -> String {
    json!({
        "summary": summary,
        "questions": ["Does the cyst need follow-up?"],
        "resources": [{"title": "Ovarian cysts", "source": "NIH"}],
    })
    .to_string()
}

// ============================================================================
// Case helpers
// ============================================================================

/// `n` tiny images labelled "Image 1".."Image n" with ids "img-1".."img-n".
pub fn images(n: usize) -> Vec<ScanImage> {
    (1..=n)
        .map(|i| {
            ScanImage::new(
                format!("img-{}", i),
                format!("Image {}", i),
                "image/png",
                vec![0x89, b'P', b'N', b'G'],
            )
        })
        .collect()
}

pub fn scheduler(provider: &Arc<MockVisionProvider>) -> SliceAnalysisScheduler {
    SliceAnalysisScheduler::new(provider.clone(), AnalysisConfig::default())
}

/// A session over an in-memory store with a fresh case started.
pub fn started_session() -> (CaseSession, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let mut session = CaseSession::open(store.clone(), WorkflowPolicy::default(), EXAM_TITLE)
        .unwrap();
    session.start_case().unwrap();
    (session, store)
}
