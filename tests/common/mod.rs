//! Shared test fixtures: a scripted backend and client wiring.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use lexi_ai::drivers::GenerativeBackend;
use lexi_ai::resilience::{QuotaCooldown, RecordingSleeper};
use lexi_ai::telemetry::InMemoryNotifier;
use lexi_ai::types::{GenerateRequest, GenerateResponse, ImagePayload};
use lexi_ai::{BoxStream, Error, LexiClient, Result};

/// One scripted provider answer.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Image(Vec<u8>),
    Fail { status: u16, body: String },
    FailMessage(String),
}

impl Step {
    pub fn json(v: serde_json::Value) -> Self {
        Step::Text(v.to_string())
    }

    pub fn quota() -> Self {
        Step::Fail {
            status: 429,
            body: r#"{"error":{"code":429,"message":"You exceeded your current quota, please check your plan and billing details.","status":"RESOURCE_EXHAUSTED"}}"#.to_string(),
        }
    }

    pub fn rate_limited() -> Self {
        Step::Fail {
            status: 429,
            body: r#"{"error":{"code":429,"message":"Too many requests, slow down"}}"#.to_string(),
        }
    }

    pub fn unavailable() -> Self {
        Step::Fail {
            status: 503,
            body: r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#.to_string(),
        }
    }

    fn realize(&self) -> Result<GenerateResponse> {
        match self {
            Step::Text(t) => Ok(GenerateResponse::from_text(t.clone())),
            Step::Image(bytes) => Ok(GenerateResponse::from_image(ImagePayload {
                mime_type: "image/png".to_string(),
                bytes: bytes.clone(),
            })),
            Step::Fail { status, body } => Err(Error::Remote {
                status: *status,
                message: "scripted failure".to_string(),
                body: body.clone(),
            }),
            Step::FailMessage(m) => Err(Error::runtime_with_context(m.clone(), Default::default())),
        }
    }
}

/// Answers `generate` from a script; the last step repeats once the script runs out.
pub struct ScriptedBackend {
    steps: Vec<Step>,
    calls: Mutex<Vec<GenerateRequest>>,
    stream_items: Mutex<Vec<std::result::Result<String, Step>>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: Mutex::new(Vec::new()),
            stream_items: Mutex::new(Vec::new()),
        })
    }

    pub fn with_stream(steps: Vec<Step>, items: Vec<std::result::Result<String, Step>>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: Mutex::new(Vec::new()),
            stream_items: Mutex::new(items),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };
        let step = self
            .steps
            .get(n)
            .or_else(|| self.steps.last())
            .expect("script has at least one step");
        step.realize()
    }

    async fn stream(&self, request: &GenerateRequest) -> Result<BoxStream<'static, String>> {
        self.calls.lock().unwrap().push(request.clone());
        let items: Vec<Result<String>> = self
            .stream_items
            .lock()
            .unwrap()
            .iter()
            .map(|item| match item {
                Ok(text) => Ok(text.clone()),
                Err(step) => Err(step.realize().unwrap_err()),
            })
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

pub struct Harness {
    pub client: LexiClient,
    pub backend: Arc<ScriptedBackend>,
    pub notes: Arc<InMemoryNotifier>,
    pub sleeper: RecordingSleeper,
    pub cooldown: QuotaCooldown,
}

/// Client over `backend` with a private cooldown, recorded notifications and a
/// virtual backoff clock.
pub fn harness(backend: Arc<ScriptedBackend>) -> Harness {
    let notes = Arc::new(InMemoryNotifier::default());
    let sleeper = RecordingSleeper::new();
    let cooldown = QuotaCooldown::new(Duration::from_secs(900));
    let client = LexiClient::builder()
        .backend(backend.clone())
        .notifier(notes.clone())
        .sleeper(Arc::new(sleeper.clone()))
        .cooldown(cooldown.clone())
        .build()
        .expect("client builds");
    Harness {
        client,
        backend,
        notes,
        sleeper,
        cooldown,
    }
}
