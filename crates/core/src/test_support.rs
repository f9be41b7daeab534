//! Fake collaborators shared by the unit tests.

use crate::model::{Embedder, Generator, ResponseFormat, Retriever, RetrievedSnippet};
use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn model_failure(message: &str) -> CoreError {
    CoreError::Model(Box::new(std::io::Error::other(message.to_string())))
}

/// Embedder answering from a lookup table, falling back to a default vector.
pub(crate) struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    calls: AtomicUsize,
}

impl FakeEmbedder {
    pub(crate) fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Vec<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

type GenerateFn = dyn Fn(&str, &ResponseFormat) -> CoreResult<Value> + Send + Sync;

/// Generator that delegates to a closure and records every prompt it sees.
pub(crate) struct FnGenerator {
    respond: Box<GenerateFn>,
    prompts: Mutex<Vec<String>>,
}

impl FnGenerator {
    pub(crate) fn new(
        respond: impl Fn(&str, &ResponseFormat) -> CoreResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts mutex poisoned").clone()
    }
}

#[async_trait]
impl Generator for FnGenerator {
    async fn generate(&self, prompt: &str, format: &ResponseFormat) -> CoreResult<Value> {
        self.prompts
            .lock()
            .expect("prompts mutex poisoned")
            .push(prompt.to_string());
        (self.respond)(prompt, format)
    }
}

/// Generator replaying a fixed queue of responses; fails once the queue is drained.
pub(crate) struct ScriptedGenerator {
    responses: Mutex<VecDeque<CoreResult<Value>>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(responses: Vec<CoreResult<Value>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, _format: &ResponseFormat) -> CoreResult<Value> {
        self.responses
            .lock()
            .expect("responses mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(model_failure("script exhausted")))
    }
}

/// Retriever returning a fixed answer.
pub(crate) struct FixedRetriever {
    result: Mutex<Option<CoreResult<Vec<RetrievedSnippet>>>>,
}

impl FixedRetriever {
    pub(crate) fn new(result: CoreResult<Vec<RetrievedSnippet>>) -> Self {
        Self {
            result: Mutex::new(Some(result)),
        }
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(&self, _query: &str) -> CoreResult<Vec<RetrievedSnippet>> {
        self.result
            .lock()
            .expect("result mutex poisoned")
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
