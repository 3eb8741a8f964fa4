//! Deterministic collaborator fakes for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::providers::{
    EmbeddingProvider, GenerationRequest, LlmProvider, LocalVectorIndex, VectorIndex,
    VectorRecord,
};
use crate::types::VectorMatch;

/// Dimensions of [`LetterEmbedder`] vectors
pub const LETTER_DIMENSIONS: usize = 26;

/// Embeds text as its a-z letter frequencies
pub struct LetterEmbedder {
    ceiling: usize,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl LetterEmbedder {
    pub fn new() -> Self {
        Self::with_ceiling(20)
    }

    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            ceiling,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Successful and failed calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; LETTER_DIMENSIONS];
        for ch in text.chars().filter(char::is_ascii_alphabetic) {
            vector[(ch.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if take_failure(&self.failures) {
            return Err(Error::embedding("scripted embedding failure"));
        }
        if texts.len() > self.ceiling {
            return Err(Error::embedding("batch exceeds ceiling"));
        }

        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn max_batch_size(&self) -> usize {
        self.ceiling
    }

    fn dimensions(&self) -> usize {
        LETTER_DIMENSIONS
    }

    fn name(&self) -> &str {
        "letters"
    }
}

/// Answers structured-output requests with `plan` and free-text requests
/// with `answer`, recording every request.
///
/// `{first}` in `answer` is replaced with the first bracketed label in the
/// user prompt, i.e. the id of the top-ranked passage.
pub struct ScriptedLlm {
    plan: String,
    answer: String,
    requests: Mutex<Vec<GenerationRequest>>,
    answer_failures: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(plan: &str, answer: &str) -> Self {
        Self {
            plan: plan.to_string(),
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
            answer_failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` free-text requests
    pub fn fail_answers(&self, n: usize) {
        self.answer_failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Number of structured-output (planning) requests
    pub fn plan_calls(&self) -> usize {
        self.requests.lock().iter().filter(|r| r.json_output).count()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().push(request.clone());

        if request.json_output {
            return Ok(self.plan.clone());
        }
        if take_failure(&self.answer_failures) {
            return Err(Error::llm("scripted generation failure"));
        }
        let first = request
            .user_prompt
            .split_once('[')
            .and_then(|(_, rest)| rest.split_once(']'))
            .map(|(label, _)| label)
            .unwrap_or_default();
        Ok(self.answer.replace("{first}", first))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Local index whose first `n` upserts fail
pub struct FlakyIndex {
    inner: LocalVectorIndex,
    failures: AtomicUsize,
    upserts: AtomicUsize,
}

impl FlakyIndex {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: LocalVectorIndex::new(LETTER_DIMENSIONS),
            failures: AtomicUsize::new(failures),
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn upsert(&self, items: &[VectorRecord]) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures) {
            return Err(Error::vector_db("scripted upsert failure"));
        }
        self.inner.upsert(items).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        self.inner.query(vector, top_k).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Consume one scripted failure if any remain
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
