//! Grounded answer synthesis
//!
//! Turns the rendered context plus the user question into a cited answer
//! via an OpenAI-compatible chat endpoint. The system prompt forbids
//! claims without a `[n]` citation into the context blocks; grounding of
//! the returned text is estimated per sentence for the answer metrics.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scilit_config::SynthesisConfig;

use crate::RetrievalError;

/// Returned verbatim when retrieval produced no usable passages; the
/// synthesis endpoint is never called in that case.
pub const NO_EVIDENCE_ANSWER: &str =
    "No relevant passages were found in the corpus for this question.";

const SYSTEM_PROMPT: &str = "You are a scientific literature assistant. Answer the question \
using ONLY the numbered evidence blocks provided. Cite every claim with the block number in \
square brackets, like [1] or [2][3]. If the evidence does not answer the question, say so \
plainly instead of speculating. Keep the answer concise and factual.";

/// Produces an answer from a question and rendered evidence context.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, RetrievalError>;
}

/// OpenAI-compatible chat completion client.
pub struct OpenAiSynthesizer {
    client: Client,
    config: SynthesisConfig,
}

impl OpenAiSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RetrievalError::Synthesis(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, RetrievalError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Evidence:\n\n{context}\n\nQuestion: {question}"),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .json(&request);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Synthesis(format!(
                "chat endpoint returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Synthesis(e.to_string()))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RetrievalError::Synthesis("empty choices in response".to_string()))?;

        debug!(chars = answer.len(), "synthesis completed");
        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

static CITATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));

/// Fraction of answer sentences carrying at least one `[n]` citation.
/// A rough proxy for groundedness, reported in the answer metrics.
pub fn estimate_grounding(answer: &str) -> f32 {
    let sentences: Vec<&str> = answer
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let cited = sentences
        .iter()
        .filter(|s| CITATION_RE.is_match(s))
        .count();
    cited as f32 / sentences.len() as f32
}
