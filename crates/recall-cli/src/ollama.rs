//! Ollama helpers: model discovery and a [`ResponseGenerator`] backed by
//! the `/api/generate` endpoint.

use std::fmt::Write as _;
use std::time::Duration;

use recall_context::response::{GeneratedResponse, ResponseError, ResponseGenerator, ResponseRequest};
use recall_types::Role;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Messages of the routed context included in the prompt.
const PROMPT_HISTORY: usize = 8;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A single model entry returned by Ollama's `/api/tags` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ping the Ollama server and return the list of available models.
pub fn fetch_models(base_url: &str) -> Result<Vec<OllamaModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response = reqwest::blocking::get(&url).map_err(|e| format!("Ollama unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Ollama returned HTTP {}", response.status()));
    }

    let tags: TagsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse Ollama response: {}", e))?;

    Ok(tags.models)
}

/// Replies generated by a local Ollama model.
pub struct OllamaGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Result<Self, ResponseError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ResponseError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

impl ResponseGenerator for OllamaGenerator {
    fn generate(&self, request: &ResponseRequest) -> Result<GeneratedResponse, ResponseError> {
        let prompt = build_prompt(request);
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_len = prompt.len(), "ollama generate");
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &prompt,
                stream: false,
            })
            .send()
            .map_err(|e| ResponseError::Unavailable(format!("Ollama unreachable at {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(ResponseError::Failed(format!("Ollama returned HTTP {}", response.status())));
        }
        let body: GenerateResponse = response
            .json()
            .map_err(|e| ResponseError::Failed(format!("Failed to parse Ollama response: {e}")))?;
        Ok(GeneratedResponse::text(body.response.trim()))
    }
}

/// Render the turn into a plain-text prompt.
pub fn build_prompt(request: &ResponseRequest) -> String {
    let mut prompt = String::from(
        "You are a helpful personal assistant with a long-term memory. Reply briefly and naturally.\n",
    );
    let _ = writeln!(prompt, "\nConversation topic: {}", request.context.topic);

    let preferences = request.profile.top_preferences(5);
    if !preferences.is_empty() {
        let likes: Vec<&str> = preferences
            .iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(p, _)| p.as_str())
            .collect();
        if !likes.is_empty() {
            let _ = writeln!(prompt, "The user likes: {}", likes.join(", "));
        }
    }
    if let Some(style) = request.profile.dominant_style() {
        let _ = writeln!(prompt, "Preferred communication style: {style}");
    }

    if !request.memories.is_empty() {
        prompt.push_str("\nThings you remember about the user:\n");
        for memory in &request.memories {
            let _ = writeln!(prompt, "- {}", memory.value);
        }
    }

    let messages = request.context.messages();
    let start = messages.len().saturating_sub(PROMPT_HISTORY);
    prompt.push_str("\nRecent conversation:\n");
    for message in &messages[start..] {
        let speaker = match message.role {
            Role::User => "User",
            Role::Agent => "Assistant",
        };
        let _ = writeln!(prompt, "{speaker}: {}", message.content);
    }

    if let Some(topic) = &request.pending_topic {
        let _ = writeln!(prompt, "\nIf it fits, also bring up: {}", topic.topic);
    }
    prompt.push_str("\nAssistant:");
    prompt
}
