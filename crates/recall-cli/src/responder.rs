//! Offline replies and the fallback chain used when Ollama is down.

use recall_context::response::{GeneratedResponse, ResponseError, ResponseGenerator, ResponseRequest};
use recall_types::{Metadata, MetadataValue};
use tracing::warn;

/// Deterministic replies assembled from the request alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResponder;

impl ResponseGenerator for TemplateResponder {
    fn generate(&self, request: &ResponseRequest) -> Result<GeneratedResponse, ResponseError> {
        let mut text = format!("Noted, we're on \"{}\".", request.context.topic);
        if let Some(memory) = request.memories.first() {
            text.push_str(&format!(" I remember: {}.", memory.value));
        }
        if let Some(pending) = &request.pending_topic {
            text.push_str(&format!(" By the way, earlier you mentioned {}.", pending.topic));
        }
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), MetadataValue::Text("template".into()));
        Ok(GeneratedResponse {
            text,
            metadata,
            follow_up_topics: Vec::new(),
        })
    }
}

/// Tries `primary` first and answers with `fallback` when it fails.
pub struct FallbackGenerator<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackGenerator<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: ResponseGenerator, F: ResponseGenerator> ResponseGenerator for FallbackGenerator<P, F> {
    fn generate(&self, request: &ResponseRequest) -> Result<GeneratedResponse, ResponseError> {
        match self.primary.generate(request) {
            Ok(response) => Ok(response),
            Err(err) => {
                warn!(error = %err, "primary responder failed, using fallback");
                self.fallback.generate(request)
            }
        }
    }
}
