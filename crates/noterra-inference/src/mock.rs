//! Mock inference backend for deterministic testing.
//!
//! Provides a mock implementation of the generation and streaming traits
//! with configurable responses, forced failures, and a call log for
//! assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use noterra_core::{ChatMessage, Error, GenerationBackend, Result};

use crate::streaming::{ChatStreaming, TokenStream};

/// Mock chat backend for testing.
#[derive(Clone)]
pub struct MockChatBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    fixed_responses: HashMap<String, String>,
    default_response: String,
    fail_generation: bool,
    fail_mid_stream: bool,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub system: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fixed_responses: HashMap::new(),
            default_response: "Mock response".to_string(),
            fail_generation: false,
            fail_mid_stream: false,
        }
    }
}

impl MockChatBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set a fixed response for all requests without a mapping.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Add a response mapping for a specific input.
    pub fn with_response_mapping(
        mut self,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .insert(input.into(), output.into());
        self
    }

    /// Make every generation and stream request fail up front.
    pub fn with_generation_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_generation = true;
        self
    }

    /// Make streams yield one fragment and then fail.
    pub fn with_mid_stream_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_mid_stream = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    fn log_call(&self, operation: &str, system: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            system: system.to_string(),
            input: input.to_string(),
        });
    }

    fn response_for(&self, input: &str) -> String {
        self.config
            .fixed_responses
            .get(input)
            .cloned()
            .unwrap_or_else(|| self.config.default_response.clone())
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockChatBackend {
    async fn generate_with_system(&self, system: &str, input: &str) -> Result<String> {
        self.log_call("generate", system, input);
        if self.config.fail_generation {
            return Err(Error::Generation("mock generation failure".to_string()));
        }
        Ok(self.response_for(input))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[async_trait]
impl ChatStreaming for MockChatBackend {
    async fn chat_stream(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream> {
        let input = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.log_call("chat_stream", system, &input);

        if self.config.fail_generation {
            return Err(Error::Generation("mock generation failure".to_string()));
        }

        if self.config.fail_mid_stream {
            let items: Vec<Result<String>> = vec![
                Ok("partial ".to_string()),
                Err(Error::Generation("mock mid-stream failure".to_string())),
            ];
            return Ok(Box::pin(futures::stream::iter(items)));
        }

        // Split the response into word-sized fragments so consumers see a
        // real multi-item stream.
        let response = self.response_for(&input);
        let items: Vec<Result<String>> = response
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
