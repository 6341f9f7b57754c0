//! Language-model access: Messages API types, the HTTP client, and the
//! tool-using answer generator.
pub mod anthropic;
pub mod generator;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{MessagesRequest, MessagesResponse};

pub use anthropic::AnthropicClient;
pub use generator::AiGenerator;

/// One call to a Messages-compatible endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::*;
    use crate::error::RagError;
    use crate::llm::types::{ContentBlock, StopReason};

    /// Replays canned responses and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        responses: Mutex<VecDeque<Result<MessagesResponse>>>,
        pub(crate) requests: Mutex<Vec<MessagesRequest>>,
    }

    impl ScriptedClient {
        pub(crate) fn new(responses: Vec<Result<MessagesResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }

        pub(crate) fn requests(&self) -> Vec<MessagesRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RagError::InvalidResponse("script exhausted".into())))
        }
    }

    pub(crate) fn text_response(text: &str) -> MessagesResponse {
        MessagesResponse {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: Some(StopReason::EndTurn),
            ..MessagesResponse::default()
        }
    }

    pub(crate) fn tool_use_response(id: &str, name: &str, input: Value) -> MessagesResponse {
        MessagesResponse {
            content: vec![ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
            stop_reason: Some(StopReason::ToolUse),
            ..MessagesResponse::default()
        }
    }
}
