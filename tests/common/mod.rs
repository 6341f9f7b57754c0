//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use coursebot::config::{Config, EmbeddingBackend};
use coursebot::db::Db;
use coursebot::embedder::mock::MockEmbedder;
use coursebot::error::{RagError, Result};
use coursebot::llm::LlmClient;
use coursebot::llm::types::{ContentBlock, MessagesRequest, MessagesResponse, StopReason};
use coursebot::rag::RagSystem;

pub const DIMS: usize = 384;

pub const COMPUTER_USE: &str = "Course Title: Building Towards Computer Use with Anthropic
Course Link: https://example.com/computer-use
Course Instructor: Colt Steele

Lesson 0: Introduction
Lesson Link: https://example.com/computer-use/0
Computer use lets the model operate a desktop through screenshots and clicks.

Lesson 1: API Basics
Lesson Link: https://example.com/computer-use/1
You make basic API requests with the messages endpoint.
";

pub const PROMPT_CACHING: &str = "Course Title: Prompt Caching
Course Instructor: Jane Doe

Lesson 1: Basics
Caching reuses prompt prefixes between requests.
";

/// LLM fake that replays queued responses and records requests.
/// Once the queue is empty it answers with plain text.
#[derive(Default)]
pub struct FakeLlm {
    responses: Mutex<VecDeque<Result<MessagesResponse>>>,
    requests: Mutex<Vec<MessagesRequest>>,
}

impl FakeLlm {
    pub fn new(responses: Vec<Result<MessagesResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text("default answer")))
    }
}

pub fn text(text: &str) -> MessagesResponse {
    MessagesResponse {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some(StopReason::EndTurn),
        ..MessagesResponse::default()
    }
}

pub fn tool_use(id: &str, name: &str, input: Value) -> MessagesResponse {
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

pub fn auth_error() -> RagError {
    RagError::Api {
        status: 401,
        kind: "authentication_error".to_string(),
        message: "invalid x-api-key".to_string(),
    }
}

pub fn mock_config() -> Config {
    let mut config = Config::default();
    config.embedding.backend = EmbeddingBackend::Mock;
    config.embedding.dimensions = DIMS;
    config
}

pub fn rag_system(llm: Arc<FakeLlm>) -> RagSystem {
    RagSystem::new(
        &mock_config(),
        Db::open_in_memory(DIMS).unwrap(),
        Arc::new(MockEmbedder::new(DIMS)),
        llm,
    )
}

pub fn rag_system_at(llm: Arc<FakeLlm>, db_path: &Path) -> RagSystem {
    RagSystem::new(
        &mock_config(),
        Db::open(db_path, DIMS).unwrap(),
        Arc::new(MockEmbedder::new(DIMS)),
        llm,
    )
}

pub fn write_docs(dir: &Path) {
    std::fs::write(dir.join("computer_use.txt"), COMPUTER_USE).unwrap();
    std::fs::write(dir.join("prompt_caching.txt"), PROMPT_CACHING).unwrap();
}
