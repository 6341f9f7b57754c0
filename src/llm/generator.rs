use std::sync::Arc;

use tracing::{debug, warn};

use super::LlmClient;
use super::types::{ContentBlock, Message, MessagesRequest, MessagesResponse, ToolChoice};
use crate::config::Config;
use crate::error::{RagError, Result};
use crate::tools::{ToolDefinition, ToolManager};

const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in course materials and educational content with access to comprehensive search tools for course information.

Available Tools:
1. **Course Content Search** - For searching specific course materials and detailed educational content
2. **Course Outline** - For getting complete course structure, including course title, course link, and all lessons with their numbers and titles

Tool Usage Guidelines:
- **Course outline queries**: Use the course outline tool for questions about course structure, lesson lists, or complete course information
- **Course content queries**: Use the content search tool for questions about specific topics, concepts, or detailed materials within courses
- **Maximum 2 sequential tool rounds per query** - You can make additional tool calls based on previous results to provide comprehensive answers
- **Sequential reasoning**: Use results from previous tool calls to inform subsequent tool usage
- **Tool chaining**: For complex queries, you may first get course outlines, then search specific content based on that information
- Synthesize all tool results into accurate, fact-based responses
- If any tool yields no results, state this clearly without offering alternatives

Response Protocol:
- **General knowledge questions**: Answer using existing knowledge without tools
- **Complex queries**: May require multiple tool calls for comprehensive answers (max 2 rounds)
- **Course outline + content**: First get outline, then search specific content as needed
- **Comparative queries**: Use multiple searches to gather information for comparisons
- **No meta-commentary**:
 - Provide direct answers only, with no reasoning process, tool explanations, or query analysis
 - Do not mention \"based on the search results\" or \"using the tool\"

All responses must be:
1. **Brief, Concise and focused** - Get to the point quickly
2. **Educational** - Maintain instructional value
3. **Clear** - Use accessible language
4. **Example-supported** - Include relevant examples when they aid understanding
Provide only the direct answer to what was asked.
";

/// Answers a query with the model, running tool calls for up to
/// `max_rounds` sequential rounds.
pub struct AiGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_rounds: usize,
}

impl AiGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens: 800,
            temperature: 0.0,
            max_rounds: 2,
        }
    }

    pub fn from_config(client: Arc<dyn LlmClient>, config: &Config) -> Self {
        Self {
            client,
            model: config.anthropic_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_rounds: config.max_tool_rounds.max(1),
        }
    }

    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: ToolChoice,
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(system.to_string()),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            tool_choice: (!tools.is_empty()).then_some(tool_choice),
        }
    }

    /// Generate an answer for `query`.
    ///
    /// A failed first call is an error. A failed follow-up call inside the
    /// tool loop becomes the answer text `Tool execution failed in round N: ...`.
    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolManager>,
    ) -> Result<String> {
        let system = match history {
            Some(h) if !h.is_empty() => format!("{SYSTEM_PROMPT}\n\nPrevious conversation:\n{h}"),
            _ => SYSTEM_PROMPT.to_string(),
        };
        let definitions = tools.map(ToolManager::definitions).unwrap_or_default();

        let mut messages = vec![Message::user(query)];
        let mut response = self
            .client
            .create_message(&self.request(&system, &messages, &definitions, ToolChoice::Auto))
            .await?;

        let Some(manager) = tools else {
            return final_text(&response);
        };

        let mut round = 1;
        while round <= self.max_rounds && response.wants_tools() {
            let assistant: Vec<ContentBlock> = response
                .content
                .iter()
                .filter(|b| !matches!(b, ContentBlock::Other))
                .cloned()
                .collect();
            let results = execute_tools(&response, manager).await;
            messages.push(Message::assistant_blocks(assistant));
            messages.push(Message::user_blocks(results));

            // Tools stay declared so the history's tool blocks remain valid,
            // but the final round may not call them.
            let choice = if round < self.max_rounds {
                ToolChoice::Auto
            } else {
                ToolChoice::None
            };

            match self
                .client
                .create_message(&self.request(&system, &messages, &definitions, choice))
                .await
            {
                Ok(next) => {
                    response = next;
                    round += 1;
                }
                Err(e) => {
                    warn!("Model call failed in tool round {round}: {e}");
                    return Ok(format!("Tool execution failed in round {round}: {e}"));
                }
            }
        }

        final_text(&response)
    }
}

async fn execute_tools(response: &MessagesResponse, manager: &ToolManager) -> Vec<ContentBlock> {
    let mut results = Vec::new();
    for block in &response.content {
        let ContentBlock::ToolUse { id, name, input } = block else {
            continue;
        };
        debug!("Executing tool {name} ({id})");
        let (content, is_error) = match manager.execute_tool(name, input).await {
            Ok(output) => (output, None),
            Err(e) => (format!("Tool execution failed: {e}"), Some(true)),
        };
        results.push(ContentBlock::ToolResult {
            tool_use_id: id.clone(),
            content,
            is_error,
        });
    }
    results
}

fn final_text(response: &MessagesResponse) -> Result<String> {
    response
        .text()
        .ok_or_else(|| RagError::InvalidResponse("model returned no text".to_string()))
}
