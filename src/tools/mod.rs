//! Tools the model can call during generation, and the manager that
//! dispatches them by name.
pub mod outline;
pub mod search;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::error::{RagError, Result};
use crate::models::Source;
use crate::vector_store::VectorStore;

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

/// Tool description in the shape the Messages API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// JSON schema for a tool input type, without the `$schema`/`title` keys
/// the API does not accept.
pub fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(tool: &str, input: &Value) -> Result<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| RagError::Tool(format!("invalid input for {tool}: {e}")))
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Lookup misses are reported in the returned text;
    /// errors are reserved for unusable input.
    async fn execute(&self, input: &Value) -> Result<String>;

    /// Sources recorded by the most recent `execute`.
    fn last_sources(&self) -> Vec<Source>;

    fn reset_sources(&self);
}

/// Per-tool record of the sources behind its last output.
#[derive(Debug, Default)]
pub(crate) struct SourceLog(Mutex<Vec<Source>>);

impl SourceLog {
    pub(crate) fn replace(&self, sources: Vec<Source>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = sources;
    }

    pub(crate) fn get(&self) -> Vec<Source> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Default)]
pub struct ToolManager {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with the course search and outline tools over `store`.
    #[must_use]
    pub fn with_course_tools(store: Arc<VectorStore>) -> Self {
        let mut manager = Self::new();
        manager.register(CourseSearchTool::new(Arc::clone(&store)));
        manager.register(CourseOutlineTool::new(store));
        manager
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().name;
        self.tools.retain(|t| t.definition().name != name);
        self.tools.push(Box::new(tool));
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Execute a tool by name. An unknown name is reported as text so the
    /// model can recover.
    pub async fn execute_tool(&self, name: &str, input: &Value) -> Result<String> {
        match self.tools.iter().find(|t| t.definition().name == name) {
            Some(tool) => tool.execute(input).await,
            None => Ok(format!("Tool '{name}' not found")),
        }
    }

    /// Sources from the first tool that recorded any.
    #[must_use]
    pub fn get_last_sources(&self) -> Vec<Source> {
        self.tools
            .iter()
            .map(|t| t.last_sources())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    pub fn reset_sources(&self) {
        for tool in &self.tools {
            tool.reset_sources();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
        sources: SourceLog,
    }

    impl EchoTool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                sources: SourceLog::default(),
            }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.name.to_string(),
                description: "echo".to_string(),
                input_schema: json!({"type": "object"}),
            }
        }

        async fn execute(&self, input: &Value) -> Result<String> {
            self.sources.replace(vec![Source {
                text: self.name.to_string(),
                link: None,
            }]);
            Ok(input.to_string())
        }

        fn last_sources(&self) -> Vec<Source> {
            self.sources.get()
        }

        fn reset_sources(&self) {
            self.sources.replace(Vec::new());
        }
    }

    #[tokio::test]
    async fn test_execute_known_and_unknown_tools() {
        let mut manager = ToolManager::new();
        manager.register(EchoTool::new("echo"));

        let out = manager
            .execute_tool("echo", &json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(out, r#"{"a":1}"#);

        let missing = manager.execute_tool("nope", &json!({})).await.unwrap();
        assert_eq!(missing, "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn test_sources_first_non_empty_then_reset() {
        let mut manager = ToolManager::new();
        manager.register(EchoTool::new("first"));
        manager.register(EchoTool::new("second"));
        assert!(manager.get_last_sources().is_empty());

        manager.execute_tool("second", &json!({})).await.unwrap();
        assert_eq!(manager.get_last_sources()[0].text, "second");

        manager.reset_sources();
        assert!(manager.get_last_sources().is_empty());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut manager = ToolManager::new();
        manager.register(EchoTool::new("echo"));
        manager.register(EchoTool::new("echo"));
        assert_eq!(manager.definitions().len(), 1);
    }

    #[test]
    fn test_input_schema_strips_meta_keys() {
        #[derive(JsonSchema)]
        #[allow(dead_code)]
        struct Input {
            /// The thing
            query: String,
            limit: Option<u32>,
        }

        let schema = input_schema::<Input>();
        assert_eq!(schema["type"], "object");
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["query"]["description"], "The thing");
    }
}
