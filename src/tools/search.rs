use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{SourceLog, Tool, ToolDefinition, input_schema, parse_input};
use crate::error::Result;
use crate::models::Source;
use crate::vector_store::{SearchResults, VectorStore};

pub const SEARCH_TOOL_NAME: &str = "search_course_content";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchCourseInput {
    /// What to search for in the course content
    pub query: String,
    /// Course title (partial matches work, e.g. 'MCP', 'Introduction')
    #[serde(default)]
    pub course_name: Option<String>,
    /// Specific lesson number to search within (e.g. 1, 2, 3)
    #[serde(default)]
    pub lesson_number: Option<u32>,
}

/// Semantic search over course chunks with optional course/lesson filters.
pub struct CourseSearchTool {
    store: Arc<VectorStore>,
    sources: SourceLog,
}

impl CourseSearchTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            sources: SourceLog::default(),
        }
    }

    /// Render results as `[course - Lesson n]` blocks and record their sources.
    async fn format_results(&self, results: &SearchResults) -> String {
        let mut blocks = Vec::with_capacity(results.documents.len());
        let mut sources: Vec<Source> = Vec::new();

        for (doc, meta) in results.iter() {
            let course = meta.course_title.as_deref().unwrap_or("unknown");

            let mut label = course.to_string();
            if let Some(n) = meta.lesson_number {
                label.push_str(&format!(" - Lesson {n}"));
            }
            blocks.push(format!("[{label}]\n{doc}"));

            let link = match meta.course_title.as_deref() {
                Some(title) => self.source_link(title, meta.lesson_number).await,
                None => None,
            };
            let source = Source { text: label, link };
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        self.sources.replace(sources);
        blocks.join("\n\n")
    }

    async fn source_link(&self, course_title: &str, lesson_number: Option<u32>) -> Option<String> {
        let link = match lesson_number {
            Some(n) => self.store.get_lesson_link(course_title, n).await,
            None => self.store.get_course_link(course_title).await,
        };
        link.unwrap_or_else(|e| {
            warn!("Link lookup failed for {course_title:?}: {e}");
            None
        })
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: input_schema::<SearchCourseInput>(),
        }
    }

    async fn execute(&self, input: &Value) -> Result<String> {
        let input: SearchCourseInput = parse_input(SEARCH_TOOL_NAME, input)?;

        let results = match self
            .store
            .search(
                &input.query,
                input.course_name.as_deref(),
                input.lesson_number,
                None,
            )
            .await
        {
            Ok(results) => results,
            Err(e) => return Ok(format!("Search failed: {e}")),
        };

        if let Some(error) = results.error {
            return Ok(error);
        }

        if results.is_empty() {
            let mut msg = String::from("No relevant content found");
            if let Some(course) = &input.course_name {
                msg.push_str(&format!(" in course '{course}'"));
            }
            if let Some(n) = input.lesson_number {
                msg.push_str(&format!(" in lesson {n}"));
            }
            msg.push('.');
            return Ok(msg);
        }

        Ok(self.format_results(&results).await)
    }

    fn last_sources(&self) -> Vec<Source> {
        self.sources.get()
    }

    fn reset_sources(&self) {
        self.sources.replace(Vec::new());
    }
}
