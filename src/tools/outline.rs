use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{SourceLog, Tool, ToolDefinition, input_schema, parse_input};
use crate::error::Result;
use crate::models::{Course, Source};
use crate::vector_store::VectorStore;

pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CourseOutlineInput {
    /// Course title (partial matches work, e.g. 'MCP', 'Introduction')
    pub course_name: String,
}

/// Course title, link, instructor and numbered lesson list.
pub struct CourseOutlineTool {
    store: Arc<VectorStore>,
    sources: SourceLog,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self {
            store,
            sources: SourceLog::default(),
        }
    }
}

fn format_outline(course: &Course) -> String {
    let mut out = format!("Course Title: {}", course.title);
    if let Some(link) = &course.course_link {
        let _ = write!(out, "\nCourse Link: {link}");
    }
    if let Some(instructor) = &course.instructor {
        let _ = write!(out, "\nCourse Instructor: {instructor}");
    }

    let _ = write!(out, "\n\nLessons ({} total):", course.lessons.len());
    for lesson in &course.lessons {
        let _ = write!(out, "\nLesson {}: {}", lesson.lesson_number, lesson.title);
    }
    out
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OUTLINE_TOOL_NAME.to_string(),
            description: "Get the complete outline of a course: title, link, instructor and every lesson with its number and title"
                .to_string(),
            input_schema: input_schema::<CourseOutlineInput>(),
        }
    }

    async fn execute(&self, input: &Value) -> Result<String> {
        let input: CourseOutlineInput = parse_input(OUTLINE_TOOL_NAME, input)?;

        let course = match self.store.get_course(&input.course_name).await {
            Ok(Some(course)) => course,
            Ok(None) => {
                return Ok(format!(
                    "No course found matching '{}'",
                    input.course_name
                ));
            }
            Err(e) => return Ok(format!("Outline lookup failed: {e}")),
        };

        self.sources.replace(vec![Source {
            text: course.title.clone(),
            link: course.course_link.clone(),
        }]);
        Ok(format_outline(&course))
    }

    fn last_sources(&self) -> Vec<Source> {
        self.sources.get()
    }

    fn reset_sources(&self) {
        self.sources.replace(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::tests::sample_store;
    use serde_json::json;

    #[tokio::test]
    async fn test_outline_for_partial_name() {
        let tool = CourseOutlineTool::new(Arc::new(sample_store().await));
        let out = tool
            .execute(&json!({"course_name": "computer use"}))
            .await
            .unwrap();

        assert_eq!(
            out,
            "Course Title: Building Towards Computer Use with Anthropic\n\
             Course Link: https://example.com/computer-use\n\
             Course Instructor: Colt Steele\n\
             \n\
             Lessons (2 total):\n\
             Lesson 0: Introduction\n\
             Lesson 1: API Basics"
        );

        let sources = tool.last_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(
            sources[0].link.as_deref(),
            Some("https://example.com/computer-use")
        );
    }

    #[tokio::test]
    async fn test_outline_without_optional_fields() {
        let tool = CourseOutlineTool::new(Arc::new(sample_store().await));
        let out = tool
            .execute(&json!({"course_name": "Prompt Compression and Caching"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Course Title: Prompt Compression and Caching\n\nLessons (0 total):"
        );
    }

    #[tokio::test]
    async fn test_outline_unknown_course() {
        let tool = CourseOutlineTool::new(Arc::new(sample_store().await));
        let out = tool
            .execute(&json!({"course_name": "Kubernetes Deep Dive"}))
            .await
            .unwrap();
        assert_eq!(out, "No course found matching 'Kubernetes Deep Dive'");
        assert!(tool.last_sources().is_empty());
    }

    #[test]
    fn test_definition() {
        let schema = input_schema::<CourseOutlineInput>();
        assert_eq!(schema["required"], json!(["course_name"]));
    }
}
