//! Orchestrates document loading, retrieval-backed generation and sessions.
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use ignore::WalkBuilder;
use tokio::sync::Mutex as TokioMutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Db;
use crate::document::{DocumentProcessor, reader};
use crate::embedder::Embedder;
use crate::error::Result;
use crate::llm::{AiGenerator, LlmClient};
use crate::models::{Course, CourseAnalytics, Source};
use crate::session::SessionManager;
use crate::tools::ToolManager;
use crate::vector_store::VectorStore;

const INVALID_KEY_ANSWER: &str =
    "Query failed: Invalid API key. Please configure your Anthropic API key in the .env file.";

pub struct RagSystem {
    processor: DocumentProcessor,
    store: Arc<VectorStore>,
    generator: AiGenerator,
    sessions: SessionManager,
}

impl RagSystem {
    pub fn new(
        config: &Config,
        db: Db,
        embedder: Arc<dyn Embedder>,
        client: Arc<dyn LlmClient>,
    ) -> Self {
        let store = VectorStore::new(
            Arc::new(TokioMutex::new(db)),
            embedder,
            config.max_results,
        );
        Self {
            processor: DocumentProcessor::new(config.chunk_size, config.chunk_overlap),
            store: Arc::new(store),
            generator: AiGenerator::from_config(client, config),
            sessions: SessionManager::new(config.max_history),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Index one course file, replacing any course with the same title.
    pub async fn add_course_document(&self, path: &Path) -> Result<(Course, usize)> {
        let (course, chunks) = self.processor.process_course_document(path)?;
        let stored = self.store.replace_course(&course, &chunks).await?;
        info!(
            "Indexed {:?} from {} ({} lessons, {stored} chunks)",
            course.title,
            path.display(),
            course.lessons.len()
        );
        Ok((course, stored))
    }

    /// Index every supported file directly inside `folder`.
    ///
    /// Courses whose title is already stored are skipped; unreadable files are
    /// logged and skipped. Returns `(courses added, chunks added)`.
    pub async fn add_course_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<(usize, usize)> {
        if !folder.is_dir() {
            warn!("Course folder {} does not exist", folder.display());
            return Ok((0, 0));
        }

        if clear_existing {
            info!("Clearing existing data for fresh rebuild...");
            self.store.clear_all_data().await?;
        }

        let mut existing: HashSet<String> = self
            .store
            .get_existing_course_titles()
            .await?
            .into_iter()
            .collect();

        let walker = WalkBuilder::new(folder)
            .max_depth(Some(1))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut total_courses = 0;
        let mut total_chunks = 0;

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() || !reader::is_supported(path) {
                continue;
            }

            let (course, chunks) = match self.processor.process_course_document(path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Error processing {}: {e}", path.display());
                    continue;
                }
            };

            if existing.contains(&course.title) {
                info!("Course already exists: {} - skipping", course.title);
                continue;
            }

            let stored = self.store.replace_course(&course, &chunks).await?;
            info!("Added new course: {} ({stored} chunks)", course.title);

            existing.insert(course.title);
            total_courses += 1;
            total_chunks += stored;
        }

        Ok((total_courses, total_chunks))
    }

    /// Answer `query`, returning the answer text and the sources behind it.
    ///
    /// Generation failures are reported in the answer text with no sources
    /// and are not recorded in the session.
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> (String, Vec<Source>) {
        let prompt = format!("Answer this question about course materials: {query}");
        let history = session_id.and_then(|id| self.sessions.get_conversation_history(id));

        // Scoped to this query so concurrent requests never share sources.
        let tools = ToolManager::with_course_tools(Arc::clone(&self.store));

        match self
            .generator
            .generate_response(&prompt, history.as_deref(), Some(&tools))
            .await
        {
            Ok(answer) => {
                let sources = tools.get_last_sources();
                tools.reset_sources();
                if let Some(id) = session_id {
                    self.sessions.add_exchange(id, query, &answer);
                }
                (answer, sources)
            }
            Err(e) => {
                error!("Query failed: {e}");
                let answer = if e.is_auth_error() {
                    INVALID_KEY_ANSWER.to_string()
                } else {
                    format!("Query failed: {e}")
                };
                (answer, Vec::new())
            }
        }
    }

    pub async fn get_course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.store.get_existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}
