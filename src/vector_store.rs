//! Semantic course store: embeds text and delegates persistence to [`Db`].
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};

use crate::db::Db;
use crate::db::search::ChunkFilter;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::models::{Course, CourseChunk};

/// Title matches weaker than this cosine similarity do not resolve a course.
const MIN_TITLE_SIMILARITY: f64 = 0.05;

/// Where a retrieved chunk came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
    pub chunk_index: Option<usize>,
}

/// Parallel vectors of retrieved chunk text, metadata and distance.
///
/// `error` carries a user-facing message when the search could not run,
/// e.g. because the course filter matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f64>,
    pub error: Option<String>,
}

impl SearchResults {
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata)> {
        self.documents
            .iter()
            .map(String::as_str)
            .zip(&self.metadata)
    }
}

pub struct VectorStore {
    db: Arc<TokioMutex<Db>>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
}

impl VectorStore {
    pub fn new(db: Arc<TokioMutex<Db>>, embedder: Arc<dyn Embedder>, max_results: usize) -> Self {
        Self {
            db,
            embedder,
            max_results,
        }
    }

    #[must_use]
    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Semantic chunk search, optionally scoped to a course and lesson.
    ///
    /// A course name that resolves to nothing yields
    /// `SearchResults::empty("No course found matching '{name}'")`.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => {
                    return Ok(SearchResults::empty(format!(
                        "No course found matching '{name}'"
                    )));
                }
            },
            None => None,
        };

        let query_vector = self.embedder.embed(query)?;
        let filter = ChunkFilter {
            course_title: course_title.as_deref(),
            lesson_number,
        };
        let limit = limit.unwrap_or(self.max_results);

        let hits = {
            let db = self.db.lock().await;
            db.search_chunks(&query_vector, filter, limit)?
        };
        debug!(
            "search {query:?} (course={course_title:?}, lesson={lesson_number:?}) -> {} hits",
            hits.len()
        );

        let mut results = SearchResults::default();
        for hit in hits {
            results.documents.push(hit.content);
            results.metadata.push(ChunkMetadata {
                course_title: Some(hit.course_title),
                lesson_number: hit.lesson_number,
                chunk_index: Some(hit.chunk_index),
            });
            results.distances.push(hit.distance);
        }
        Ok(results)
    }

    /// Map a user-supplied course name to a stored title.
    ///
    /// Tries an exact then substring match (case-insensitive) before falling
    /// back to the most similar title embedding.
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        if let Some(title) = self.db.lock().await.find_course_by_name(name)? {
            return Ok(Some(title));
        }
        if name.trim().is_empty() {
            return Ok(None);
        }

        let name_vector = self.embedder.embed(name)?;
        let nearest = self.db.lock().await.nearest_course(&name_vector)?;
        Ok(nearest.and_then(|(title, distance)| {
            debug!("nearest course to {name:?}: {title:?} (distance {distance:.3})");
            (1.0 - distance >= MIN_TITLE_SIMILARITY).then_some(title)
        }))
    }

    /// Store course metadata and its title embedding.
    pub async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        let title_vector = self.embedder.embed(&course.title)?;
        self.db
            .lock()
            .await
            .upsert_course(course, &title_vector)?;
        Ok(())
    }

    /// Embed and store chunks; returns how many were stored.
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let stored = self.db.lock().await.insert_chunks(chunks, &vectors)?;
        Ok(stored)
    }

    /// Store a course and its chunks, replacing any course with the same
    /// title. Everything is embedded before the database is touched, and the
    /// write is a single transaction.
    pub async fn replace_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<usize> {
        let title_vector = self.embedder.embed(&course.title)?;
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
            self.embedder.embed_batch(&texts)?
        };
        let stored = self
            .db
            .lock()
            .await
            .replace_course(course, &title_vector, chunks, &vectors)?;
        Ok(stored)
    }

    pub async fn delete_course(&self, title: &str) -> Result<bool> {
        Ok(self.db.lock().await.delete_course(title)?)
    }

    pub async fn clear_all_data(&self) -> Result<()> {
        self.db.lock().await.clear_all_data()?;
        info!("Cleared all course data");
        Ok(())
    }

    pub async fn get_existing_course_titles(&self) -> Result<Vec<String>> {
        Ok(self.db.lock().await.course_titles()?)
    }

    pub async fn get_course_count(&self) -> Result<usize> {
        Ok(self.db.lock().await.course_count()?)
    }

    pub async fn get_all_courses_metadata(&self) -> Result<Vec<Course>> {
        Ok(self.db.lock().await.all_courses()?)
    }

    pub async fn get_course_link(&self, course_title: &str) -> Result<Option<String>> {
        Ok(self.db.lock().await.course_link(course_title)?)
    }

    pub async fn get_lesson_link(
        &self,
        course_title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>> {
        Ok(self.db.lock().await.lesson_link(course_title, lesson_number)?)
    }

    /// Resolve `course_name` and load the full course with its lessons.
    pub async fn get_course(&self, course_name: &str) -> Result<Option<Course>> {
        match self.resolve_course_name(course_name).await? {
            Some(title) => Ok(self.db.lock().await.course_by_title(&title)?),
            None => Ok(None),
        }
    }
}
