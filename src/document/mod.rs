//! Course document processing: text extraction, header parsing, lesson
//! segmentation and chunking.
//!
//! Expected layout:
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Jane Doe
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/lesson/0
//! ...lesson text...
//! ```
pub mod chunker;
pub mod reader;

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::Result;
use crate::models::{Course, CourseChunk, Lesson};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Course Title:\s*(.+)$").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Course Link:\s*(.+)$").unwrap());
static INSTRUCTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Course Instructor:\s*(.+)$").unwrap());
static LESSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Lesson\s+(\d+):\s*(.+)$").unwrap());
static LESSON_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Lesson Link:\s*(.+)$").unwrap());

/// Header lines are only looked for near the top of the file.
const HEADER_SCAN_LINES: usize = 4;

/// Turns course files into a [`Course`] and its [`CourseChunk`]s.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        chunker::chunk_text(text, self.chunk_size, self.chunk_overlap)
    }

    /// Read and parse a course file. The file name is the title fallback.
    pub fn process_course_document(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>)> {
        let content = reader::read_file(path)?;
        let fallback = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.parse_course_document(&content, &fallback))
    }

    /// Parse course text into metadata and chunks.
    pub fn parse_course_document(
        &self,
        content: &str,
        fallback_title: &str,
    ) -> (Course, Vec<CourseChunk>) {
        let lines: Vec<&str> = content.trim().lines().collect();

        let mut course = Course::new(fallback_title);
        let mut body_start = 0;

        if let Some(first) = lines.first().map(|l| l.trim()) {
            if let Some(caps) = TITLE_RE.captures(first) {
                course.title = caps[1].trim().to_string();
            } else if !first.is_empty() {
                course.title = first.to_string();
            }
            body_start = 1;
        }

        while body_start < lines.len().min(HEADER_SCAN_LINES) {
            let line = lines[body_start].trim();
            if line.is_empty() {
                body_start += 1;
            } else if let Some(caps) = LINK_RE.captures(line) {
                course.course_link = Some(caps[1].trim().to_string());
                body_start += 1;
            } else if let Some(caps) = INSTRUCTOR_RE.captures(line) {
                let name = caps[1].trim();
                if !name.eq_ignore_ascii_case("unknown") {
                    course.instructor = Some(name.to_string());
                }
                body_start += 1;
            } else {
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut current: Option<Lesson> = None;
        let mut buffer: Vec<&str> = Vec::new();

        let mut i = body_start;
        while i < lines.len() {
            let line = lines[i];
            let lesson = LESSON_RE
                .captures(line.trim())
                .and_then(|caps| Some((caps[1].parse::<u32>().ok()?, caps[2].trim().to_string())));

            if let Some((number, title)) = lesson {
                self.flush_section(&mut course, &mut chunks, current.take(), &buffer);
                buffer.clear();

                let mut lesson = Lesson {
                    lesson_number: number,
                    title,
                    lesson_link: None,
                };
                if let Some(caps) = lines
                    .get(i + 1)
                    .and_then(|next| LESSON_LINK_RE.captures(next.trim()))
                {
                    lesson.lesson_link = Some(caps[1].trim().to_string());
                    i += 1;
                }
                current = Some(lesson);
            } else {
                buffer.push(line);
            }
            i += 1;
        }
        self.flush_section(&mut course, &mut chunks, current, &buffer);

        (course, chunks)
    }

    /// Chunk the text gathered for one lesson (or for course-level text when
    /// `lesson` is `None`) and record the lesson on the course.
    fn flush_section(
        &self,
        course: &mut Course,
        chunks: &mut Vec<CourseChunk>,
        lesson: Option<Lesson>,
        lines: &[&str],
    ) {
        let text = lines.join("\n");
        let text = text.trim();

        let lesson_number = lesson.as_ref().map(|l| l.lesson_number);
        if let Some(lesson) = lesson {
            course.lessons.push(lesson);
        }
        if text.is_empty() {
            return;
        }

        for piece in self.chunk_text(text) {
            let content = match lesson_number {
                Some(n) => format!("Course {} Lesson {n} content: {piece}", course.title),
                None => piece,
            };
            chunks.push(CourseChunk {
                content,
                course_title: course.title.clone(),
                lesson_number,
                chunk_index: chunks.len(),
            });
        }
    }
}
