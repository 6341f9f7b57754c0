use super::content::insert_chunks_in;
use super::{Db, serialize_vector};
use crate::models::{Course, CourseChunk, Lesson};
use rusqlite::{Connection, OptionalExtension, Result, params};

fn lesson_number_from_sql(v: i64) -> u32 {
    u32::try_from(v).unwrap_or_default()
}

fn upsert_course_in(conn: &Connection, course: &Course, title_embedding: &[f32]) -> Result<i64> {
    let course_id: i64 = conn.query_row(
        r#"
        INSERT INTO courses (title, instructor, course_link, indexed_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(title) DO UPDATE SET
            instructor = excluded.instructor,
            course_link = excluded.course_link,
            indexed_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
        params![course.title, course.instructor, course.course_link],
        |row| row.get(0),
    )?;

    conn.execute("DELETE FROM lessons WHERE course_id = ?", params![course_id])?;
    for lesson in &course.lessons {
        conn.execute(
            r#"
            INSERT INTO lessons (course_id, lesson_number, title, lesson_link)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(course_id, lesson_number) DO UPDATE SET
                title = excluded.title,
                lesson_link = excluded.lesson_link
            "#,
            params![
                course_id,
                i64::from(lesson.lesson_number),
                lesson.title,
                lesson.lesson_link
            ],
        )?;
    }

    // vec0 tables have no upsert
    conn.execute("DELETE FROM vec_courses WHERE rowid = ?", params![course_id])?;
    conn.execute(
        "INSERT INTO vec_courses (rowid, embedding) VALUES (?, ?)",
        params![course_id, serialize_vector(title_embedding)],
    )?;
    Ok(course_id)
}

fn delete_course_in(conn: &Connection, title: &str) -> Result<bool> {
    let course_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM courses WHERE title = ?",
            params![title],
            |row| row.get(0),
        )
        .optional()?;

    let Some(course_id) = course_id else {
        return Ok(false);
    };

    // Virtual table cascade deletion workaround
    conn.execute(
        "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE course_id = ?)",
        params![course_id],
    )?;
    conn.execute("DELETE FROM vec_courses WHERE rowid = ?", params![course_id])?;
    conn.execute("DELETE FROM courses WHERE id = ?", params![course_id])?;
    Ok(true)
}

impl Db {
    /// Insert or replace a course, its lessons and its title embedding.
    ///
    /// Returns the course id, which is stable across re-indexing.
    pub fn upsert_course(&mut self, course: &Course, title_embedding: &[f32]) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let course_id = upsert_course_in(&tx, course, title_embedding)?;
        tx.commit()?;
        Ok(course_id)
    }

    /// Delete a course with its lessons, chunks and vectors.
    pub fn delete_course(&mut self, title: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let deleted = delete_course_in(&tx, title)?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Swap in a freshly parsed course in one transaction: any course with
    /// the same title is removed, then the course and its chunks are stored.
    /// On error the previous course is left untouched.
    pub fn replace_course(
        &mut self,
        course: &Course,
        title_embedding: &[f32],
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        delete_course_in(&tx, &course.title)?;
        upsert_course_in(&tx, course, title_embedding)?;
        let stored = insert_chunks_in(&tx, chunks, embeddings)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Remove every course, lesson, chunk and vector.
    pub fn clear_all_data(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            BEGIN;
            DELETE FROM vec_chunks;
            DELETE FROM vec_courses;
            DELETE FROM chunks;
            DELETE FROM lessons;
            DELETE FROM courses;
            COMMIT;
            "#,
        )
    }

    /// Course titles in indexing order.
    pub fn course_titles(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT title FROM courses ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    pub fn course_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM courses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All courses with their lessons, in indexing order.
    pub fn all_courses(&self) -> Result<Vec<Course>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, instructor, course_link FROM courses ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Course {
                    title: row.get(1)?,
                    instructor: row.get(2)?,
                    course_link: row.get(3)?,
                    lessons: Vec::new(),
                },
            ))
        })?;

        let mut courses = Vec::new();
        for row in rows {
            let (id, mut course) = row?;
            course.lessons = self.lessons_for(id)?;
            courses.push(course);
        }
        Ok(courses)
    }

    /// Look up a course by its exact title.
    pub fn course_by_title(&self, title: &str) -> Result<Option<Course>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, instructor, course_link FROM courses WHERE title = ?",
                params![title],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        Course {
                            title: row.get(1)?,
                            instructor: row.get(2)?,
                            course_link: row.get(3)?,
                            lessons: Vec::new(),
                        },
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, mut course)) => {
                course.lessons = self.lessons_for(id)?;
                Ok(Some(course))
            }
            None => Ok(None),
        }
    }

    fn lessons_for(&self, course_id: i64) -> Result<Vec<Lesson>> {
        let mut stmt = self.conn.prepare(
            "SELECT lesson_number, title, lesson_link FROM lessons WHERE course_id = ? ORDER BY lesson_number",
        )?;
        let rows = stmt.query_map(params![course_id], |row| {
            Ok(Lesson {
                lesson_number: lesson_number_from_sql(row.get(0)?),
                title: row.get(1)?,
                lesson_link: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn course_link(&self, title: &str) -> Result<Option<String>> {
        let link: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT course_link FROM courses WHERE title = ?",
                params![title],
                |row| row.get(0),
            )
            .optional()?;
        Ok(link.flatten())
    }

    pub fn lesson_link(&self, title: &str, lesson_number: u32) -> Result<Option<String>> {
        let link: Option<Option<String>> = self
            .conn
            .query_row(
                r#"
                SELECT l.lesson_link
                FROM lessons l
                JOIN courses c ON l.course_id = c.id
                WHERE c.title = ? AND l.lesson_number = ?
                "#,
                params![title, i64::from(lesson_number)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(link.flatten())
    }

    /// Resolve a course name by case-insensitive exact match, then by
    /// substring (shortest matching title wins).
    ///
    /// Case folding happens in Rust since SQLite's `lower()` and `NOCASE`
    /// only fold ASCII.
    pub fn find_course_by_name(&self, name: &str) -> Result<Option<String>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let titles = self.course_titles()?;
        let folded: Vec<String> = titles.iter().map(|t| t.to_lowercase()).collect();

        if let Some(i) = folded.iter().position(|t| *t == needle) {
            return Ok(Some(titles[i].clone()));
        }

        Ok(folded
            .iter()
            .enumerate()
            .filter(|(_, t)| t.contains(&needle))
            .min_by_key(|(i, _)| (titles[*i].chars().count(), *i))
            .map(|(i, _)| titles[i].clone()))
    }

    /// The course whose title embedding is closest to `query_vector`.
    pub fn nearest_course(&self, query_vector: &[f32]) -> Result<Option<(String, f64)>> {
        self.conn
            .query_row(
                r#"
                SELECT c.title, vec_distance_cosine(v.embedding, ?) AS distance
                FROM vec_courses v
                JOIN courses c ON v.rowid = c.id
                ORDER BY distance ASC
                LIMIT 1
                "#,
                params![serialize_vector(query_vector)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_vector;

    const DIMS: usize = 8;

    fn course(title: &str, lessons: &[(u32, &str, Option<&str>)]) -> Course {
        Course {
            title: title.to_string(),
            course_link: Some(format!("https://example.com/{}", title.len())),
            instructor: Some("Colt Steele".to_string()),
            lessons: lessons
                .iter()
                .map(|&(n, t, link)| Lesson {
                    lesson_number: n,
                    title: t.to_string(),
                    lesson_link: link.map(str::to_string),
                })
                .collect(),
        }
    }

    fn seeded() -> Db {
        let mut db = Db::open_in_memory(DIMS).unwrap();
        db.upsert_course(
            &course(
                "Building Towards Computer Use",
                &[(0, "Introduction", Some("https://example.com/l0")), (1, "Setup", None)],
            ),
            &test_vector(DIMS, &[0]),
        )
        .unwrap();
        db.upsert_course(
            &course("MCP: Build Rich-Context AI Apps", &[(1, "Why MCP", None)]),
            &test_vector(DIMS, &[1]),
        )
        .unwrap();
        db
    }

    #[test]
    fn test_upsert_and_lookup() {
        let db = seeded();
        assert_eq!(db.course_count().unwrap(), 2);
        assert_eq!(
            db.course_titles().unwrap(),
            vec!["Building Towards Computer Use", "MCP: Build Rich-Context AI Apps"]
        );

        let c = db.course_by_title("Building Towards Computer Use").unwrap().unwrap();
        assert_eq!(c.instructor.as_deref(), Some("Colt Steele"));
        assert_eq!(c.lessons.len(), 2);
        assert_eq!(c.lessons[1].title, "Setup");
        assert!(db.course_by_title("Nope").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_lessons_and_keeps_id() {
        let mut db = seeded();
        let first = db
            .upsert_course(
                &course("Building Towards Computer Use", &[(5, "Only", None)]),
                &test_vector(DIMS, &[2]),
            )
            .unwrap();
        let again = db
            .upsert_course(
                &course("Building Towards Computer Use", &[(5, "Only", None)]),
                &test_vector(DIMS, &[2]),
            )
            .unwrap();
        assert_eq!(first, again);

        let c = db.course_by_title("Building Towards Computer Use").unwrap().unwrap();
        assert_eq!(c.lessons.len(), 1);
        assert_eq!(c.lessons[0].lesson_number, 5);
        assert_eq!(db.course_count().unwrap(), 2);
    }

    #[test]
    fn test_links() {
        let db = seeded();
        assert!(db.course_link("Building Towards Computer Use").unwrap().is_some());
        assert_eq!(
            db.lesson_link("Building Towards Computer Use", 0).unwrap().as_deref(),
            Some("https://example.com/l0")
        );
        assert!(db.lesson_link("Building Towards Computer Use", 1).unwrap().is_none());
        assert!(db.lesson_link("Building Towards Computer Use", 9).unwrap().is_none());
        assert!(db.course_link("Unknown").unwrap().is_none());
    }

    #[test]
    fn test_find_course_by_name() {
        let db = seeded();
        assert_eq!(
            db.find_course_by_name("building towards computer use").unwrap().as_deref(),
            Some("Building Towards Computer Use")
        );
        assert_eq!(
            db.find_course_by_name("mcp").unwrap().as_deref(),
            Some("MCP: Build Rich-Context AI Apps")
        );
        assert!(db.find_course_by_name("kubernetes").unwrap().is_none());
        assert!(db.find_course_by_name("  ").unwrap().is_none());
    }

    #[test]
    fn test_find_course_by_name_folds_non_ascii() {
        let mut db = seeded();
        db.upsert_course(
            &course("Éléments de Réseau", &[]),
            &test_vector(DIMS, &[3]),
        )
        .unwrap();

        assert_eq!(
            db.find_course_by_name("ÉLÉMENTS DE RÉSEAU").unwrap().as_deref(),
            Some("Éléments de Réseau")
        );
        assert_eq!(
            db.find_course_by_name("réseau").unwrap().as_deref(),
            Some("Éléments de Réseau")
        );
    }

    #[test]
    fn test_find_course_by_name_prefers_shortest_substring_match() {
        let mut db = seeded();
        db.upsert_course(&course("Computer Use", &[]), &test_vector(DIMS, &[4]))
            .unwrap();
        assert_eq!(
            db.find_course_by_name("computer").unwrap().as_deref(),
            Some("Computer Use")
        );
    }

    #[test]
    fn test_replace_course_swaps_chunks() {
        let mut db = seeded();
        let chunk = |content: &str, index| CourseChunk {
            content: content.to_string(),
            course_title: "Building Towards Computer Use".to_string(),
            lesson_number: Some(0),
            chunk_index: index,
        };
        db.insert_chunks(&[chunk("old", 0)], &[test_vector(DIMS, &[5])])
            .unwrap();

        let stored = db
            .replace_course(
                &course("Building Towards Computer Use", &[(0, "Intro", None)]),
                &test_vector(DIMS, &[0]),
                &[chunk("new a", 0), chunk("new b", 1)],
                &[test_vector(DIMS, &[6]), test_vector(DIMS, &[7])],
            )
            .unwrap();
        assert_eq!(stored, 2);
        assert_eq!(db.chunk_count().unwrap(), 2);
        assert_eq!(db.course_count().unwrap(), 2);
        let c = db.course_by_title("Building Towards Computer Use").unwrap().unwrap();
        assert_eq!(c.lessons.len(), 1);
    }

    #[test]
    fn test_replace_course_failure_keeps_previous_course() {
        let mut db = seeded();
        let chunk = CourseChunk {
            content: "old".to_string(),
            course_title: "Building Towards Computer Use".to_string(),
            lesson_number: Some(0),
            chunk_index: 0,
        };
        db.insert_chunks(std::slice::from_ref(&chunk), &[test_vector(DIMS, &[5])])
            .unwrap();

        // One chunk, no embeddings: the insert fails after the delete ran.
        let result = db.replace_course(
            &course("Building Towards Computer Use", &[]),
            &test_vector(DIMS, &[0]),
            &[chunk],
            &[],
        );
        assert!(result.is_err());

        assert_eq!(db.chunk_count().unwrap(), 1);
        let c = db.course_by_title("Building Towards Computer Use").unwrap().unwrap();
        assert_eq!(c.lessons.len(), 2);
    }

    #[test]
    fn test_nearest_course() {
        let db = seeded();
        let (title, distance) = db.nearest_course(&test_vector(DIMS, &[1])).unwrap().unwrap();
        assert_eq!(title, "MCP: Build Rich-Context AI Apps");
        assert!(distance < 1e-6);

        let empty = Db::open_in_memory(DIMS).unwrap();
        assert!(empty.nearest_course(&test_vector(DIMS, &[1])).unwrap().is_none());
    }

    #[test]
    fn test_delete_and_clear() {
        let mut db = seeded();
        assert!(db.delete_course("Building Towards Computer Use").unwrap());
        assert!(!db.delete_course("Building Towards Computer Use").unwrap());
        assert_eq!(db.course_count().unwrap(), 1);

        let lessons: i64 = db
            .conn
            .query_row("SELECT count(*) FROM lessons", [], |r| r.get(0))
            .unwrap();
        assert_eq!(lessons, 1);

        db.clear_all_data().unwrap();
        assert_eq!(db.course_count().unwrap(), 0);
        assert!(db.all_courses().unwrap().is_empty());
    }
}
