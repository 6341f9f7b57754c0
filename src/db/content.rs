use super::{Db, serialize_vector};
use crate::models::CourseChunk;
use rusqlite::{Connection, Error, Result, params};
use std::collections::HashMap;

/// Fails with `InvalidParameterCount(embeddings, chunks)` when the two
/// slices differ in length; nothing is written in that case.
pub(super) fn insert_chunks_in(
    conn: &Connection,
    chunks: &[CourseChunk],
    embeddings: &[Vec<f32>],
) -> Result<usize> {
    if chunks.len() != embeddings.len() {
        return Err(Error::InvalidParameterCount(embeddings.len(), chunks.len()));
    }

    let mut course_ids: HashMap<&str, i64> = HashMap::new();

    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        let course_id = match course_ids.get(chunk.course_title.as_str()) {
            Some(&id) => id,
            None => {
                let id: i64 = conn.query_row(
                    r#"
                    INSERT INTO courses (title) VALUES (?)
                    ON CONFLICT(title) DO UPDATE SET title = excluded.title
                    RETURNING id
                    "#,
                    params![chunk.course_title],
                    |row| row.get(0),
                )?;
                course_ids.insert(&chunk.course_title, id);
                id
            }
        };

        conn.execute(
            "INSERT INTO chunks (course_id, lesson_number, chunk_index, content) VALUES (?, ?, ?, ?)",
            params![
                course_id,
                chunk.lesson_number.map(i64::from),
                chunk.chunk_index as i64,
                chunk.content
            ],
        )?;
        let chunk_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
            params![chunk_id, serialize_vector(embedding)],
        )?;
    }

    Ok(chunks.len())
}

impl Db {
    /// Insert chunks with their embeddings.
    ///
    /// Chunks referring to a course that was never upserted get a bare
    /// course row so they remain searchable.
    pub fn insert_chunks(
        &mut self,
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let stored = insert_chunks_in(&tx, chunks, embeddings)?;
        tx.commit()?;
        Ok(stored)
    }

    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
