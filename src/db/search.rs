use super::{Db, serialize_vector};
use rusqlite::Result;
use rusqlite::types::Value;

/// Restricts a chunk search to one course and/or lesson.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkFilter<'a> {
    pub course_title: Option<&'a str>,
    pub lesson_number: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: usize,
    pub distance: f64,
}

fn map_hit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkHit> {
    Ok(ChunkHit {
        content: row.get(0)?,
        course_title: row.get(1)?,
        lesson_number: row
            .get::<_, Option<i64>>(2)?
            .and_then(|n| u32::try_from(n).ok()),
        chunk_index: row.get::<_, i64>(3)? as usize,
        distance: row.get(4)?,
    })
}

impl Db {
    /// Chunks nearest to `query_vector` by cosine distance, optionally filtered.
    pub fn search_chunks(
        &self,
        query_vector: &[f32],
        filter: ChunkFilter<'_>,
        limit: usize,
    ) -> Result<Vec<ChunkHit>> {
        let mut query = String::from(
            r#"
            SELECT
                c.content,
                co.title,
                c.lesson_number,
                c.chunk_index,
                vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN courses co ON c.course_id = co.id
            "#,
        );

        let mut where_clauses = Vec::new();
        let mut params: Vec<Value> = vec![Value::Blob(serialize_vector(query_vector))];

        if let Some(title) = filter.course_title {
            where_clauses.push("co.title = ?");
            params.push(Value::Text(title.to_string()));
        }
        if let Some(n) = filter.lesson_number {
            where_clauses.push("c.lesson_number = ?");
            params.push(Value::Integer(i64::from(n)));
        }

        if !where_clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&where_clauses.join(" AND "));
        }

        query.push_str(" ORDER BY distance ASC LIMIT ?");
        params.push(Value::Integer(limit as i64));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_hit_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}
