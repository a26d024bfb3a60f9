//! Job repository: row-level access to the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub original_path: String,
    pub output_path: Option<String>,
    pub source_language: Option<String>,
    pub target_language: String,
    pub status: String,
    pub progress: i64,
    pub message: String,
    pub file_size: i64,
    pub duration: Option<f64>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub extra_data: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            original_path: row.get("original_path")?,
            output_path: row.get("output_path")?,
            source_language: row.get("source_language")?,
            target_language: row.get("target_language")?,
            status: row.get("status")?,
            progress: row.get("progress")?,
            message: row.get("message")?,
            file_size: row.get("file_size")?,
            duration: row.get("duration")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
            extra_data: row.get("extra_data")?,
        })
    }
}

const COLUMNS: &str = "id, filename, original_path, output_path, source_language, \
     target_language, status, progress, message, file_size, duration, created_at, \
     completed_at, extra_data";

/// Inserts a new job row. Fails if the id already exists.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO jobs ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                job.id,
                job.filename,
                job.original_path,
                job.output_path,
                job.source_language,
                job.target_language,
                job.status,
                job.progress,
                job.message,
                job.file_size,
                job.duration,
                job.created_at,
                job.completed_at,
                job.extra_data,
            ],
        )?;
        Ok(())
    })
}

/// Inserts the row, or overwrites every mutable column if the id exists.
///
/// `id`, `filename`, `original_path`, `target_language` and `created_at`
/// are fixed at creation and never rewritten.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO jobs ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO UPDATE SET
                    output_path = excluded.output_path,
                    source_language = excluded.source_language,
                    status = excluded.status,
                    progress = excluded.progress,
                    message = excluded.message,
                    file_size = excluded.file_size,
                    duration = excluded.duration,
                    completed_at = excluded.completed_at,
                    extra_data = excluded.extra_data"
            ),
            params![
                job.id,
                job.filename,
                job.original_path,
                job.output_path,
                job.source_language,
                job.target_language,
                job.status,
                job.progress,
                job.message,
                job.file_size,
                job.duration,
                job.created_at,
                job.completed_at,
                job.extra_data,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM jobs WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns up to `limit` rows, newest first.
pub fn list_recent(db: &Database, limit: usize) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns every row whose status is not one of the terminal ones.
pub fn find_unfinished(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM jobs WHERE status NOT IN ('completed', 'error')
             ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns rows created strictly before `cutoff` (an RFC 3339 timestamp).
pub fn find_created_before(db: &Database, cutoff: &str) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM jobs WHERE created_at < ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map(params![cutoff], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a row. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}
