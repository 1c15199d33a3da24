use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Row in the `news` table. `full_text` stays absent until the article body
/// has been fetched; a failed body fetch leaves it absent for good.
#[derive(Debug, Clone, FromRow)]
pub struct NewsRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub link: String,
    /// Unix seconds, UTC
    pub publish_date: i64,
    pub full_text: Option<String>,
}

/// Outcome of a dedup-checked insert. An insert that fails outright is the
/// `Err` arm of the surrounding `Result`, distinct from a duplicate skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created with this id.
    Inserted(i64),
    /// A row with the same (title, publish_date) already exists.
    AlreadyExists,
}
