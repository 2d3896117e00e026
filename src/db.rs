mod schema;

pub use schema::Database;

use crate::auth::Role;
use crate::library::ProgressState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Email used for login (stored lower-cased).
    pub email: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role.
    pub role: Role,
    /// Account creation timestamp.
    pub created_at: i64,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Argon2 password hash.
    pub password_hash: String,
    /// User role.
    pub role: Role,
}

/// Catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Book ID.
    pub id: i64,
    /// Book title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Publication year.
    pub year: i32,
    /// Summary.
    pub description: Option<String>,
    /// Cover image link.
    pub cover_url: Option<String>,
    /// Link to a readable copy.
    pub pdf_url: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Reading progress of one user on one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingProgress {
    /// Progress ID.
    pub id: i64,
    /// User ID.
    pub user_id: i64,
    /// Book ID.
    pub book_id: i64,
    /// Page counters and derived status.
    #[serde(flatten)]
    pub state: ProgressState,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// A progress record joined with the book it refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBook {
    /// Book ID.
    pub book_id: i64,
    /// Book title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Publication year.
    pub year: i32,
    /// Cover image link.
    pub cover_url: Option<String>,
    /// Page counters and derived status.
    #[serde(flatten)]
    pub state: ProgressState,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
