use crate::auth::Role;
use crate::db::*;
use crate::error::{AppError, Result};
use crate::library::{BookInput, ProgressState, ReadingStatus};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

const BOOK_COLUMNS: &str =
    "id, title, author, year, description, cover_url, pdf_url, created_at, updated_at";

const PROGRESS_COLUMNS: &str =
    "id, user_id, book_id, status, progress, current_page, total_pages, updated_at";

const USER_BOOK_QUERY: &str = "SELECT b.id, b.title, b.author, b.year, b.cover_url,
        p.status, p.progress, p.current_page, p.total_pages, p.updated_at
     FROM reading_progress p
     JOIN books b ON b.id = p.book_id";

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                created_at INTEGER NOT NULL
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                year INTEGER NOT NULL,
                description TEXT,
                cover_url TEXT,
                pdf_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Reading progress table (one row per user and book)
            CREATE TABLE IF NOT EXISTS reading_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'Not started',
                progress INTEGER NOT NULL DEFAULT 0,
                current_page INTEGER NOT NULL DEFAULT 0,
                total_pages INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                UNIQUE (user_id, book_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);
            CREATE INDEX IF NOT EXISTS idx_progress_user ON reading_progress(user_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (name, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.name,
                user.email,
                user.password_hash,
                user.role,
                now_timestamp(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEmail
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;

        let id = conn.last_insert_rowid();
        Self::query_user(&conn, "id", &id)?
            .ok_or_else(|| AppError::Internal("Created user vanished".to_string()))
    }

    /// Get user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        Self::query_user(&conn, "email", &email)
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        Self::query_user(&conn, "id", &id)
    }

    fn query_user(conn: &Connection, column: &str, value: &dyn ToSql) -> Result<Option<User>> {
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
            [value],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update name and email of a user, and the password hash when given.
    pub fn update_user_profile(
        &self,
        id: i64,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users
                 SET name = ?1, email = ?2, password_hash = COALESCE(?3, password_hash)
                 WHERE id = ?4",
                params![name, email, password_hash, id],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::DuplicateEmail
                } else {
                    AppError::Internal(format!("Failed to update user: {}", e))
                }
            })?;
        Ok(rows > 0)
    }

    /// Update user password by ID.
    pub fn update_user_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete user. Their progress records go with them.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a book.
    pub fn create_book(&self, book: &BookInput) -> Result<Book> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO books
             (title, author, year, description, cover_url, pdf_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                book.title,
                book.author,
                book.year,
                book.description,
                book.cover_url,
                book.pdf_url,
                now,
                now,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create book: {}", e)))?;

        let id = conn.last_insert_rowid();
        Self::query_book(&conn, id)?
            .ok_or_else(|| AppError::Internal("Created book vanished".to_string()))
    }

    /// Replace the fields of a book. Returns `None` if it does not exist.
    pub fn update_book(&self, id: i64, book: &BookInput) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET title = ?1, author = ?2, year = ?3, description = ?4,
                    cover_url = ?5, pdf_url = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    book.title,
                    book.author,
                    book.year,
                    book.description,
                    book.cover_url,
                    book.pdf_url,
                    now_timestamp(),
                    id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update book: {}", e)))?;

        if rows == 0 {
            return Ok(None);
        }
        Self::query_book(&conn, id)
    }

    /// Get book by ID.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        Self::query_book(&conn, id)
    }

    fn query_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
        conn.query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
            params![id],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// Find a book by exact title.
    pub fn find_book_by_title(&self, title: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE title = ?1 LIMIT 1"),
            params![title],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book by title: {}", e)))
    }

    /// List all books.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map([], Self::row_to_book)
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Delete a single book by ID.
    pub fn delete_book(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Helper to convert a row to Book.
    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            year: row.get(3)?,
            description: row.get(4)?,
            cover_url: row.get(5)?,
            pdf_url: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // ========== PROGRESS OPERATIONS ==========

    /// Insert a progress record. Fails with `AlreadyExists` if the pair is taken.
    pub fn create_progress(
        &self,
        user_id: i64,
        book_id: i64,
        state: &ProgressState,
    ) -> Result<ReadingProgress> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reading_progress
             (user_id, book_id, status, progress, current_page, total_pages, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                book_id,
                state.status,
                state.progress,
                state.current_page,
                state.total_pages,
                now_timestamp(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists("Book already in user's list".to_string())
            } else {
                AppError::Internal(format!("Failed to create progress: {}", e))
            }
        })?;

        Self::query_progress(&conn, user_id, book_id)?
            .ok_or_else(|| AppError::Internal("Created progress vanished".to_string()))
    }

    /// Get reading progress for a book.
    pub fn get_progress(&self, user_id: i64, book_id: i64) -> Result<Option<ReadingProgress>> {
        let conn = self.conn.lock();
        Self::query_progress(&conn, user_id, book_id)
    }

    fn query_progress(
        conn: &Connection,
        user_id: i64,
        book_id: i64,
    ) -> Result<Option<ReadingProgress>> {
        conn.query_row(
            &format!(
                "SELECT {PROGRESS_COLUMNS} FROM reading_progress
                 WHERE user_id = ?1 AND book_id = ?2"
            ),
            params![user_id, book_id],
            |row| {
                Ok(ReadingProgress {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    book_id: row.get(2)?,
                    state: ProgressState {
                        status: row.get(3)?,
                        progress: row.get(4)?,
                        current_page: row.get(5)?,
                        total_pages: row.get(6)?,
                    },
                    updated_at: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get progress: {}", e)))
    }

    /// Overwrite the state of an existing record. Returns `None` if absent.
    pub fn update_progress(
        &self,
        user_id: i64,
        book_id: i64,
        state: &ProgressState,
    ) -> Result<Option<ReadingProgress>> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE reading_progress
                 SET status = ?1, progress = ?2, current_page = ?3, total_pages = ?4,
                     updated_at = ?5
                 WHERE user_id = ?6 AND book_id = ?7",
                params![
                    state.status,
                    state.progress,
                    state.current_page,
                    state.total_pages,
                    now_timestamp(),
                    user_id,
                    book_id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to save progress: {}", e)))?;

        if rows == 0 {
            return Ok(None);
        }
        Self::query_progress(&conn, user_id, book_id)
    }

    /// Delete a progress record.
    pub fn delete_progress(&self, user_id: i64, book_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete progress: {}", e)))?;
        Ok(rows > 0)
    }

    /// All books on a user's list, most recently updated first.
    pub fn list_user_books(&self, user_id: i64) -> Result<Vec<UserBook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "{USER_BOOK_QUERY} WHERE p.user_id = ?1 ORDER BY p.updated_at DESC, p.id DESC"
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![user_id], Self::row_to_user_book)
            .map_err(|e| AppError::Internal(format!("Failed to list user books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect user books: {}", e)))?;

        Ok(books)
    }

    /// One book on a user's list.
    pub fn get_user_book(&self, user_id: i64, book_id: i64) -> Result<Option<UserBook>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{USER_BOOK_QUERY} WHERE p.user_id = ?1 AND p.book_id = ?2"),
            params![user_id, book_id],
            Self::row_to_user_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user book: {}", e)))
    }

    fn row_to_user_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserBook> {
        Ok(UserBook {
            book_id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            year: row.get(3)?,
            cover_url: row.get(4)?,
            state: ProgressState {
                status: row.get(5)?,
                progress: row.get(6)?,
                current_page: row.get(7)?,
                total_pages: row.get(8)?,
            },
            updated_at: row.get(9)?,
        })
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ReadingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReadingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
    }
}
