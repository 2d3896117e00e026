//! libris: a small library-management backend.
//!
//! Users sign up and sign in to receive signed, stateless access and refresh
//! tokens. Librarians curate a book catalog; every user keeps a reading list
//! with per-book page counters from which a reading status and completion
//! percentage are derived.
//!
//! # Features
//!
//! - Email/password accounts with Argon2 hashing
//! - HS256 access and refresh tokens
//! - Role-gated catalog management
//! - Reading progress tracking
//! - SQLite storage

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Catalog and reading progress logic.
pub mod library;
/// HTTP server.
pub mod server;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
