//! HTTP request handlers.

use crate::auth::{self, AccessToken, Identity, ProfileUpdate, Role, TokenPair};
use crate::db::{self, ReadingProgress, UserBook};
use crate::error::{AppError, Result};
use crate::library::{BookInput, PageUpdate, progress};
use crate::server::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, header},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// JSON body whose rejection is turned into an [`AppError`] by the handler,
/// after authentication has run.
type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// Root endpoint.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Library API!",
        "registration_open": state.config.auth.registration_enabled(),
    }))
}

// ============================================================================
// AUTH API
// ============================================================================

/// Signup request.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    name: String,
    email: String,
    password: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    Role::User.as_str().to_string()
}

/// Signup response.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    id: i64,
    name: String,
    email: String,
    role: Role,
    message: &'static str,
}

/// Signin request.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    email: String,
    password: String,
}

/// Refresh request.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

/// Auth signup.
pub async fn auth_signup(
    State(state): State<AppState>,
    body: JsonBody<SignupRequest>,
) -> Result<Json<SignupResponse>> {
    let Json(req) = body?;
    let user = state
        .auth
        .signup(&req.name, &req.email, &req.password, &req.role)?;

    Ok(Json(SignupResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        message: "User created",
    }))
}

/// Auth signin.
pub async fn auth_signin(
    State(state): State<AppState>,
    body: JsonBody<SigninRequest>,
) -> Result<Json<TokenPair>> {
    let Json(req) = body?;
    Ok(Json(state.auth.signin(&req.email, &req.password)?))
}

/// Exchange a refresh token for an access token.
pub async fn auth_refresh(
    State(state): State<AppState>,
    body: JsonBody<RefreshRequest>,
) -> Result<Json<AccessToken>> {
    let Json(req) = body?;
    Ok(Json(state.auth.refresh(&req.refresh_token)?))
}

// ============================================================================
// USERS API
// ============================================================================

/// Profile response.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    id: i64,
    name: String,
    email: String,
}

/// Get current user info.
pub async fn users_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let identity = authenticate(&state, &headers)?;
    Ok(Json(state.auth.current_user(&identity)?))
}

/// Update own profile.
pub async fn users_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let identity = authenticate(&state, &headers)?;
    let Json(req) = body?;
    let user = state.auth.update_profile(&identity, req)?;

    Ok(Json(ProfileResponse {
        id: user.id,
        name: user.name,
        email: user.email,
    }))
}

/// Delete own account.
pub async fn users_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>> {
    let identity = authenticate(&state, &headers)?;
    state.auth.delete_user(&identity)?;
    Ok(MessageResponse::new("User deleted"))
}

/// List all users (librarians only).
pub async fn users_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<db::User>>> {
    require_librarian(&state, &headers)?;
    Ok(Json(state.auth.list_users()?))
}

// ============================================================================
// CATALOG API
// ============================================================================

/// List all books.
pub async fn books_list(State(state): State<AppState>) -> Result<Json<Vec<db::Book>>> {
    Ok(Json(state.db.list_books()?))
}

/// Get a single book.
pub async fn book_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<db::Book>> {
    state
        .db
        .get_book(id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

/// Create a book (librarians only).
pub async fn book_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<BookInput>,
) -> Result<Json<db::Book>> {
    let identity = require_librarian(&state, &headers)?;
    let Json(req) = body?;
    let book = state.db.create_book(&req.validated()?)?;

    tracing::info!(book_id = book.id, user_id = identity.user_id, "Book created");
    Ok(Json(book))
}

/// Update a book (librarians only).
pub async fn book_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: JsonBody<BookInput>,
) -> Result<Json<db::Book>> {
    let identity = require_librarian(&state, &headers)?;
    let Json(req) = body?;
    let book = state
        .db
        .update_book(id, &req.validated()?)?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    tracing::info!(book_id = id, user_id = identity.user_id, "Book updated");
    Ok(Json(book))
}

/// Delete a book (librarians only).
pub async fn book_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let identity = require_librarian(&state, &headers)?;

    match state.db.delete_book(id) {
        Ok(true) => {
            tracing::info!(book_id = id, user_id = identity.user_id, "Book deleted");
            Ok(MessageResponse::new("Book deleted"))
        }
        Ok(false) => Err(AppError::NotFound("Book not found".to_string())),
        Err(e) => {
            tracing::error!(book_id = id, error = %e, "Failed to delete book");
            Err(AppError::Internal("Failed to delete book".to_string()))
        }
    }
}

// ============================================================================
// USER BOOKS API
// ============================================================================

/// List the caller's books with progress.
pub async fn user_books_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserBook>>> {
    let identity = authenticate(&state, &headers)?;
    Ok(Json(state.db.list_user_books(identity.user_id)?))
}

/// Get one of the caller's books.
pub async fn user_book_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
) -> Result<Json<UserBook>> {
    let identity = authenticate(&state, &headers)?;
    state
        .db
        .get_user_book(identity.user_id, book_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Book not in user's list".to_string()))
}

/// Add a book to the caller's list.
pub async fn user_book_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
) -> Result<Json<ReadingProgress>> {
    let identity = authenticate(&state, &headers)?;
    Ok(Json(progress::add(&state.db, identity.user_id, book_id)?))
}

/// Update page counters of one of the caller's books.
pub async fn user_book_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
    body: JsonBody<PageUpdate>,
) -> Result<Json<ReadingProgress>> {
    let identity = authenticate(&state, &headers)?;
    let Json(req) = body?;
    Ok(Json(progress::update(
        &state.db,
        identity.user_id,
        book_id,
        req,
    )?))
}

/// Remove a book from the caller's list.
pub async fn user_book_remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let identity = authenticate(&state, &headers)?;
    progress::remove(&state.db, identity.user_id, book_id)?;
    Ok(MessageResponse::new("Book removed from list"))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller from the bearer token.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity> {
    state.auth.resolve(extract_token(headers))
}

/// Resolve the caller and insist on the librarian role.
fn require_librarian(state: &AppState, headers: &HeaderMap) -> Result<Identity> {
    let identity = authenticate(state, headers)?;
    auth::require_role(&identity, Role::Librarian)?;
    Ok(identity)
}
