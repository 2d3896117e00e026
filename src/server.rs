//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(handlers::auth_signup))
        .route("/signin", post(handlers::auth_signin))
        .route("/refresh", post(handlers::auth_refresh));

    let user_routes = Router::new()
        .route("/me", get(handlers::users_me))
        .route("/update", put(handlers::users_update))
        .route("/delete", delete(handlers::users_delete));

    Router::new()
        .route("/", get(handlers::index))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .route("/users", get(handlers::users_list))
        .route("/users/", get(handlers::users_list))
        // Catalog
        .route(
            "/books",
            get(handlers::books_list).post(handlers::book_create),
        )
        .route(
            "/books/",
            get(handlers::books_list).post(handlers::book_create),
        )
        // Reading list; static segments win over `/books/{id}`
        .route("/books/user-books", get(handlers::user_books_list))
        .route(
            "/books/user-books/{book_id}",
            get(handlers::user_book_get)
                .post(handlers::user_book_add)
                .put(handlers::user_book_update)
                .delete(handlers::user_book_remove),
        )
        .route(
            "/books/{id}",
            get(handlers::book_get)
                .put(handlers::book_update)
                .delete(handlers::book_delete),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
