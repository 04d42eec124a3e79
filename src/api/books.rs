//! Catalog and borrowing endpoints for signed-in users

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, BorrowRecord, BorrowedBook, ListQuery, Paginated},
};

use super::{ok, ActionResponse, AuthenticatedUser};

/// Search the catalog
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(ListQuery),
    responses(
        (status = 200, description = "Matching books", body = Paginated<Book>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ActionResponse<Paginated<Book>>>> {
    let page = state.services.catalog.search_books(&query).await?;
    Ok(ok(page))
}

/// Book details
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActionResponse<Book>>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(ok(book))
}

/// Other books to suggest next to a book
#[utoipa::path(
    get,
    path = "/books/{id}/similar",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Similar books", body = [Book]),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn similar_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActionResponse<Vec<Book>>>> {
    let books = state.services.catalog.similar_books(id).await?;
    Ok(ok(books))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecord),
        (status = 403, description = "Account is not approved", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ActionResponse<BorrowRecord>>)> {
    let record = state
        .services
        .borrows
        .borrow(claims.user_id(), id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, ok(record)))
}

/// Books borrowed by the current user, newest first
#[utoipa::path(
    get,
    path = "/me/borrowed-books",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrowed books", body = [BorrowedBook]),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_borrowed_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ActionResponse<Vec<BorrowedBook>>>> {
    let books = state.services.borrows.borrowed_books(claims.user_id()).await?;
    Ok(ok(books))
}
