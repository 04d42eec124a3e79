//! Administration endpoints (catalog, accounts, borrow records)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        borrow::UpdateBorrowStatus,
        user::{UpdateUserRole, UpdateUserStatus, UserQuery},
        Book, BookForm, BorrowRecord, BorrowRecordDetails, ListQuery, Paginated, User, UserWithBorrows,
    },
};

use super::{ok, ActionResponse, AdminUser};

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/admin/books",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = BookForm,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Json(form): Json<BookForm>,
) -> AppResult<(StatusCode, Json<ActionResponse<Book>>)> {
    let book = state.services.catalog.create_book(form).await?;
    Ok((StatusCode::CREATED, ok(book)))
}

/// Edit a book; copies on loan stay out of the available count
#[utoipa::path(
    put,
    path = "/admin/books/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = BookForm,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(form): Json<BookForm>,
) -> AppResult<Json<ActionResponse<Book>>> {
    let book = state.services.catalog.update_book(id, form).await?;
    Ok(ok(book))
}

/// Delete a book without borrow records
#[utoipa::path(
    delete,
    path = "/admin/books/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has borrow records", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActionResponse<()>>> {
    state.services.catalog.delete_book(id).await?;
    Ok(ok(()))
}

/// List and search users
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Matching users", body = Paginated<UserWithBorrows>),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<ActionResponse<Paginated<UserWithBorrows>>>> {
    let page = state.services.users.search(&query).await?;
    Ok(ok(page))
}

/// Approve or reject an account
#[utoipa::path(
    put,
    path = "/admin/users/{id}/status",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserStatus,
    responses(
        (status = 200, description = "Status updated", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user_status(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserStatus>,
) -> AppResult<Json<ActionResponse<User>>> {
    let user = state.services.users.update_status(id, body.status).await?;
    Ok(ok(user))
}

/// Change a user's role
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRole,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user_role(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRole>,
) -> AppResult<Json<ActionResponse<User>>> {
    let user = state.services.users.update_role(id, body.role).await?;
    Ok(ok(user))
}

/// Delete a user without borrow records
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "User has borrow records", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ActionResponse<()>>> {
    state.services.users.delete(id).await?;
    Ok(ok(()))
}

/// List and search borrow records
#[utoipa::path(
    get,
    path = "/admin/borrow-records",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(ListQuery),
    responses(
        (status = 200, description = "Matching borrow records", body = Paginated<BorrowRecordDetails>),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_borrow_records(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ActionResponse<Paginated<BorrowRecordDetails>>>> {
    let page = state.services.borrows.search(&query).await?;
    Ok(ok(page))
}

/// Change a borrow record's status, reconciling inventory
#[utoipa::path(
    put,
    path = "/admin/borrow-records/{id}/status",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Borrow record ID")),
    request_body = UpdateBorrowStatus,
    responses(
        (status = 200, description = "Status updated", body = BorrowRecord),
        (status = 404, description = "Borrow record not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book is not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_borrow_status(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBorrowStatus>,
) -> AppResult<Json<ActionResponse<BorrowRecord>>> {
    let record = state
        .services
        .borrows
        .update_status(id, body.status, Utc::now().date_naive())
        .await?;
    Ok(ok(record))
}
