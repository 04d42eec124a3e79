//! Borrow records repository: borrowing, returns and listings

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use super::{books::BOOK_COLUMNS, users::USER_COLUMNS, workflow::insert_job};
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{InventoryEffect, NewBorrow, StatusChange},
        query::{ListQuery, SortOption},
        workflow::NewJob,
        Book, BorrowRecord, BorrowRecordDetails, BorrowStatus, BorrowedBook, User,
    },
    services::borrows::BorrowStore,
};

const BORROW_COLUMNS: &str =
    "id, user_id, book_id, borrow_date, due_date, return_date, status, created_at";

/// ORDER BY clause for the admin borrow record listing
pub fn borrow_order_by(sort: SortOption) -> &'static str {
    match sort {
        SortOption::Newest => "br.borrow_date DESC, br.id",
        SortOption::Oldest => "br.borrow_date ASC, br.id",
        SortOption::HighestRated => "b.rating DESC, br.borrow_date DESC, br.id",
        SortOption::Available => "b.available_copies DESC, br.borrow_date DESC, br.id",
    }
}

fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Take one copy off the shelf; false when none is left
async fn take_copy(tx: &mut Transaction<'_, Postgres>, book_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
    )
    .bind(book_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Put one copy back, never above the book's total
async fn release_copy(tx: &mut Transaction<'_, Postgres>, book_id: Uuid) -> AppResult<()> {
    sqlx::query(
        "UPDATE books SET available_copies = available_copies + 1 WHERE id = $1 AND available_copies < total_copies",
    )
    .bind(book_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn books_by_id(&self, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = ANY($1)",
            BOOK_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(books.into_iter().map(|b| (b.id, b)).collect())
    }

    async fn users_by_id(&self, ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

#[async_trait]
impl BorrowStore for BorrowsRepository {
    async fn borrower(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn insert_borrow(&self, borrow: &NewBorrow, job: &NewJob) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        if !take_copy(&mut tx, borrow.book_id).await? {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                .bind(borrow.book_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                AppError::Unavailable("Book is not available".to_string())
            } else {
                AppError::NotFound("Book not found".to_string())
            });
        }

        let record = sqlx::query_as::<_, BorrowRecord>(&format!(
            r#"
            INSERT INTO borrow_records (id, user_id, book_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            BORROW_COLUMNS
        ))
        .bind(borrow.id)
        .bind(borrow.user_id)
        .bind(borrow.book_id)
        .bind(borrow.borrow_date)
        .bind(borrow.due_date)
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *tx)
        .await?;

        insert_job(&mut *tx, job).await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn change_status(&self, id: Uuid, to: BorrowStatus, today: NaiveDate) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, BorrowRecord>(&format!(
            "SELECT {} FROM borrow_records WHERE id = $1 FOR UPDATE",
            BORROW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Borrow record not found".to_string()))?;

        let change = StatusChange::plan(current.status, to, today);

        match change.inventory {
            InventoryEffect::Release => release_copy(&mut tx, current.book_id).await?,
            InventoryEffect::Reclaim => {
                if !take_copy(&mut tx, current.book_id).await? {
                    return Err(AppError::Unavailable("Book is not available".to_string()));
                }
            }
            InventoryEffect::Unchanged => {}
        }

        let record = sqlx::query_as::<_, BorrowRecord>(&format!(
            "UPDATE borrow_records SET status = $2, return_date = $3 WHERE id = $1 RETURNING {}",
            BORROW_COLUMNS
        ))
        .bind(id)
        .bind(change.status)
        .bind(change.return_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn latest_status(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BorrowStatus>> {
        let status = sqlx::query_scalar::<_, BorrowStatus>(
            r#"
            SELECT status FROM borrow_records
            WHERE user_id = $1 AND book_id = $2
            ORDER BY borrow_date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn record_status(&self, id: Uuid) -> AppResult<Option<BorrowStatus>> {
        let status = sqlx::query_scalar::<_, BorrowStatus>("SELECT status FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(status)
    }

    /// Every record of a user with its book, newest borrow first
    async fn borrowed_books(&self, user_id: Uuid) -> AppResult<Vec<BorrowedBook>> {
        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            "SELECT {} FROM borrow_records WHERE user_id = $1 ORDER BY borrow_date DESC, id",
            BORROW_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let books = self
            .books_by_id(records.iter().map(|r| r.book_id).collect())
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|borrow| {
                let book = books.get(&borrow.book_id)?.clone();
                Some(BorrowedBook { book, borrow })
            })
            .collect())
    }

    /// Search borrow records by book title, genre or borrower name
    async fn search(
        &self,
        query: &ListQuery,
        default_limit: i64,
    ) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        let pagination = query.pagination(default_limit);
        let pattern = query.like_pattern();
        let order_by = borrow_order_by(query.sort_or(SortOption::Available));

        let from = "FROM borrow_records br \
                    JOIN books b ON b.id = br.book_id \
                    JOIN users u ON u.id = br.user_id \
                    WHERE ($1::text IS NULL OR b.title ILIKE $1 OR b.genre ILIKE $1 OR u.fullname ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", from))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let records = sqlx::query_as::<_, BorrowRecord>(&format!(
            "SELECT {} {} ORDER BY {} LIMIT $2 OFFSET $3",
            prefixed(BORROW_COLUMNS, "br"),
            from,
            order_by
        ))
        .bind(&pattern)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let books = self
            .books_by_id(records.iter().map(|r| r.book_id).collect())
            .await?;
        let users = self
            .users_by_id(records.iter().map(|r| r.user_id).collect())
            .await?;

        let details = records
            .into_iter()
            .filter_map(|borrow| {
                Some(BorrowRecordDetails {
                    book: books.get(&borrow.book_id)?.clone(),
                    user: users.get(&borrow.user_id)?.clone(),
                    borrow,
                })
            })
            .collect();

        Ok((details, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrow_order_default_is_available_copies() {
        let sort = ListQuery::default().sort_or(SortOption::Available);
        assert!(borrow_order_by(sort).starts_with("b.available_copies DESC"));
        assert!(borrow_order_by(SortOption::Newest).starts_with("br.borrow_date DESC"));
        assert!(borrow_order_by(SortOption::HighestRated).starts_with("b.rating DESC"));
    }

    #[test]
    fn test_prefixed_columns() {
        assert_eq!(prefixed("id, status", "br"), "br.id, br.status");
    }
}
