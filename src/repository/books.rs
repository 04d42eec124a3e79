//! Books repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{recompute_available, Book, BookForm},
        query::{ListQuery, SortOption},
    },
};

pub(crate) const BOOK_COLUMNS: &str = "id, title, author, genre, rating, total_copies, available_copies, \
     description, cover_color, cover_url, video_url, summary, created_at";

/// ORDER BY clause for a book listing
pub fn book_order_by(sort: SortOption) -> &'static str {
    match sort {
        SortOption::Newest => "created_at DESC, id",
        SortOption::Oldest => "created_at ASC, id",
        SortOption::HighestRated => "rating DESC, id",
        SortOption::Available => "total_copies DESC, id",
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Search books by title, author or genre with pagination
    pub async fn search(&self, query: &ListQuery, default_limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let pagination = query.pagination(default_limit);
        let pattern = query.like_pattern();
        let order_by = book_order_by(query.sort_or(SortOption::Available));

        let filter = "($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR genre ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books WHERE {}", filter))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE {} ORDER BY {} LIMIT $2 OFFSET $3",
            BOOK_COLUMNS, filter, order_by
        ))
        .bind(&pattern)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Other books to suggest next to `id`
    pub async fn similar(&self, id: Uuid, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            r#"
            SELECT {} FROM books
            WHERE id != $1
            ORDER BY (genre = (SELECT genre FROM books WHERE id = $1)) DESC, created_at DESC
            LIMIT $2
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Create a new book; every copy starts on the shelf
    pub async fn create(&self, form: &BookForm) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (
                id, title, author, genre, rating, total_copies, available_copies,
                description, cover_color, cover_url, video_url, summary
            ) VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&form.title)
        .bind(&form.author)
        .bind(&form.genre)
        .bind(form.rating)
        .bind(form.total_copies)
        .bind(&form.description)
        .bind(&form.cover_color)
        .bind(&form.cover_url)
        .bind(&form.video_url)
        .bind(&form.summary)
        .fetch_one(&self.pool)
        .await?;

        Ok(book)
    }

    /// Update a book, keeping copies on loan out of the available count
    pub async fn update(&self, id: Uuid, form: &BookForm) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let (total, available): (i32, i32) = sqlx::query_as(
            "SELECT total_copies, available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        let new_available = recompute_available(total, available, form.total_copies)?;

        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books SET
                title = $2, author = $3, genre = $4, rating = $5,
                total_copies = $6, available_copies = $7, description = $8,
                cover_color = $9, cover_url = $10, video_url = $11, summary = $12
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&form.title)
        .bind(&form.author)
        .bind(&form.genre)
        .bind(form.rating)
        .bind(form.total_copies)
        .bind(new_available)
        .bind(&form.description)
        .bind(&form.cover_color)
        .bind(&form.cover_url)
        .bind(&form.video_url)
        .bind(&form.summary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book; refused while borrow records reference it
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::on_foreign_key(e, "Cannot delete this book because it has borrow records")
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_is_total_copies() {
        let sort = ListQuery::default().sort_or(SortOption::Available);
        assert!(book_order_by(sort).starts_with("total_copies DESC"));
    }

    #[test]
    fn test_order_by_mapping() {
        assert!(book_order_by(SortOption::Newest).starts_with("created_at DESC"));
        assert!(book_order_by(SortOption::Oldest).starts_with("created_at ASC"));
        assert!(book_order_by(SortOption::HighestRated).starts_with("rating DESC"));
    }
}
