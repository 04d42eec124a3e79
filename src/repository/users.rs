//! Users repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::workflow::insert_job;
use crate::{
    error::{AppError, AppResult},
    models::{
        query::SortOption,
        user::{SignUpForm, User, UserQuery, UserRole, UserStatus, UserWithBorrows},
        workflow::NewJob,
    },
    services::users::UserStore,
};

pub(crate) const USER_COLUMNS: &str = "id, fullname, email, university_id, university_card, password, \
     status, role, last_activity_date, created_at";

/// ORDER BY clause for the user listing; only creation date applies
pub fn user_order_by(sort: SortOption) -> &'static str {
    match sort {
        SortOption::Oldest => "u.created_at ASC, u.id",
        _ => "u.created_at DESC, u.id",
    }
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    /// Get user by ID
    async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if email already exists
    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Insert a new PENDING user with an already hashed password, together
    /// with its onboarding job
    async fn create(&self, form: &SignUpForm, password_hash: &str, onboarding: &NewJob) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, fullname, email, university_id, university_card, password, status, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&form.fullname)
        .bind(&form.email)
        .bind(form.university_id)
        .bind(&form.university_card)
        .bind(password_hash)
        .bind(UserStatus::Pending)
        .bind(UserRole::User)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique(e, "User already exists"))?;

        insert_job(&mut *tx, onboarding).await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Search users by name or email, with their borrow counts
    async fn search(&self, query: &UserQuery, default_limit: i64) -> AppResult<(Vec<UserWithBorrows>, i64)> {
        let list = query.list_query();
        let pagination = list.pagination(default_limit);
        let pattern = list.like_pattern();
        let order_by = user_order_by(list.sort_or(SortOption::Newest));

        let filter = "($1::text IS NULL OR u.fullname ILIKE $1 OR u.email ILIKE $1) \
                      AND ($2::text IS NULL OR u.status = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users u WHERE {}", filter))
            .bind(&pattern)
            .bind(query.status)
            .fetch_one(&self.pool)
            .await?;

        let columns = USER_COLUMNS
            .split(", ")
            .map(|c| format!("u.{}", c))
            .collect::<Vec<_>>()
            .join(", ");

        let users = sqlx::query_as::<_, UserWithBorrows>(&format!(
            r#"
            SELECT {}, COUNT(br.id) AS total_borrowed_books
            FROM users u
            LEFT JOIN borrow_records br ON br.user_id = u.id
            WHERE {}
            GROUP BY u.id
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            columns, filter, order_by
        ))
        .bind(&pattern)
        .bind(query.status)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }

    /// Set account status
    async fn update_status(&self, id: Uuid, status: UserStatus) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET status = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Set account role
    async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Record activity for `today`; returns false when already recorded
    async fn touch_activity(&self, id: Uuid, today: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET last_activity_date = $2 WHERE id = $1 AND last_activity_date IS DISTINCT FROM $2",
        )
        .bind(id)
        .bind(today)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a user; refused while borrow records reference them
    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::on_foreign_key(e, "Cannot delete this user because they have borrow records")
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}
