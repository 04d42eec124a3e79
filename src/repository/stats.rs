//! Dashboard counters

use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::stats::{DashboardStats, WeeklyCountRow},
};

#[derive(Clone)]
pub struct StatsRepository {
    pool: Pool<Postgres>,
}

impl StatsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Total rows, and rows created in the last week and the week before
    async fn weekly_counts(&self, table: &str, now: DateTime<Utc>) -> AppResult<WeeklyCountRow> {
        let row = sqlx::query_as::<_, WeeklyCountRow>(&format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE created_at > $2) AS current_week,
                COUNT(*) FILTER (WHERE created_at > $1 AND created_at <= $2) AS previous_week
            FROM {}
            "#,
            table
        ))
        .bind(now - Duration::days(14))
        .bind(now - Duration::days(7))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> AppResult<DashboardStats> {
        Ok(DashboardStats {
            users: self.weekly_counts("users", now).await?.into(),
            books: self.weekly_counts("books", now).await?.into(),
            borrow_records: self.weekly_counts("borrow_records", now).await?.into(),
        })
    }
}
