//! Workflow job storage: claiming, step log and state transitions

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgExecutor, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::workflow::{JobStatus, NewJob, WorkflowJob},
};

const JOB_COLUMNS: &str = "id, kind, payload, step, status, next_run_at, locked_until, attempts, \
     last_error, created_at, updated_at";

/// Insert a job on any executor, so it can join the caller's transaction
pub async fn insert_job<'e, E>(executor: E, job: &NewJob) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO workflow_jobs (id, kind, payload, step, status, next_run_at)
        VALUES ($1, $2, $3, 0, $4, $5)
        "#,
    )
    .bind(job.id)
    .bind(job.kind)
    .bind(Json(&job.payload))
    .bind(JobStatus::Pending)
    .bind(job.next_run_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Clone)]
pub struct WorkflowRepository {
    pool: Pool<Postgres>,
}

impl WorkflowRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, job: &NewJob) -> AppResult<()> {
        insert_job(&self.pool, job).await
    }

    /// Claim up to `limit` due jobs. Pending jobs whose time has come and
    /// running jobs whose lease expired are both eligible; rows locked by
    /// another runner are skipped. Reclaiming an expired lease counts as a
    /// failed attempt, since the previous runner never settled the job.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lease_secs: i64,
    ) -> AppResult<Vec<WorkflowJob>> {
        let jobs = sqlx::query_as::<_, WorkflowJob>(&format!(
            r#"
            UPDATE workflow_jobs SET
                attempts = CASE WHEN status = $4 THEN attempts + 1 ELSE attempts END,
                status = $4,
                locked_until = $1 + make_interval(secs => $3),
                updated_at = $1
            WHERE id IN (
                SELECT id FROM workflow_jobs
                WHERE (status = $5 AND next_run_at <= $1)
                   OR (status = $4 AND locked_until < $1)
                ORDER BY next_run_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .bind(lease_secs as f64)
        .bind(JobStatus::Running)
        .bind(JobStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Whether `name` was already recorded for this job
    pub async fn step_completed(&self, job_id: Uuid, name: &str) -> AppResult<bool> {
        let done: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM workflow_steps WHERE job_id = $1 AND name = $2)",
        )
        .bind(job_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(done)
    }

    /// Record a step as done; recording it twice is a no-op
    pub async fn mark_step(&self, job_id: Uuid, name: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_steps (job_id, name, completed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_id, name) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Move to `step`, sleeping until `next_run_at`
    pub async fn advance(
        &self,
        id: Uuid,
        step: i32,
        next_run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE workflow_jobs SET
                step = $2, next_run_at = $3, status = $4,
                locked_until = NULL, attempts = 0, last_error = NULL, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(step)
        .bind(next_run_at)
        .bind(JobStatus::Pending)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE workflow_jobs SET status = $2, locked_until = NULL, last_error = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(JobStatus::Completed)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put a failed step back in the queue after a backoff
    pub async fn retry(
        &self,
        id: Uuid,
        attempts: i32,
        next_run_at: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE workflow_jobs SET
                status = $2, attempts = $3, next_run_at = $4,
                last_error = $5, locked_until = NULL, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(JobStatus::Pending)
        .bind(attempts)
        .bind(next_run_at)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail(&self, id: Uuid, attempts: i32, error: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE workflow_jobs SET
                status = $2, attempts = $3, last_error = $4, locked_until = NULL, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(JobStatus::Failed)
        .bind(attempts)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
