//! Durable workflow job model
//!
//! A job is one long-running notification sequence. Its progress (`step`,
//! `next_run_at`) lives in the database so any runner can resume it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use super::borrow::NewBorrow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    BorrowReminders,
    Onboarding,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::BorrowReminders => "borrow_reminders",
            JobKind::Onboarding => "onboarding",
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "borrow_reminders" => Ok(JobKind::BorrowReminders),
            "onboarding" => Ok(JobKind::Onboarding),
            _ => Err(format!("Invalid job kind: {}", s)),
        }
    }
}

super::impl_text_enum!(JobKind);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

super::impl_text_enum!(JobStatus);

/// Persisted job row
#[derive(Debug, Clone, FromRow)]
pub struct WorkflowJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: Json<serde_json::Value>,
    /// Index of the next step to execute
    pub step: i32,
    pub status: JobStatus,
    pub next_run_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Borrow trigger body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowReminderPayload {
    pub borrow_id: Option<Uuid>,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: NaiveDate,
}

impl From<&NewBorrow> for BorrowReminderPayload {
    fn from(borrow: &NewBorrow) -> Self {
        Self {
            borrow_id: Some(borrow.id),
            user_id: borrow.user_id,
            book_id: borrow.book_id,
            borrow_date: borrow.borrow_date,
            due_date: borrow.due_date,
        }
    }
}

/// Onboarding trigger body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OnboardingPayload {
    pub email: String,
    pub fullname: String,
}

/// New job to persist
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub next_run_at: DateTime<Utc>,
}

impl NewJob {
    pub fn borrow_reminders(payload: &BorrowReminderPayload, now: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind: JobKind::BorrowReminders,
            payload: serde_json::to_value(payload)?,
            next_run_at: now,
        })
    }

    pub fn onboarding(payload: &OnboardingPayload, now: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind: JobKind::Onboarding,
            payload: serde_json::to_value(payload)?,
            next_run_at: now,
        })
    }
}

/// Result of a tick, reported to the cron caller
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct TickReport {
    pub claimed: usize,
    pub advanced: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
}
