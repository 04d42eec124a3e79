//! Durable notification workflows
//!
//! Every job advances one step per claim. The step index and the time the
//! next step is due are persisted, so a job survives restarts and can be
//! driven by any runner (the cron tick endpoint or the in-process poller).

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    config::WorkflowConfig,
    error::{AppError, AppResult},
    models::workflow::{
        BorrowReminderPayload, JobKind, NewJob, OnboardingPayload, TickReport, WorkflowJob,
    },
    repository::Repository,
    services::{
        borrows::BorrowsService,
        email::{EmailService, Notification},
        users::UserStore,
    },
};

/// Longest wait between two attempts of a failing step
const MAX_BACKOFF_SECS: i64 = 3600;
const BASE_BACKOFF_SECS: i64 = 30;

const ONBOARDING_FIRST_CHECK_DAYS: i64 = 3;
const ONBOARDING_CHECK_INTERVAL_DAYS: i64 = 30;

/// Borrow reminder steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStep {
    Confirmation,
    DueTomorrow,
    LastDay,
    OverdueCheck,
}

impl ReminderStep {
    pub const ALL: [ReminderStep; 4] = [
        ReminderStep::Confirmation,
        ReminderStep::DueTomorrow,
        ReminderStep::LastDay,
        ReminderStep::OverdueCheck,
    ];

    pub fn from_index(step: i32) -> Option<Self> {
        usize::try_from(step).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReminderStep::Confirmation => "send-borrowed-email",
            ReminderStep::DueTomorrow => "send-reminder-before-due",
            ReminderStep::LastDay => "send-final-reminder",
            ReminderStep::OverdueCheck => "check-if-returned",
        }
    }

    /// When this step becomes due. Milestones are anchored on the due date
    /// at the time of day the book was borrowed.
    pub fn run_at(&self, payload: &BorrowReminderPayload) -> DateTime<Utc> {
        let due = payload.due_date.and_time(payload.borrow_date.time()).and_utc();
        match self {
            ReminderStep::Confirmation => payload.borrow_date,
            ReminderStep::DueTomorrow => due - Duration::days(1),
            ReminderStep::LastDay => due,
            ReminderStep::OverdueCheck => due + Duration::days(1),
        }
    }
}

/// What the runner does with a job once a step succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advance { step: i32, at: DateTime<Utc> },
    Complete,
}

/// Next move after reminder step `step`
pub fn next_reminder(step: i32, payload: &BorrowReminderPayload) -> StepOutcome {
    match ReminderStep::from_index(step + 1) {
        Some(next) => StepOutcome::Advance {
            step: step + 1,
            at: next.run_at(payload),
        },
        None => StepOutcome::Complete,
    }
}

/// Step 0 welcomes the user; step `n >= 1` is the n-th activity check
pub fn onboarding_step_name(step: i32) -> String {
    if step == 0 {
        "new-signup".to_string()
    } else {
        format!("check-user-state-{}", step)
    }
}

/// When onboarding step `step` is due for a job started at `started`
pub fn onboarding_run_at(started: DateTime<Utc>, step: i32) -> DateTime<Utc> {
    if step <= 0 {
        return started;
    }
    started
        + Duration::days(ONBOARDING_FIRST_CHECK_DAYS)
        + Duration::days(ONBOARDING_CHECK_INTERVAL_DAYS * i64::from(step - 1))
}

/// Engagement of a user, judged from their last activity day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Active,
    NonActive,
}

impl ActivityState {
    /// Non-active when last seen more than 3 and at most 30 days ago
    pub fn classify(last_activity: NaiveDate, today: NaiveDate) -> Self {
        let idle = (today - last_activity).num_days();
        if idle > ONBOARDING_FIRST_CHECK_DAYS && idle <= ONBOARDING_CHECK_INTERVAL_DAYS {
            ActivityState::NonActive
        } else {
            ActivityState::Active
        }
    }
}

/// Delay before retrying a step that failed `attempts` times
pub fn backoff(attempts: i32) -> Duration {
    let exp = attempts.saturating_sub(1).clamp(0, 20) as u32;
    let secs = BASE_BACKOFF_SECS.saturating_mul(1_i64 << exp);
    Duration::seconds(secs.min(MAX_BACKOFF_SECS))
}

/// What happens to a job after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePlan {
    Retry { at: DateTime<Utc> },
    Fail,
}

/// Plan for a job that has now failed `attempts` times
pub fn failure_plan(attempts: i32, max_attempts: i32, now: DateTime<Utc>) -> FailurePlan {
    if attempts >= max_attempts {
        FailurePlan::Fail
    } else {
        FailurePlan::Retry {
            at: now + backoff(attempts),
        }
    }
}

/// How a claimed job was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Advanced,
    Completed,
    Retried,
    Failed,
}

#[derive(Clone)]
pub struct WorkflowService {
    repository: Repository,
    borrows: BorrowsService,
    email: EmailService,
    config: WorkflowConfig,
}

impl WorkflowService {
    pub fn new(
        repository: Repository,
        borrows: BorrowsService,
        email: EmailService,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            repository,
            borrows,
            email,
            config,
        }
    }

    /// Start a borrow reminder sequence from a trigger
    pub async fn start_borrow_reminders(&self, payload: &BorrowReminderPayload) -> AppResult<NewJob> {
        let job = NewJob::borrow_reminders(payload, Utc::now())
            .map_err(|e| AppError::Internal(format!("Failed to encode workflow payload: {}", e)))?;
        self.repository.workflow.enqueue(&job).await?;
        tracing::info!("Enqueued borrow reminders {} for user {}", job.id, payload.user_id);
        Ok(job)
    }

    /// Start the onboarding sequence for a new account
    pub async fn start_onboarding(&self, payload: &OnboardingPayload) -> AppResult<NewJob> {
        let job = NewJob::onboarding(payload, Utc::now())
            .map_err(|e| AppError::Internal(format!("Failed to encode workflow payload: {}", e)))?;
        self.repository.workflow.enqueue(&job).await?;
        tracing::info!("Enqueued onboarding {} for {}", job.id, payload.email);
        Ok(job)
    }

    /// Claim due jobs and run one step of each
    pub async fn run_due(&self) -> AppResult<TickReport> {
        let now = Utc::now();
        let jobs = self
            .repository
            .workflow
            .claim_due(now, self.config.batch_size, self.config.lease_secs)
            .await?;

        let mut report = TickReport {
            claimed: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            // one job failing to persist its outcome must not strand the rest
            // of the batch; its lease expires and it is claimed again
            match self.settle(&job).await {
                Ok(Settled::Advanced) => report.advanced += 1,
                Ok(Settled::Completed) => report.completed += 1,
                Ok(Settled::Retried) => report.retried += 1,
                Ok(Settled::Failed) => report.failed += 1,
                Err(e) => tracing::error!("Failed to record outcome of workflow job {}: {}", job.id, e),
            }
        }

        if report.claimed > 0 {
            tracing::debug!("Workflow tick: {:?}", report);
        }
        Ok(report)
    }

    /// Run one step of a claimed job and persist where it ended up
    async fn settle(&self, job: &WorkflowJob) -> AppResult<Settled> {
        if job.attempts >= self.config.max_attempts {
            tracing::error!(
                "Workflow job {} abandoned at step {} after {} attempts",
                job.id,
                job.step,
                job.attempts
            );
            let message = "Lease expired too many times";
            self.repository
                .workflow
                .fail(job.id, job.attempts, message, Utc::now())
                .await?;
            return Ok(Settled::Failed);
        }

        match self.run_step(job).await {
            Ok(StepOutcome::Advance { step, at }) => {
                self.repository.workflow.advance(job.id, step, at, Utc::now()).await?;
                Ok(Settled::Advanced)
            }
            Ok(StepOutcome::Complete) => {
                self.repository.workflow.complete(job.id, Utc::now()).await?;
                tracing::info!("Workflow job {} ({}) completed", job.id, job.kind);
                Ok(Settled::Completed)
            }
            Err(e) => {
                let attempts = job.attempts + 1;
                let message = e.to_string();
                match failure_plan(attempts, self.config.max_attempts, Utc::now()) {
                    FailurePlan::Fail => {
                        tracing::error!(
                            "Workflow job {} failed permanently at step {}: {}",
                            job.id,
                            job.step,
                            message
                        );
                        self.repository
                            .workflow
                            .fail(job.id, attempts, &message, Utc::now())
                            .await?;
                        Ok(Settled::Failed)
                    }
                    FailurePlan::Retry { at } => {
                        tracing::warn!(
                            "Workflow job {} step {} failed (attempt {}), retrying at {}: {}",
                            job.id,
                            job.step,
                            attempts,
                            at,
                            message
                        );
                        self.repository
                            .workflow
                            .retry(job.id, attempts, at, &message, Utc::now())
                            .await?;
                        Ok(Settled::Retried)
                    }
                }
            }
        }
    }

    async fn run_step(&self, job: &WorkflowJob) -> AppResult<StepOutcome> {
        match job.kind {
            JobKind::BorrowReminders => {
                let payload: BorrowReminderPayload = serde_json::from_value(job.payload.0.clone())
                    .map_err(|e| AppError::Internal(format!("Invalid borrow reminder payload: {}", e)))?;
                self.run_reminder_step(job, &payload).await
            }
            JobKind::Onboarding => {
                let payload: OnboardingPayload = serde_json::from_value(job.payload.0.clone())
                    .map_err(|e| AppError::Internal(format!("Invalid onboarding payload: {}", e)))?;
                self.run_onboarding_step(job, &payload).await
            }
        }
    }

    async fn run_reminder_step(
        &self,
        job: &WorkflowJob,
        payload: &BorrowReminderPayload,
    ) -> AppResult<StepOutcome> {
        let Some(step) = ReminderStep::from_index(job.step) else {
            return Ok(StepOutcome::Complete);
        };

        if self.repository.workflow.step_completed(job.id, step.name()).await? {
            return Ok(next_reminder(job.step, payload));
        }

        let user = match self.repository.users.get_by_id(payload.user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                tracing::warn!("Borrower {} no longer exists, stopping job {}", payload.user_id, job.id);
                return Ok(StepOutcome::Complete);
            }
            Err(e) => return Err(e),
        };
        let book = match self.repository.books.get_by_id(payload.book_id).await {
            Ok(book) => book,
            Err(AppError::NotFound(_)) => {
                tracing::warn!("Book {} no longer exists, stopping job {}", payload.book_id, job.id);
                return Ok(StepOutcome::Complete);
            }
            Err(e) => return Err(e),
        };

        let notification = match step {
            ReminderStep::Confirmation => Some(Notification::borrowed(&user.fullname, &book.title, payload.due_date)),
            ReminderStep::DueTomorrow => Some(Notification::due_tomorrow(&user.fullname, &book.title)),
            ReminderStep::LastDay => Some(Notification::last_day(&user.fullname, &book.title)),
            ReminderStep::OverdueCheck => {
                if self.borrows.is_loan_returned(payload).await? {
                    None
                } else {
                    Some(Notification::overdue(&user.fullname, &book.title))
                }
            }
        };

        if let Some(notification) = notification {
            self.email.send(&user.email, &notification).await?;
        }
        self.repository
            .workflow
            .mark_step(job.id, step.name(), Utc::now())
            .await?;

        Ok(next_reminder(job.step, payload))
    }

    async fn run_onboarding_step(&self, job: &WorkflowJob, payload: &OnboardingPayload) -> AppResult<StepOutcome> {
        let name = onboarding_step_name(job.step);
        let next = StepOutcome::Advance {
            step: job.step + 1,
            at: onboarding_run_at(job.created_at, job.step + 1),
        };

        if self.repository.workflow.step_completed(job.id, &name).await? {
            return Ok(next);
        }

        let notification = if job.step == 0 {
            Notification::welcome(&payload.fullname)
        } else {
            let Some(user) = self.repository.users.get_by_email(&payload.email).await? else {
                tracing::info!("{} no longer has an account, stopping onboarding", payload.email);
                return Ok(StepOutcome::Complete);
            };
            match ActivityState::classify(user.last_activity_date, Utc::now().date_naive()) {
                ActivityState::NonActive => Notification::inactive(&payload.fullname),
                ActivityState::Active => Notification::still_active(&payload.fullname),
            }
        };

        self.email.send(&payload.email, &notification).await?;
        self.repository.workflow.mark_step(job.id, &name, Utc::now()).await?;

        Ok(next)
    }

    /// Poll for due jobs until the process exits. Does nothing when the
    /// configured interval is zero.
    pub fn spawn_poller(self) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.poll_interval_secs == 0 {
            return None;
        }
        let period = StdDuration::from_secs(self.config.poll_interval_secs);

        Some(tokio::spawn(async move {
            tracing::info!("Workflow poller running every {:?}", period);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = self.run_due().await {
                    tracing::error!("Workflow poll failed: {}", e);
                }
            }
        }))
    }
}
