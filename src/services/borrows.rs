//! Borrowing: eligibility, loans, returns and listings

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::{
        borrow::NewBorrow,
        query::ListQuery,
        workflow::{BorrowReminderPayload, NewJob},
        BorrowRecord, BorrowRecordDetails, BorrowStatus, BorrowedBook, Paginated, User, UserStatus,
    },
};

/// Storage operations behind borrowing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowStore: Send + Sync {
    async fn borrower(&self, user_id: Uuid) -> AppResult<User>;

    /// Take a copy, insert the record and enqueue `job`, all or nothing.
    /// Fails with `Unavailable` when no copy is left.
    async fn insert_borrow(&self, borrow: &NewBorrow, job: &NewJob) -> AppResult<BorrowRecord>;

    /// Apply a status change, reconciling the book's available copies
    async fn change_status(&self, id: Uuid, to: BorrowStatus, today: NaiveDate) -> AppResult<BorrowRecord>;

    /// Status of the most recent record for this user and book
    async fn latest_status(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BorrowStatus>>;

    /// Status of one record
    async fn record_status(&self, id: Uuid) -> AppResult<Option<BorrowStatus>>;

    async fn borrowed_books(&self, user_id: Uuid) -> AppResult<Vec<BorrowedBook>>;

    async fn search(&self, query: &ListQuery, default_limit: i64) -> AppResult<(Vec<BorrowRecordDetails>, i64)>;
}

#[derive(Clone)]
pub struct BorrowsService {
    store: Arc<dyn BorrowStore>,
    config: LibraryConfig,
}

impl BorrowsService {
    pub fn new(store: Arc<dyn BorrowStore>, config: LibraryConfig) -> Self {
        Self { store, config }
    }

    /// Borrow a book for `user_id`, scheduling its reminders
    pub async fn borrow(&self, user_id: Uuid, book_id: Uuid, now: DateTime<Utc>) -> AppResult<BorrowRecord> {
        let user = self.store.borrower(user_id).await?;
        if user.status != UserStatus::Approved {
            tracing::warn!("Borrow refused for {}: account is {}", user_id, user.status);
            return Err(AppError::Authorization("Account is not approved".to_string()));
        }

        let borrow = NewBorrow::new(user_id, book_id, now, self.config.loan_days);
        let job = NewJob::borrow_reminders(&BorrowReminderPayload::from(&borrow), now)
            .map_err(|e| AppError::Internal(format!("Failed to encode workflow payload: {}", e)))?;

        match self.store.insert_borrow(&borrow, &job).await {
            Ok(record) => {
                tracing::info!("User {} borrowed book {} until {}", user_id, book_id, record.due_date);
                Ok(record)
            }
            Err(e) => {
                if matches!(e, AppError::Unavailable(_)) {
                    tracing::warn!("Book {} has no copy left", book_id);
                }
                Err(e)
            }
        }
    }

    /// Change a record's status (admin)
    pub async fn update_status(&self, id: Uuid, status: BorrowStatus, today: NaiveDate) -> AppResult<BorrowRecord> {
        let record = self.store.change_status(id, status, today).await?;
        tracing::info!("Borrow record {} is now {}", id, record.status);
        Ok(record)
    }

    pub async fn is_book_returned(&self, user_id: Uuid, book_id: Uuid) -> AppResult<bool> {
        Ok(self.store.latest_status(user_id, book_id).await? == Some(BorrowStatus::Returned))
    }

    /// Whether the loan a reminder job follows was returned. Jobs that know
    /// their record check it directly, so a later borrow of the same book
    /// does not count against an earlier, returned one.
    pub async fn is_loan_returned(&self, payload: &BorrowReminderPayload) -> AppResult<bool> {
        match payload.borrow_id {
            Some(id) => Ok(self.store.record_status(id).await? == Some(BorrowStatus::Returned)),
            None => self.is_book_returned(payload.user_id, payload.book_id).await,
        }
    }

    pub async fn borrowed_books(&self, user_id: Uuid) -> AppResult<Vec<BorrowedBook>> {
        self.store.borrowed_books(user_id).await
    }

    pub async fn search(&self, query: &ListQuery) -> AppResult<Paginated<BorrowRecordDetails>> {
        let pagination = query.pagination(self.config.page_size);
        let (records, total) = self.store.search(query, self.config.page_size).await?;
        Ok(Paginated::new(records, pagination, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::TimeZone;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};

    fn user(status: UserStatus) -> User {
        User {
            id: Uuid::new_v4(),
            fullname: "Ada Lovelace".to_string(),
            email: "ada@uni.edu".to_string(),
            university_id: 1815,
            university_card: "/ids/ada.png".to_string(),
            password: String::new(),
            status,
            role: UserRole::User,
            last_activity_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn record_from(borrow: &NewBorrow) -> BorrowRecord {
        BorrowRecord {
            id: borrow.id,
            user_id: borrow.user_id,
            book_id: borrow.book_id,
            borrow_date: borrow.borrow_date,
            due_date: borrow.due_date,
            return_date: None,
            status: BorrowStatus::Borrowed,
            created_at: borrow.borrow_date,
        }
    }

    fn service(store: MockBorrowStore) -> BorrowsService {
        BorrowsService::new(Arc::new(store), LibraryConfig::default())
    }

    #[tokio::test]
    async fn test_borrow_sets_due_date_and_enqueues_reminders() {
        let approved = user(UserStatus::Approved);
        let user_id = approved.id;
        let book_id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let mut store = MockBorrowStore::new();
        store
            .expect_borrower()
            .with(eq(user_id))
            .returning(move |_| Ok(approved.clone()));
        store
            .expect_insert_borrow()
            .withf(move |borrow, job| {
                let payload: BorrowReminderPayload = serde_json::from_value(job.payload.clone()).unwrap();
                borrow.due_date == NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
                    && payload.borrow_id == Some(borrow.id)
                    && payload.due_date == borrow.due_date
                    && job.next_run_at == now
            })
            .times(1)
            .returning(|borrow, _| Ok(record_from(borrow)));

        let record = assert_ok!(service(store).borrow(user_id, book_id, now).await);
        assert_eq!(record.status, BorrowStatus::Borrowed);
        assert_eq!(record.book_id, book_id);
    }

    #[tokio::test]
    async fn test_unavailable_book_is_reported() {
        let approved = user(UserStatus::Approved);
        let user_id = approved.id;

        let mut store = MockBorrowStore::new();
        store.expect_borrower().returning(move |_| Ok(approved.clone()));
        store
            .expect_insert_borrow()
            .times(1)
            .returning(|_, _| Err(AppError::Unavailable("Book is not available".to_string())));

        let err = assert_err!(service(store).borrow(user_id, Uuid::new_v4(), Utc::now()).await);
        match err {
            AppError::Unavailable(msg) => assert_eq!(msg, "Book is not available"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pending_user_cannot_borrow() {
        let pending = user(UserStatus::Pending);
        let user_id = pending.id;

        let mut store = MockBorrowStore::new();
        store.expect_borrower().returning(move |_| Ok(pending.clone()));
        store.expect_insert_borrow().never();

        let err = assert_err!(service(store).borrow(user_id, Uuid::new_v4(), Utc::now()).await);
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_is_book_returned_uses_latest_status() {
        let mut store = MockBorrowStore::new();
        let mut statuses = vec![
            None,
            Some(BorrowStatus::Borrowed),
            Some(BorrowStatus::LateReturn),
            Some(BorrowStatus::Returned),
        ]
        .into_iter();
        store
            .expect_latest_status()
            .times(4)
            .returning(move |_, _| Ok(statuses.next().flatten()));

        let service = service(store);
        let (u, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(!service.is_book_returned(u, b).await.unwrap());
        assert!(!service.is_book_returned(u, b).await.unwrap());
        assert!(!service.is_book_returned(u, b).await.unwrap());
        assert!(service.is_book_returned(u, b).await.unwrap());
    }

    fn reminder(borrow_id: Option<Uuid>) -> BorrowReminderPayload {
        BorrowReminderPayload {
            borrow_id,
            user_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            borrow_date: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_returned_loan_ignores_later_borrow_of_same_book() {
        let first = Uuid::new_v4();

        let mut store = MockBorrowStore::new();
        store
            .expect_record_status()
            .with(eq(first))
            .times(1)
            .returning(|_| Ok(Some(BorrowStatus::Returned)));
        // the user borrowed the book again, so the latest record is out
        store
            .expect_latest_status()
            .never()
            .returning(|_, _| Ok(Some(BorrowStatus::Borrowed)));

        assert!(assert_ok!(service(store).is_loan_returned(&reminder(Some(first))).await));
    }

    #[tokio::test]
    async fn test_loan_still_out_is_not_returned() {
        let mut store = MockBorrowStore::new();
        store
            .expect_record_status()
            .times(1)
            .returning(|_| Ok(Some(BorrowStatus::Overdue)));

        assert!(!assert_ok!(service(store).is_loan_returned(&reminder(Some(Uuid::new_v4()))).await));
    }

    #[tokio::test]
    async fn test_trigger_without_record_uses_latest_status() {
        let mut store = MockBorrowStore::new();
        store.expect_record_status().never();
        store
            .expect_latest_status()
            .times(1)
            .returning(|_, _| Ok(Some(BorrowStatus::Returned)));

        assert!(assert_ok!(service(store).is_loan_returned(&reminder(None)).await));
    }

    #[tokio::test]
    async fn test_update_status_passes_today() {
        let id = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let mut store = MockBorrowStore::new();
        store
            .expect_change_status()
            .with(eq(id), eq(BorrowStatus::Returned), eq(today))
            .times(1)
            .returning(|id, status, today| {
                Ok(BorrowRecord {
                    id,
                    user_id: Uuid::new_v4(),
                    book_id: Uuid::new_v4(),
                    borrow_date: Utc::now(),
                    due_date: today,
                    return_date: Some(today),
                    status,
                    created_at: Utc::now(),
                })
            });

        let record = assert_ok!(service(store).update_status(id, BorrowStatus::Returned, today).await);
        assert_eq!(record.return_date, Some(today));
    }

    #[tokio::test]
    async fn test_search_builds_metadata() {
        let mut store = MockBorrowStore::new();
        store.expect_search().returning(|_, _| Ok((Vec::new(), 41)));

        let query = ListQuery {
            page: Some(2),
            ..Default::default()
        };
        let page = assert_ok!(service(store).search(&query).await);
        assert_eq!(page.metadata.total_pages, 3);
        assert!(page.metadata.has_next_page);
        assert_eq!(page.metadata.current_page, 2);
    }
}
