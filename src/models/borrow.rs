//! Borrow record model and lifecycle rules

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{book::Book, user::User};

/// Default loan period in days
pub const DEFAULT_LOAN_DAYS: i64 = 7;

/// Borrow record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
    Overdue,
    LateReturn,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "BORROWED",
            BorrowStatus::Returned => "RETURNED",
            BorrowStatus::Overdue => "OVERDUE",
            BorrowStatus::LateReturn => "LATE_RETURN",
        }
    }

    /// Whether a record in this status keeps a copy off the shelf
    pub fn holds_copy(&self) -> bool {
        matches!(self, BorrowStatus::Borrowed | BorrowStatus::Overdue)
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BORROWED" => Ok(BorrowStatus::Borrowed),
            "RETURNED" => Ok(BorrowStatus::Returned),
            "OVERDUE" => Ok(BorrowStatus::Overdue),
            "LATE_RETURN" => Ok(BorrowStatus::LateReturn),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

super::impl_text_enum!(BorrowStatus);

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    /// Set only while the status is RETURNED
    pub return_date: Option<NaiveDate>,
    pub status: BorrowStatus,
    pub created_at: DateTime<Utc>,
}

/// A user's borrowed book, as shown on their profile
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowedBook {
    #[serde(flatten)]
    pub book: Book,
    pub borrow: BorrowRecord,
}

/// Borrow record with its book and borrower, for the admin listing
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowRecordDetails {
    #[serde(flatten)]
    pub book: Book,
    pub borrow: BorrowRecord,
    pub user: User,
}

/// Admin status update request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBorrowStatus {
    pub status: BorrowStatus,
}

/// Borrow record about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: NaiveDate,
}

impl NewBorrow {
    pub fn new(user_id: Uuid, book_id: Uuid, borrow_date: DateTime<Utc>, loan_days: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            borrow_date,
            due_date: due_date_for(borrow_date, loan_days),
        }
    }
}

/// Due date for a loan starting at `borrow_date`
pub fn due_date_for(borrow_date: DateTime<Utc>, loan_days: i64) -> NaiveDate {
    (borrow_date + Duration::days(loan_days)).date_naive()
}

/// Effect of a status change on the book's available copies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    /// Copy goes back on the shelf
    Release,
    /// Copy leaves the shelf again
    Reclaim,
    Unchanged,
}

/// Everything a status change writes, decided up front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: BorrowStatus,
    pub return_date: Option<NaiveDate>,
    pub inventory: InventoryEffect,
}

impl StatusChange {
    pub fn plan(from: BorrowStatus, to: BorrowStatus, today: NaiveDate) -> Self {
        let return_date = match to {
            BorrowStatus::Returned => Some(today),
            _ => None,
        };
        let inventory = match (from.holds_copy(), to.holds_copy()) {
            (true, false) => InventoryEffect::Release,
            (false, true) => InventoryEffect::Reclaim,
            _ => InventoryEffect::Unchanged,
        };
        Self {
            status: to,
            return_date,
            inventory,
        }
    }
}
