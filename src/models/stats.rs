//! Admin dashboard statistics

use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Raw weekly counters for one table
#[derive(Debug, Clone, Copy, FromRow)]
pub struct WeeklyCountRow {
    pub total: i64,
    pub current_week: i64,
    pub previous_week: i64,
}

/// Weekly growth of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatEntry {
    pub total: i64,
    /// Created during the last 7 days
    pub current_week: i64,
    /// Created 7 to 14 days ago
    pub previous_week: i64,
    pub change: i64,
}

impl From<WeeklyCountRow> for StatEntry {
    fn from(row: WeeklyCountRow) -> Self {
        Self {
            total: row.total,
            current_week: row.current_week,
            previous_week: row.previous_week,
            change: row.current_week - row.previous_week,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct DashboardStats {
    pub users: StatEntry,
    pub books: StatEntry,
    pub borrow_records: StatEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_can_be_negative() {
        let entry = StatEntry::from(WeeklyCountRow {
            total: 40,
            current_week: 3,
            previous_week: 7,
        });
        assert_eq!(entry.change, -4);
    }
}
