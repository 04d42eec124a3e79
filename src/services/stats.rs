//! Statistics service

use chrono::Utc;

use crate::{error::AppResult, models::stats::DashboardStats, repository::Repository};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Weekly growth of users, books and borrow records
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        self.repository.stats.dashboard(Utc::now()).await
    }
}
