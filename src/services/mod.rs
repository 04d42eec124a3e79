//! Business logic services

pub mod assets;
pub mod borrows;
pub mod catalog;
pub mod email;
pub mod rate_limit;
pub mod stats;
pub mod users;
pub mod workflow;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub borrows: borrows::BorrowsService,
    pub workflow: workflow::WorkflowService,
    pub stats: stats::StatsService,
    pub assets: assets::AssetsService,
    pub rate_limit: rate_limit::RateLimiter,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, rate_limit: rate_limit::RateLimiter) -> Self {
        let email = email::EmailService::new(config.email.clone());
        let borrows = borrows::BorrowsService::new(
            Arc::new(repository.borrows.clone()),
            config.library.clone(),
        );
        let workflow = workflow::WorkflowService::new(
            repository.clone(),
            borrows.clone(),
            email,
            config.workflow.clone(),
        );

        Self {
            catalog: catalog::CatalogService::new(repository.clone(), config.library.clone()),
            users: users::UsersService::new(
                Arc::new(repository.users.clone()),
                config.auth.clone(),
                config.library.clone(),
            ),
            borrows,
            workflow,
            stats: stats::StatsService::new(repository.clone()),
            assets: assets::AssetsService::new(config.assets.clone()),
            rate_limit,
            repository,
        }
    }
}
