pub mod api;
pub mod audit;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod curated;
pub mod error;
pub mod export;
pub mod intake;
pub mod model;
pub mod moderation;
pub mod state_machine;
pub mod stats;

use std::sync::Arc;

pub use auth::{Authenticator, Session};
pub use collaborators::{Collaborators, HttpCollaborators};
pub use error::{ModerationError, ValidationError};
pub use state_machine::repository::{InMemoryRepository, Repository, SqliteRepository};

use curated::{CuratedItem, CuratedService};
use intake::IntakeService;
use moderation::ModerationService;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

pub fn get_service_version() -> String {
    // Release builds export the hash when there is no .git to inspect
    if let Some(git_hash) = option_env!("KATA_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        short_hash(git_hash)
    } else {
        "unknown".to_string()
    }
}

pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub authenticator: Authenticator,
    pub intake: IntakeService,
    pub moderation: ModerationService,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        collaborators: Arc<dyn Collaborators>,
        authenticator: Authenticator,
    ) -> Self {
        Self {
            intake: IntakeService::new(repo.clone()),
            moderation: ModerationService::new(repo.clone(), collaborators),
            repo,
            authenticator,
        }
    }

    pub fn curated<T: CuratedItem>(&self) -> CuratedService<T> {
        CuratedService::new(self.repo.clone())
    }
}
