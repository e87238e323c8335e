//! # Identity Resolution
//!
//! Maps the GitHub login responsible for an event to an on-call user.
//!
//! Deployments created by the automation account are attributed to the
//! author of the commit being deployed, fetched through
//! [`CommitAuthorLookup`].

use crate::webhook::GitHubEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Login of the bot account that creates deployments on behalf of humans
pub const DEFAULT_AUTOMATION_ACCOUNT: &str = "taylorbot";

// ============================================================================
// Core Types
// ============================================================================

/// A GitHub login paired with the on-call user it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedActor {
    pub source_login: String,
    pub on_call_user_id: String,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("No on-call user configured for GitHub login '{login}'")]
    UserNotFound { login: String },

    #[error("Failed to look up commit author: {0}")]
    CommitLookup(#[from] LookupError),
}

impl IdentityError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UserNotFound { .. } => false,
            Self::CommitLookup(e) => e.is_transient(),
        }
    }
}

/// Failures of the source-control commit lookup
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Commit lookup request failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Commit lookup returned unexpected status {status}")]
    UnexpectedResponseCode { status: u16 },

    #[error("Commit lookup returned malformed response: {message}")]
    MalformedResponse { message: String },
}

impl LookupError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExecutionFailed { .. } => true,
            Self::UnexpectedResponseCode { status } => *status == 429 || *status >= 500,
            Self::MalformedResponse { .. } => false,
        }
    }
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Source-control lookup of the author of a commit
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommitAuthorLookup: Send + Sync {
    /// Get the GitHub login of the author of the commit at `git_ref`.
    ///
    /// # Errors
    /// - `LookupError::ExecutionFailed` - Transport failure
    /// - `LookupError::UnexpectedResponseCode` - Non-2xx response
    /// - `LookupError::MalformedResponse` - Body has no author login
    async fn commit_author(
        &self,
        repository_full_name: &str,
        git_ref: &str,
    ) -> Result<String, LookupError>;
}

// ============================================================================
// Resolution
// ============================================================================

/// Look `actor_login` up in `users`.
///
/// A missing entry and an entry with an empty user id are both `UserNotFound`.
pub fn resolve(
    actor_login: &str,
    users: &HashMap<String, String>,
) -> Result<ResolvedActor, IdentityError> {
    match users.get(actor_login) {
        Some(user_id) if !user_id.is_empty() => Ok(ResolvedActor {
            source_login: actor_login.to_string(),
            on_call_user_id: user_id.clone(),
        }),
        _ => Err(IdentityError::UserNotFound {
            login: actor_login.to_string(),
        }),
    }
}

/// Resolves the responsible on-call user for decoded events
pub struct IdentityResolver {
    users: HashMap<String, String>,
    automation_account: String,
    commits: Arc<dyn CommitAuthorLookup>,
}

impl IdentityResolver {
    pub fn new(
        users: HashMap<String, String>,
        automation_account: impl Into<String>,
        commits: Arc<dyn CommitAuthorLookup>,
    ) -> Self {
        Self {
            users,
            automation_account: automation_account.into(),
            commits,
        }
    }

    /// Resolve the actor of `event`.
    ///
    /// For automation-account deployments the commit lookup runs once; its
    /// failure aborts resolution.
    #[instrument(skip(self, event), fields(repository = %event.repository(), actor = %event.actor_login()))]
    pub async fn resolve_event(&self, event: &GitHubEvent) -> Result<ResolvedActor, IdentityError> {
        match event {
            GitHubEvent::Push(push) => resolve(&push.pusher_login, &self.users),
            GitHubEvent::Deployment(deployment) => {
                if deployment.creator_login != self.automation_account {
                    return resolve(&deployment.creator_login, &self.users);
                }

                let author = self
                    .commits
                    .commit_author(&deployment.repository.full_name, &deployment.git_ref)
                    .await?;

                debug!(
                    automation_account = %self.automation_account,
                    commit_author = %author,
                    git_ref = %deployment.git_ref,
                    "Attributing automated deployment to commit author"
                );

                resolve(&author, &self.users)
            }
        }
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("users", &self.users.len())
            .field("automation_account", &self.automation_account)
            .finish()
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
