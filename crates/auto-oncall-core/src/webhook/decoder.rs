//! Decoding of push and deployment payloads into routing-relevant events.

use super::{EventKind, WebhookError};
use crate::RepositoryRef;
use serde::Deserialize;

/// Fields of a `push` delivery the router cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub git_ref: String,
    pub repository: RepositoryRef,
    pub pusher_login: String,
    pub head_commit_id: String,
}

/// Fields of a `deployment` delivery the router cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEvent {
    pub repository: RepositoryRef,
    pub environment: String,
    pub git_ref: String,
    pub creator_login: String,
}

/// A decoded delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubEvent {
    Push(PushEvent),
    Deployment(DeploymentEvent),
}

impl GitHubEvent {
    /// Decode `payload` according to the delivery's event kind.
    pub fn decode(kind: EventKind, payload: &[u8]) -> Result<Self, WebhookError> {
        match kind {
            EventKind::Push => {
                let wire: PushPayload = parse(kind, payload)?;
                let head_commit = wire
                    .head_commit
                    .ok_or_else(|| malformed(kind, "push event has no head commit"))?;
                check_repository(kind, &wire.repository)?;

                Ok(Self::Push(PushEvent {
                    git_ref: wire.git_ref,
                    repository: wire.repository,
                    pusher_login: wire.pusher.name,
                    head_commit_id: head_commit.id,
                }))
            }
            EventKind::Deployment => {
                let wire: DeploymentPayload = parse(kind, payload)?;
                check_repository(kind, &wire.repository)?;

                Ok(Self::Deployment(DeploymentEvent {
                    repository: wire.repository,
                    environment: wire.deployment.environment,
                    git_ref: wire.deployment.git_ref,
                    creator_login: wire.deployment.creator.login,
                }))
            }
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Push(_) => EventKind::Push,
            Self::Deployment(_) => EventKind::Deployment,
        }
    }

    pub fn repository(&self) -> &RepositoryRef {
        match self {
            Self::Push(event) => &event.repository,
            Self::Deployment(event) => &event.repository,
        }
    }

    /// Login of the GitHub user that triggered the event
    pub fn actor_login(&self) -> &str {
        match self {
            Self::Push(event) => &event.pusher_login,
            Self::Deployment(event) => &event.creator_login,
        }
    }

    pub fn git_ref(&self) -> &str {
        match self {
            Self::Push(event) => &event.git_ref,
            Self::Deployment(event) => &event.git_ref,
        }
    }
}

fn parse<'a, T: Deserialize<'a>>(kind: EventKind, payload: &'a [u8]) -> Result<T, WebhookError> {
    serde_json::from_slice(payload).map_err(|e| malformed(kind, e.to_string()))
}

fn check_repository(kind: EventKind, repository: &RepositoryRef) -> Result<(), WebhookError> {
    if repository.name.is_empty() || repository.full_name.is_empty() {
        return Err(malformed(kind, "repository name is empty"));
    }
    Ok(())
}

fn malformed(kind: EventKind, message: impl Into<String>) -> WebhookError {
    WebhookError::MalformedPayload {
        event_kind: kind,
        message: message.into(),
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    repository: RepositoryRef,
    pusher: PusherPayload,
    head_commit: Option<CommitPayload>,
}

#[derive(Deserialize)]
struct PusherPayload {
    name: String,
}

#[derive(Deserialize)]
struct CommitPayload {
    id: String,
}

#[derive(Deserialize)]
struct DeploymentPayload {
    deployment: DeploymentDetails,
    repository: RepositoryRef,
}

#[derive(Deserialize)]
struct DeploymentDetails {
    #[serde(rename = "ref")]
    git_ref: String,
    environment: String,
    creator: CreatorPayload,
}

#[derive(Deserialize)]
struct CreatorPayload {
    login: String,
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
