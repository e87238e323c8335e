//! Decides whether a decoded event is routed to the on-call system.
//!
//! Pushes are routed only when they land on the default branch of an
//! allow-listed repository. Deployments are routed unless they target a test
//! environment.

use crate::webhook::GitHubEvent;
use std::collections::HashSet;
use std::fmt;

/// Branch ref pushes must target to be routed
pub const DEFAULT_BRANCH_REF: &str = "refs/heads/master";

/// Environment prefix marking test deployments
pub const DEFAULT_TEST_ENVIRONMENT_PREFIX: &str = "g";

/// Result of evaluating an event against the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Route,
    Drop(DropReason),
}

/// Why an event was not routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NonDefaultBranch { git_ref: String },
    RepositoryNotAllowed { repository: String },
    TestEnvironment { environment: String },
}

impl DropReason {
    /// Stable label for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonDefaultBranch { .. } => "non_default_branch",
            Self::RepositoryNotAllowed { .. } => "repository_not_allowed",
            Self::TestEnvironment { .. } => "test_environment",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonDefaultBranch { git_ref } => write!(f, "push to non-default ref {git_ref}"),
            Self::RepositoryNotAllowed { repository } => {
                write!(f, "repository {repository} is not in the allow-list")
            }
            Self::TestEnvironment { environment } => {
                write!(f, "ignoring test environment {environment}")
            }
        }
    }
}

/// Routing policy built from configuration
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    repositories: HashSet<String>,
    default_branch_ref: String,
    test_environment_prefix: String,
}

impl RoutingPolicy {
    pub fn new<I, S>(
        repositories: I,
        default_branch_ref: impl Into<String>,
        test_environment_prefix: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            repositories: repositories.into_iter().map(Into::into).collect(),
            default_branch_ref: default_branch_ref.into(),
            test_environment_prefix: test_environment_prefix.into(),
        }
    }

    /// Policy with the stock branch ref and test prefix
    pub fn with_defaults<I, S>(repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            repositories,
            DEFAULT_BRANCH_REF,
            DEFAULT_TEST_ENVIRONMENT_PREFIX,
        )
    }

    /// Whether `repository` (short name) is allow-listed for push routing
    pub fn is_repository_allowed(&self, repository: &str) -> bool {
        self.repositories.contains(repository)
    }

    /// An empty prefix never marks an environment as test.
    pub fn is_test_environment(&self, environment: &str) -> bool {
        !self.test_environment_prefix.is_empty()
            && environment.starts_with(&self.test_environment_prefix)
    }

    pub fn evaluate(&self, event: &GitHubEvent) -> FilterDecision {
        match event {
            GitHubEvent::Push(push) => {
                if push.git_ref != self.default_branch_ref {
                    return FilterDecision::Drop(DropReason::NonDefaultBranch {
                        git_ref: push.git_ref.clone(),
                    });
                }
                if !self.is_repository_allowed(&push.repository.name) {
                    return FilterDecision::Drop(DropReason::RepositoryNotAllowed {
                        repository: push.repository.name.clone(),
                    });
                }
                FilterDecision::Route
            }
            GitHubEvent::Deployment(deployment) => {
                if self.is_test_environment(&deployment.environment) {
                    return FilterDecision::Drop(DropReason::TestEnvironment {
                        environment: deployment.environment.clone(),
                    });
                }
                FilterDecision::Route
            }
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
