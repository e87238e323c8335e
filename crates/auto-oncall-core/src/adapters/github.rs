//! GitHub commit lookup.

use super::{join_segments, parse_base_url, AdapterConfigError};
use crate::identity::{CommitAuthorLookup, LookupError};
use crate::SecretString;
use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

/// Public GitHub REST endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// User agent sent with every GitHub request
pub const USER_AGENT: &str = "auto-oncall";

#[derive(Deserialize)]
struct CommitResponse {
    author: Option<CommitAuthor>,
}

#[derive(Deserialize)]
struct CommitAuthor {
    login: String,
}

/// [`CommitAuthorLookup`] over `GET /repos/{owner}/{repo}/commits/{ref}`
#[derive(Clone)]
pub struct GitHubCommitClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
}

impl GitHubCommitClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        token: SecretString,
    ) -> Result<Self, AdapterConfigError> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            token,
        })
    }
}

#[async_trait]
impl CommitAuthorLookup for GitHubCommitClient {
    #[instrument(skip(self))]
    async fn commit_author(
        &self,
        repository_full_name: &str,
        git_ref: &str,
    ) -> Result<String, LookupError> {
        let segments = std::iter::once("repos")
            .chain(repository_full_name.split('/'))
            .chain(["commits", git_ref]);
        let url = join_segments(&self.base_url, segments).ok_or_else(|| {
            LookupError::ExecutionFailed {
                message: "cannot build request URL".to_string(),
            }
        })?;

        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| LookupError::ExecutionFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::UnexpectedResponseCode {
                status: status.as_u16(),
            });
        }

        let commit: CommitResponse =
            response
                .json()
                .await
                .map_err(|e| LookupError::MalformedResponse {
                    message: e.to_string(),
                })?;

        // Commits by emails not linked to an account carry no author
        commit
            .author
            .map(|author| author.login)
            .filter(|login| !login.is_empty())
            .ok_or_else(|| LookupError::MalformedResponse {
                message: format!("commit {git_ref} has no GitHub author"),
            })
    }
}

// Security: Don't expose the token in debug output
impl std::fmt::Debug for GitHubCommitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubCommitClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
