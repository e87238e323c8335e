//! # Infrastructure Adapters
//!
//! reqwest implementations of [`crate::gateway::IncidentApi`] and
//! [`crate::identity::CommitAuthorLookup`].

pub mod github;
pub mod opsgenie;

pub use github::GitHubCommitClient;
pub use opsgenie::OpsgenieClient;

use url::Url;

/// Invalid adapter base URL
#[derive(Debug, thiserror::Error)]
pub enum AdapterConfigError {
    #[error("Invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
}

/// Parse a base URL that path segments can be appended to
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, AdapterConfigError> {
    let url = Url::parse(raw).map_err(|e| AdapterConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(AdapterConfigError::InvalidBaseUrl {
            url: raw.to_string(),
            message: "must be an http(s) URL".to_string(),
        });
    }

    Ok(url)
}

/// Append percent-encoded `segments` to `base`
pub(crate) fn join_segments<'a, I>(base: &Url, segments: I) -> Option<Url>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(segments);
    Some(url)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
