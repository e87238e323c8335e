//! OpsGenie REST client.

use super::{join_segments, parse_base_url, AdapterConfigError};
use crate::gateway::{
    EscalationRequest, GatewayError, IncidentApi, RemoteRoutingRule, RoutingRuleRequest,
};
use crate::SecretString;
use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// Public OpsGenie API endpoint
pub const DEFAULT_OPSGENIE_API_URL: &str = "https://api.opsgenie.com";

#[derive(Deserialize)]
struct RoutingRuleList {
    #[serde(default)]
    data: Vec<RemoteRoutingRule>,
}

/// [`IncidentApi`] over the OpsGenie v2 REST API, scoped to one team
#[derive(Clone)]
pub struct OpsgenieClient {
    http: reqwest::Client,
    base_url: Url,
    team_id: String,
    token: SecretString,
}

impl OpsgenieClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        team_id: impl Into<String>,
        token: SecretString,
    ) -> Result<Self, AdapterConfigError> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            team_id: team_id.into(),
            token,
        })
    }

    fn url(&self, operation: &'static str, segments: &[&str]) -> Result<Url, GatewayError> {
        join_segments(&self.base_url, segments.iter().copied()).ok_or_else(|| {
            GatewayError::ExecutionFailed {
                operation,
                message: "cannot build request URL".to_string(),
            }
        })
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(
                header::AUTHORIZATION,
                format!("GenieKey {}", self.token.expose_secret()),
            )
            .header(header::ACCEPT, "application/json")
    }

    async fn send(
        operation: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        builder
            .send()
            .await
            .map_err(|e| GatewayError::ExecutionFailed {
                operation,
                message: e.to_string(),
            })
    }

    fn expect_status(
        operation: &'static str,
        response: &reqwest::Response,
        accepted: &[StatusCode],
    ) -> Result<(), GatewayError> {
        let status = response.status();
        if accepted.contains(&status) {
            debug!(operation, status = status.as_u16(), "OpsGenie request succeeded");
            Ok(())
        } else {
            Err(GatewayError::UnexpectedResponseCode {
                operation,
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl IncidentApi for OpsgenieClient {
    #[instrument(skip(self, request), fields(escalation = %request.name))]
    async fn create_escalation(&self, request: &EscalationRequest) -> Result<(), GatewayError> {
        const OPERATION: &str = "create escalation";
        let url = self.url(OPERATION, &["v2", "escalations"])?;

        let response = Self::send(OPERATION, self.request(Method::POST, url).json(request)).await?;
        Self::expect_status(
            OPERATION,
            &response,
            &[StatusCode::CREATED, StatusCode::CONFLICT],
        )
    }

    #[instrument(skip(self), fields(team = %self.team_id))]
    async fn list_routing_rules(&self) -> Result<Vec<RemoteRoutingRule>, GatewayError> {
        const OPERATION: &str = "list routing rules";
        let url = self.url(OPERATION, &["v2", "teams", self.team_id.as_str(), "routing-rules"])?;

        let response = Self::send(OPERATION, self.request(Method::GET, url)).await?;
        Self::expect_status(OPERATION, &response, &[StatusCode::OK])?;

        let list: RoutingRuleList =
            response
                .json()
                .await
                .map_err(|e| GatewayError::MalformedResponse {
                    operation: OPERATION,
                    message: e.to_string(),
                })?;
        Ok(list.data)
    }

    #[instrument(skip(self, request), fields(team = %self.team_id, rule = %request.name))]
    async fn create_routing_rule(&self, request: &RoutingRuleRequest) -> Result<(), GatewayError> {
        const OPERATION: &str = "create routing rule";
        let url = self.url(OPERATION, &["v2", "teams", self.team_id.as_str(), "routing-rules"])?;

        let response = Self::send(OPERATION, self.request(Method::POST, url).json(request)).await?;
        Self::expect_status(OPERATION, &response, &[StatusCode::CREATED])
    }

    #[instrument(skip(self), fields(team = %self.team_id))]
    async fn delete_routing_rule(&self, id: &str) -> Result<(), GatewayError> {
        const OPERATION: &str = "delete routing rule";
        let url = self.url(OPERATION, &["v2", "teams", self.team_id.as_str(), "routing-rules", id])?;

        let response = Self::send(OPERATION, self.request(Method::DELETE, url)).await?;
        Self::expect_status(OPERATION, &response, &[StatusCode::OK])
    }

    #[instrument(skip(self))]
    async fn delete_escalation(&self, name: &str) -> Result<(), GatewayError> {
        const OPERATION: &str = "delete escalation";
        let mut url = self.url(OPERATION, &["v2", "escalations", name])?;
        url.query_pairs_mut().append_pair("identifierType", "name");

        let response = Self::send(OPERATION, self.request(Method::DELETE, url)).await?;
        Self::expect_status(OPERATION, &response, &[StatusCode::OK])
    }
}

// Security: Don't expose the API key in debug output
impl std::fmt::Debug for OpsgenieClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsgenieClient")
            .field("base_url", &self.base_url.as_str())
            .field("team_id", &self.team_id)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "opsgenie_tests.rs"]
mod tests;
