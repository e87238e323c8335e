//! Construction of the pipeline and janitor from [`ServiceConfig`].

use crate::config::ServiceConfig;
use crate::errors::ConfigError;
use auto_oncall_core::adapters::github::{GitHubCommitClient, USER_AGENT};
use auto_oncall_core::adapters::opsgenie::OpsgenieClient;
use auto_oncall_core::{
    EscalationGateway, IdentityResolver, IncidentApi, RoutingPolicy, RoutingRuleJanitor,
    RoutingRuleSynthesizer, SignatureVerifier, WebhookPipeline,
};
use std::sync::Arc;
use std::time::Duration;

/// Long-lived components shared by the server and the janitor loop
pub struct Components {
    pub pipeline: Arc<WebhookPipeline>,
    pub janitor: RoutingRuleJanitor,
}

/// Outbound client shared by both remote adapters
pub fn build_http_client(config: &ServiceConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_client.timeout_seconds))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("cannot build HTTP client: {e}"),
        })
}

pub fn build_components(
    config: &ServiceConfig,
    http: reqwest::Client,
) -> Result<Components, ConfigError> {
    let incidents: Arc<dyn IncidentApi> = Arc::new(OpsgenieClient::new(
        http.clone(),
        &config.opsgenie.api_url,
        &config.opsgenie.team_id,
        config.opsgenie.token.clone(),
    )?);

    let commits = Arc::new(GitHubCommitClient::new(
        http,
        &config.github.api_url,
        config.github.token.clone(),
    )?);

    let oncall = &config.oncall;
    let pipeline = WebhookPipeline::new(
        SignatureVerifier::new(config.webhook.secret.clone()),
        RoutingPolicy::new(
            oncall.repositories.iter().cloned(),
            oncall.default_branch_ref.clone(),
            oncall.test_environment_prefix.clone(),
        ),
        IdentityResolver::new(
            oncall.users.clone(),
            oncall.automation_account.clone(),
            commits,
        ),
        RoutingRuleSynthesizer::new(Duration::from_secs(oncall.routing_rule_ttl_seconds)),
        EscalationGateway::new(incidents.clone(), config.opsgenie.owner_team.clone()),
    );

    Ok(Components {
        pipeline: Arc::new(pipeline),
        janitor: RoutingRuleJanitor::new(incidents),
    })
}
