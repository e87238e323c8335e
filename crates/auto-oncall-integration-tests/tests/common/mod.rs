//! Shared harness for the end-to-end tests
//!
//! Runs the real router on an ephemeral port, with OpsGenie and GitHub
//! replaced by wiremock servers.

use auto_oncall_api::{
    build_components, build_http_client, create_router, AppState, ServiceConfig, ServiceMetrics,
    ShutdownReport,
};
use auto_oncall_core::webhook::compute_signature_header;
use auto_oncall_core::SecretString;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const SECRET: &str = "It's a Secret to Everybody";
pub const TEAM: &str = "team-42";
pub const AUTOMATION_ACCOUNT: &str = "taylorbot";

pub struct TestService {
    pub base_url: String,
    pub state: AppState,
    pub opsgenie: MockServer,
    pub github: MockServer,
    http: reqwest::Client,
    server: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestService {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with<F>(configure: F) -> Self
    where
        F: FnOnce(&mut ServiceConfig),
    {
        let opsgenie = MockServer::start().await;
        let github = MockServer::start().await;

        let mut config = ServiceConfig::default();
        config.webhook.secret = SecretString::new(SECRET);
        config.opsgenie.api_url = opsgenie.uri();
        config.opsgenie.team_id = TEAM.to_string();
        config.opsgenie.token = SecretString::new("genie-key");
        config.github.api_url = github.uri();
        config.github.token = SecretString::new("ghp_token");
        config.oncall.repositories = vec!["foo".to_string()];
        config.oncall.users = [
            ("alice".to_string(), "U1".to_string()),
            ("bob".to_string(), "U2".to_string()),
        ]
        .into();
        configure(&mut config);
        config.validate().expect("test configuration is valid");

        let http = build_http_client(&config).unwrap();
        let components = build_components(&config, http.clone()).unwrap();
        let state = AppState::new(config, components.pipeline, ServiceMetrics::new().unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{address}"),
            state,
            opsgenie,
            github,
            http,
            server,
        }
    }

    /// Deliver a correctly signed event
    pub async fn deliver(&self, event: &str, payload: &Value) -> reqwest::Response {
        let body = serde_json::to_vec(payload).unwrap();
        let signature = compute_signature_header(SECRET.as_bytes(), &body).unwrap();
        self.deliver_raw(event, &signature, body).await
    }

    pub async fn deliver_raw(&self, event: &str, signature: &str, body: Vec<u8>) -> reqwest::Response {
        self.http
            .post(format!("{}/webhook", self.base_url))
            .header("Content-Type", "application/json")
            .header("X-GitHub-Event", event)
            .header("X-GitHub-Delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
            .header("X-Hub-Signature", signature)
            .body(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, route: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{route}", self.base_url))
            .send()
            .await
            .unwrap()
    }

    /// Wait for every accepted delivery to finish processing
    pub async fn settle(&self) -> ShutdownReport {
        self.state.tasks.shutdown(Duration::from_secs(10)).await
    }

    pub fn outcome_count(&self, label: &str) -> u64 {
        self.state
            .metrics
            .pipeline_outcomes_total
            .with_label_values(&[label])
            .get()
    }

    pub async fn opsgenie_requests(&self) -> Vec<Request> {
        self.opsgenie.received_requests().await.unwrap_or_default()
    }

    pub async fn github_requests(&self) -> Vec<Request> {
        self.github.received_requests().await.unwrap_or_default()
    }

    /// Accept escalations, list no rules, and accept rule creation
    pub async fn mount_opsgenie_success(&self) {
        Mock::given(method("POST"))
            .and(path("/v2/escalations"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&self.opsgenie)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/teams/{TEAM}/routing-rules")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&self.opsgenie)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v2/teams/{TEAM}/routing-rules")))
            .respond_with(ResponseTemplate::new(201))
            .mount(&self.opsgenie)
            .await;
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Body of the first received request matching `method` and `path`
#[allow(dead_code)]
pub fn request_body(requests: &[Request], http_method: &str, route: &str) -> Option<Value> {
    requests
        .iter()
        .find(|r| r.method.as_str() == http_method && r.url.path() == route)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
}

#[allow(dead_code)]
pub fn push_payload(git_ref: &str, repository: &str, pusher: &str, head_commit: &str) -> Value {
    json!({
        "ref": git_ref,
        "before": "0000000000000000000000000000000000000000",
        "after": head_commit,
        "repository": {
            "id": 1296269,
            "name": repository,
            "full_name": format!("owner/{repository}"),
            "private": false
        },
        "pusher": { "name": pusher, "email": format!("{pusher}@example.com") },
        "head_commit": {
            "id": head_commit,
            "message": "Fix all the bugs",
            "timestamp": "2024-05-01T12:00:00Z"
        }
    })
}

#[allow(dead_code)]
pub fn deployment_payload(repository: &str, environment: &str, git_ref: &str, creator: &str) -> Value {
    json!({
        "action": "created",
        "deployment": {
            "id": 145988746,
            "sha": "a84d88e7554fc1fa21bcbc4efae3c782a70d2b9d",
            "ref": git_ref,
            "task": "deploy",
            "environment": environment,
            "creator": { "login": creator, "id": 21031067, "type": "User" }
        },
        "repository": {
            "id": 1296269,
            "name": repository,
            "full_name": format!("owner/{repository}"),
            "private": false
        }
    })
}
