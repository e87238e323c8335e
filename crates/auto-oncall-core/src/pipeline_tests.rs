use super::*;
use crate::gateway::fake::FakeIncidentApi;
use crate::gateway::DEFAULT_OWNER_TEAM;
use crate::identity::{LookupError, MockCommitAuthorLookup};
use crate::webhook::{compute_signature_header, WebhookHeaders};
use crate::SecretString;
use bytes::Bytes;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const SECRET: &str = "hook-secret";

fn users() -> HashMap<String, String> {
    HashMap::from([
        ("alice".to_string(), "U1".to_string()),
        ("bob".to_string(), "U2".to_string()),
    ])
}

fn pipeline_with(api: Arc<FakeIncidentApi>, lookup: MockCommitAuthorLookup) -> WebhookPipeline {
    WebhookPipeline::new(
        SignatureVerifier::new(SecretString::new(SECRET)),
        RoutingPolicy::with_defaults(["foo"]),
        IdentityResolver::new(users(), "taylorbot", Arc::new(lookup)),
        RoutingRuleSynthesizer::default(),
        EscalationGateway::new(api, DEFAULT_OWNER_TEAM),
    )
}

fn no_lookup() -> MockCommitAuthorLookup {
    let mut lookup = MockCommitAuthorLookup::new();
    lookup.expect_commit_author().never();
    lookup
}

fn request(event_type: &str, body: &serde_json::Value) -> WebhookRequest {
    let body = serde_json::to_vec(body).unwrap();
    let signature = compute_signature_header(SECRET.as_bytes(), &body).unwrap();
    let headers = WebhookHeaders::from_http_headers(&HashMap::from([
        ("x-github-event".to_string(), event_type.to_string()),
        (
            "x-github-delivery".to_string(),
            "72d3162e-cc78-11e3-81ab-4c9367dc0958".to_string(),
        ),
        ("x-hub-signature".to_string(), signature),
    ]))
    .unwrap();
    WebhookRequest::new(headers, Bytes::from(body))
}

fn push_body(git_ref: &str, pusher: &str) -> serde_json::Value {
    json!({
        "ref": git_ref,
        "repository": { "name": "foo", "full_name": "owner/foo" },
        "pusher": { "name": pusher },
        "head_commit": { "id": "abcdef1234567890" }
    })
}

fn deployment_body(environment: &str, creator: &str) -> serde_json::Value {
    json!({
        "deployment": {
            "ref": "v1.2.3",
            "environment": environment,
            "creator": { "login": creator }
        },
        "repository": { "name": "bar", "full_name": "owner/bar" }
    })
}

async fn run(pipeline: &WebhookPipeline, request: WebhookRequest) -> PipelineOutcome {
    let envelope = pipeline.accept(request).unwrap().unwrap();
    pipeline.process(envelope).await
}

#[tokio::test]
async fn test_push_to_master_creates_routing_rule() {
    let api = Arc::new(FakeIncidentApi::new());
    let pipeline = pipeline_with(api.clone(), no_lookup());

    let outcome = run(&pipeline, request("push", &push_body("refs/heads/master", "alice"))).await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Submitted(EnsureOutcome::Created)
    ));
    assert_eq!(outcome.label(), "created");

    let names = api.rule_names();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("auto-foo-abcde-alice-"));
}

#[tokio::test]
async fn test_push_to_other_branch_is_dropped_without_remote_calls() {
    let api = Arc::new(FakeIncidentApi::new());
    let pipeline = pipeline_with(api.clone(), no_lookup());

    let outcome = run(&pipeline, request("push", &push_body("refs/heads/develop", "alice"))).await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Dropped(DropReason::NonDefaultBranch { .. })
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_automation_deployment_pages_commit_author() {
    let api = Arc::new(FakeIncidentApi::new());
    let mut lookup = MockCommitAuthorLookup::new();
    lookup
        .expect_commit_author()
        .times(1)
        .returning(|_, _| Ok("bob".to_string()));
    let pipeline = pipeline_with(api.clone(), lookup);

    let outcome = run(
        &pipeline,
        request("deployment", &deployment_body("prod-eu", "taylorbot")),
    )
    .await;

    assert!(matches!(outcome, PipelineOutcome::Submitted(_)));
    let names = api.rule_names();
    assert!(names[0].starts_with("auto-bar-v1.2.3-bob-"));
}

#[tokio::test]
async fn test_test_environment_deployment_is_dropped() {
    let api = Arc::new(FakeIncidentApi::new());
    let pipeline = pipeline_with(api.clone(), no_lookup());

    let outcome = run(
        &pipeline,
        request("deployment", &deployment_body("g-staging", "alice")),
    )
    .await;

    assert!(matches!(
        outcome,
        PipelineOutcome::Dropped(DropReason::TestEnvironment { .. })
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_unmapped_actor_halts_before_remote_calls() {
    let api = Arc::new(FakeIncidentApi::new());
    let pipeline = pipeline_with(api.clone(), no_lookup());

    let outcome = run(&pipeline, request("push", &push_body("refs/heads/master", "mallory"))).await;

    match &outcome {
        PipelineOutcome::Halted(e) => assert_eq!(e.stage, PipelineStage::Resolved),
        other => panic!("expected halt, got {other:?}"),
    }
    assert_eq!(outcome.label(), "user_not_found");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_commit_lookup_failure_halts_at_resolution() {
    let api = Arc::new(FakeIncidentApi::new());
    let mut lookup = MockCommitAuthorLookup::new();
    lookup.expect_commit_author().returning(|_, _| {
        Err(LookupError::ExecutionFailed {
            message: "connection refused".to_string(),
        })
    });
    let pipeline = pipeline_with(api.clone(), lookup);

    let outcome = run(
        &pipeline,
        request("deployment", &deployment_body("prod-eu", "taylorbot")),
    )
    .await;

    assert_eq!(outcome.label(), "failed");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_halts_at_decode() {
    let api = Arc::new(FakeIncidentApi::new());
    let pipeline = pipeline_with(api.clone(), no_lookup());

    let outcome = run(&pipeline, request("push", &json!({ "zen": "Keep it logically awesome." }))).await;

    match outcome {
        PipelineOutcome::Halted(e) => {
            assert_eq!(e.stage, PipelineStage::Decoded);
            assert!(matches!(e.cause, PipelineFailure::Webhook(_)));
        }
        other => panic!("expected halt, got {other:?}"),
    }
}

#[tokio::test]
async fn test_gateway_failure_halts_at_submission() {
    let api = Arc::new(FakeIncidentApi::failing_escalations(503));
    let pipeline = pipeline_with(api.clone(), no_lookup());

    let outcome = run(&pipeline, request("push", &push_body("refs/heads/master", "alice"))).await;

    match outcome {
        PipelineOutcome::Halted(e) => assert_eq!(e.stage, PipelineStage::Submitted),
        other => panic!("expected halt, got {other:?}"),
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_gateway_failure_log_carries_repository_and_actor() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let api = Arc::new(FakeIncidentApi::failing_escalations(500));
    let pipeline = pipeline_with(api, no_lookup());

    let outcome = run(&pipeline, request("push", &push_body("refs/heads/master", "alice"))).await;
    assert!(matches!(outcome, PipelineOutcome::Halted(_)));

    let failure = logs
        .contents()
        .lines()
        .find(|line| line.contains("Webhook pipeline failed"))
        .map(str::to_string)
        .unwrap();
    assert!(failure.contains("repository=owner/foo"), "{failure}");
    assert!(failure.contains("actor=alice"), "{failure}");
    assert!(failure.contains("stage="), "{failure}");
}

#[test]
fn test_bad_signature_is_rejected() {
    let pipeline = pipeline_with(Arc::new(FakeIncidentApi::new()), no_lookup());
    let mut request = request("push", &push_body("refs/heads/master", "alice"));
    request.body = Bytes::from_static(b"{\"tampered\":true}");

    let err = pipeline.accept(request).unwrap_err();
    assert!(matches!(err, WebhookError::InvalidSignature));
}

#[test]
fn test_unsupported_event_is_acknowledged_and_ignored() {
    let pipeline = pipeline_with(Arc::new(FakeIncidentApi::new()), no_lookup());

    let accepted = pipeline
        .accept(request("ping", &json!({ "zen": "Design for failure." })))
        .unwrap();
    assert!(accepted.is_none());
}
