//! In-memory [`IncidentApi`] that behaves like the remote system.

use super::{
    EscalationRequest, GatewayError, IncidentApi, RemoteRoutingRule, RoutingRuleRequest,
};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    escalations: BTreeSet<String>,
    rules: Vec<RemoteRoutingRule>,
    calls: Vec<String>,
    next_id: usize,
}

#[derive(Default)]
pub(crate) struct FakeIncidentApi {
    state: Mutex<State>,
    fail_escalation_status: Option<u16>,
    fail_delete_ids: HashSet<String>,
}

impl FakeIncidentApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answer every `create_escalation` with `status`
    pub(crate) fn failing_escalations(status: u16) -> Self {
        Self {
            fail_escalation_status: Some(status),
            ..Self::default()
        }
    }

    /// Fail `delete_routing_rule` for the given ids
    pub(crate) fn with_failing_deletes<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.fail_delete_ids = ids.into_iter().collect();
        self
    }

    pub(crate) fn seed_rule(&self, name: &str, is_default: bool) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("rule-{}", state.next_id);
        state.rules.push(RemoteRoutingRule {
            id: id.clone(),
            name: name.to_string(),
            is_default,
            criteria: serde_json::Value::Null,
        });
        id
    }

    pub(crate) fn seed_escalation(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .escalations
            .insert(name.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn rule_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.rules.iter().map(|r| r.name.clone()).collect()
    }

    pub(crate) fn escalation_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.escalations.iter().cloned().collect()
    }
}

#[async_trait]
impl IncidentApi for FakeIncidentApi {
    async fn create_escalation(&self, request: &EscalationRequest) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_escalation:{}", request.name));

        if let Some(status) = self.fail_escalation_status {
            return Err(GatewayError::UnexpectedResponseCode {
                operation: "create escalation",
                status,
            });
        }

        // 201 for new, 409 for existing; both are success
        state.escalations.insert(request.name.clone());
        Ok(())
    }

    async fn list_routing_rules(&self) -> Result<Vec<RemoteRoutingRule>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_routing_rules".to_string());
        Ok(state.rules.clone())
    }

    async fn create_routing_rule(&self, request: &RoutingRuleRequest) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_routing_rule:{}", request.name));

        if !state.escalations.contains(&request.notify.name) {
            return Err(GatewayError::UnexpectedResponseCode {
                operation: "create routing rule",
                status: 422,
            });
        }

        state.next_id += 1;
        let id = format!("rule-{}", state.next_id);
        state.rules.push(RemoteRoutingRule {
            id,
            name: request.name.clone(),
            is_default: false,
            criteria: serde_json::to_value(&request.criteria).unwrap(),
        });
        Ok(())
    }

    async fn delete_routing_rule(&self, id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_routing_rule:{id}"));

        if self.fail_delete_ids.contains(id) {
            return Err(GatewayError::ExecutionFailed {
                operation: "delete routing rule",
                message: "connection reset".to_string(),
            });
        }

        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        if state.rules.len() == before {
            return Err(GatewayError::UnexpectedResponseCode {
                operation: "delete routing rule",
                status: 404,
            });
        }
        Ok(())
    }

    async fn delete_escalation(&self, name: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_escalation:{name}"));

        if state.escalations.remove(name) {
            Ok(())
        } else {
            Err(GatewayError::UnexpectedResponseCode {
                operation: "delete escalation",
                status: 404,
            })
        }
    }
}
