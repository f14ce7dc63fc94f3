//! Shared fixtures for CLI integration tests: a wiremock Okta org and
//! helpers to write documents and state files into a temp dir.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oktaform_cli::commands::Engine;
use oktaform_client::{OktaClient, OktaClientConfig, OktaCredentials};
use oktaform_core::CoreConfig;

pub const RULES_PATH: &str = "/api/v1/authorizationServers/aus1/policies/pol1/rules";

pub struct TestContext {
    pub server: MockServer,
    pub dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn engine(&self) -> Engine {
        let client = OktaClient::new(OktaClientConfig::new(
            self.server.uri(),
            OktaCredentials::ApiToken {
                token: "00test-token".into(),
            },
        ))
        .expect("client");
        Engine::new(Arc::new(client), &CoreConfig::default())
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("oktaform.state.json")
    }

    /// Answer rule listings with `rules`, for at most `times` requests when set.
    pub async fn mock_list_rules(&self, rules: Vec<Value>, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(RULES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(rules)));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(&self.server).await,
            None => mock.mount(&self.server).await,
        }
    }

    pub async fn mock_create_rule(&self, created: Value) {
        Mock::given(method("POST"))
            .and(path(RULES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(created))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_user(&self, user: Value) {
        let id = user["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/users/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(user))
            .mount(&self.server)
            .await;
        for sub in ["roles", "groups"] {
            Mock::given(method("GET"))
                .and(path(format!("/api/v1/users/{id}/{sub}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(&self.server)
                .await;
        }
    }

    pub async fn mock_forbidden(&self) {
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "errorCode": "E0000006",
                "errorSummary": "You do not have permission to perform the requested action",
                "errorLink": "E0000006",
                "errorId": "oae403",
                "errorCauses": []
            })))
            .mount(&self.server)
            .await;
    }

    /// Requests the mock received, as `METHOD path`.
    pub async fn requests(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }
}

pub fn system_rule() -> Value {
    rule_json("0prSystem", "Default Policy Rule", 99, true)
}

/// A rule as Okta returns it.
pub fn rule_json(id: &str, name: &str, priority: i64, system: bool) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "RESOURCE_ACCESS",
        "priority": priority,
        "status": "ACTIVE",
        "system": system,
        "conditions": {
            "grantTypes": { "include": ["authorization_code"] },
            "scopes": { "include": ["*"] },
            "people": {
                "users": { "include": [], "exclude": [] },
                "groups": { "include": ["EVERYONE"], "exclude": [] }
            }
        },
        "actions": { "token": {} }
    })
}

pub fn user_json(id: &str, login: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "created": "2024-01-01T00:00:00.000Z",
        "lastUpdated": "2024-01-02T00:00:00.000Z",
        "profile": {
            "login": login,
            "email": login,
            "firstName": "Ada",
            "lastName": "Lovelace"
        },
        "credentials": { "provider": { "type": "OKTA", "name": "OKTA" } },
        "_links": {}
    })
}

pub const ONE_RULE_DOCUMENT: &str = r#"
version: "1"
rule_collections:
  - authorization_server_id: aus1
    policy_id: pol1
    rules:
      - name: web
        priority: 1
        grant_type_whitelist: [authorization_code]
"#;
