//! Mock Okta org using wiremock for client integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use oktaform_client::{OktaClient, OktaCredentials};

pub const TEST_TOKEN: &str = "00test-token";
pub const AUTHZ_SERVER: &str = "aus1";
pub const POLICY: &str = "pol1";

/// A wiremock server that answers Okta management API paths.
pub struct MockOktaServer {
    server: MockServer,
}

impl MockOktaServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Client authenticating with an SSWS API token.
    pub fn client(&self) -> OktaClient {
        OktaClient::with_http_client(
            self.uri(),
            OktaCredentials::ApiToken {
                token: TEST_TOKEN.to_string(),
            },
            reqwest::Client::new(),
        )
    }

    pub fn rules_path() -> String {
        format!("/api/v1/authorizationServers/{AUTHZ_SERVER}/policies/{POLICY}/rules")
    }

    /// Mount a single-page rule listing.
    pub async fn mock_list_rules(&self, rules: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(Self::rules_path()))
            .and(header("Authorization", format!("SSWS {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(rules)))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_get_user(&self, user: Value) {
        let id = user["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/users/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(user))
            .mount(&self.server)
            .await;
    }

    /// Every request answers with the given status and an Okta error body.
    pub async fn mock_error(&self, status: u16, code: &str, summary: &str) {
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "errorCode": code,
                "errorSummary": summary,
                "errorLink": code,
                "errorId": "oae123",
                "errorCauses": []
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_rate_limited(&self, retry_after: u64) {
        Mock::given(wiremock::matchers::any())
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after.to_string().as_str())
                    .set_body_json(json!({
                        "errorCode": "E0000047",
                        "errorSummary": "API call exceeded rate limit due to too many requests."
                    })),
            )
            .mount(&self.server)
            .await;
    }
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
            "scopes": { "include": ["openid"] },
            "people": {
                "users": { "include": [], "exclude": [] },
                "groups": { "include": ["EVERYONE"], "exclude": [] }
            }
        },
        "actions": {
            "token": {
                "accessTokenLifetimeMinutes": 60,
                "refreshTokenLifetimeMinutes": 0,
                "refreshTokenWindowMinutes": 10080
            }
        }
    })
}

/// A user as Okta returns it.
pub fn user_json(id: &str, login: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "transitioningToStatus": null,
        "created": "2024-01-01T00:00:00.000Z",
        "lastUpdated": "2024-01-02T00:00:00.000Z",
        "profile": {
            "login": login,
            "email": login,
            "firstName": "Test",
            "lastName": "User"
        },
        "credentials": { "password": {}, "provider": { "type": "OKTA", "name": "OKTA" } },
        "_links": { "self": { "href": format!("https://example.okta.com/api/v1/users/{id}") } }
    })
}
