#![allow(dead_code)]

pub mod fake_tenant;

use std::sync::Arc;

use oktaform_core::{
    CoreConfig, DesiredCollection, DesiredRule, RetryHarness, RetryPolicy,
    RuleCollectionReconciler, TokioClock, UserReconciler,
};

use fake_tenant::{FakeTenant, AUTHZ_SERVER, POLICY};

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

/// Rule reconciler over `tenant` with jitter off, so backoff timing is exact.
pub fn rule_reconciler(tenant: &Arc<FakeTenant>) -> RuleCollectionReconciler {
    let config = CoreConfig::default();
    let harness = RetryHarness::new(
        RetryPolicy::from_config(&config).without_jitter(),
        Arc::new(TokioClock),
    );
    RuleCollectionReconciler::with_harness(tenant.clone(), harness, config.page_size())
}

pub fn user_reconciler(tenant: &Arc<FakeTenant>) -> UserReconciler {
    UserReconciler::new(tenant.clone(), &CoreConfig::default(), Arc::new(TokioClock))
}

pub fn rule(name: &str, priority: i64, grant_type: &str) -> DesiredRule {
    DesiredRule::new(name, priority, &[grant_type])
}

pub fn collection(rules: Vec<DesiredRule>) -> DesiredCollection {
    DesiredCollection {
        authorization_server_id: AUTHZ_SERVER.into(),
        policy_id: POLICY.into(),
        rules,
    }
}

/// The three rules of the basic create scenario.
pub fn three_rules() -> Vec<DesiredRule> {
    vec![
        rule("r1", 10, "password"),
        rule("r2", 20, "authorization_code"),
        rule("r3", 30, "refresh_token"),
    ]
}
