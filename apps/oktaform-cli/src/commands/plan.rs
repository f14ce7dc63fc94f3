//! Show the mutations an apply would perform

use std::path::PathBuf;

use clap::Args;
use oktaform_core::{CancellationToken, Resource};

use crate::commands::Engine;
use crate::document::{self, DesiredDocument};
use crate::error::CliResult;
use crate::report::{EntityKind, EntityReport, RunReport};
use crate::state_file::{StateFile, DEFAULT_STATE_PATH};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the desired-state document
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Path to the state file
    #[arg(short = 's', long = "state", default_value = DEFAULT_STATE_PATH)]
    pub state: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the plan command
pub async fn execute(args: PlanArgs, cancel: CancellationToken) -> CliResult<()> {
    let document = document::load(&args.file)?;
    let state = StateFile::load(&args.state)?;
    let engine = Engine::from_env(document.provider.as_ref())?;

    let report = run(&engine, &document, &state, &cancel).await;
    report.finish(args.json)
}

/// Plan every declared entity, plus the destruction of state entries the
/// document no longer declares. Makes no mutating calls.
pub async fn run(
    engine: &Engine,
    document: &DesiredDocument,
    state: &StateFile,
    cancel: &CancellationToken,
) -> RunReport {
    let mut report = RunReport::new("plan");

    for desired in &document.rule_collections {
        let key = DesiredDocument::collection_key(desired);
        let prior = state.rule_collections.get(&key);
        let outcome = Resource::plan(&engine.rules, desired, prior, cancel).await;
        report.push(EntityReport::from_plan(EntityKind::RuleCollection, key, &outcome));
    }

    for desired in &document.users {
        let prior = state.users.get(&desired.login);
        let outcome = Resource::plan(&engine.users, desired, prior, cancel).await;
        report.push(EntityReport::from_plan(EntityKind::User, &desired.login, &outcome));
    }

    for key in orphaned_collections(document, state) {
        report.push(EntityReport::destroy(EntityKind::RuleCollection, key));
    }
    for key in orphaned_users(document, state) {
        report.push(EntityReport::destroy(EntityKind::User, key));
    }

    report
}

/// State keys of rule collections the document no longer declares.
pub fn orphaned_collections(document: &DesiredDocument, state: &StateFile) -> Vec<String> {
    let declared = document.collection_keys();
    state
        .rule_collections
        .keys()
        .filter(|k| !declared.contains(*k))
        .cloned()
        .collect()
}

/// State keys of users the document no longer declares.
pub fn orphaned_users(document: &DesiredDocument, state: &StateFile) -> Vec<String> {
    let declared = document.user_keys();
    state
        .users
        .keys()
        .filter(|k| !declared.contains(*k))
        .cloned()
        .collect()
}
