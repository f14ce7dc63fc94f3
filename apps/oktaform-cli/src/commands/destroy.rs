//! Delete every entity a document manages

use std::path::PathBuf;

use clap::Args;
use oktaform_core::CancellationToken;

use crate::commands::apply::{remove, StateChange};
use crate::commands::Engine;
use crate::document::{self, DesiredDocument};
use crate::error::CliResult;
use crate::report::{EntityKind, RunReport};
use crate::state_file::{StateFile, DEFAULT_STATE_PATH};

#[derive(Args, Debug)]
pub struct DestroyArgs {
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

/// Execute the destroy command
pub async fn execute(args: DestroyArgs, cancel: CancellationToken) -> CliResult<()> {
    let document = document::load(&args.file)?;
    let mut state = StateFile::load(&args.state)?;
    let engine = Engine::from_env(document.provider.as_ref())?;

    let report = run(&engine, &document, &mut state, &cancel).await;
    state.save(&args.state)?;
    report.finish(args.json)
}

/// Delete the declared entities that have a state entry. Entities never
/// applied are skipped.
pub async fn run(
    engine: &Engine,
    document: &DesiredDocument,
    state: &mut StateFile,
    cancel: &CancellationToken,
) -> RunReport {
    let mut report = RunReport::new("destroy");

    for key in document.collection_keys() {
        let Some(prior) = state.rule_collections.get(&key).cloned() else {
            tracing::debug!(collection = %key, "Not in state, skipping");
            continue;
        };
        let (entity, change) =
            remove(&engine.rules, EntityKind::RuleCollection, &key, &prior, cancel).await;
        report.push(entity);
        if matches!(change, StateChange::Forget) {
            state.rule_collections.remove(&key);
        }
    }

    for key in document.user_keys() {
        let Some(prior) = state.users.get(&key).cloned() else {
            tracing::debug!(login = %key, "Not in state, skipping");
            continue;
        };
        let (entity, change) = remove(&engine.users, EntityKind::User, &key, &prior, cancel).await;
        report.push(entity);
        if matches!(change, StateChange::Forget) {
            state.users.remove(&key);
        }
    }

    report
}
