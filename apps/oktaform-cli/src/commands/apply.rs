//! Apply a desired-state document

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use oktaform_core::{CancellationToken, Resource};

use crate::commands::plan::{orphaned_collections, orphaned_users};
use crate::commands::Engine;
use crate::document::{self, DesiredDocument};
use crate::error::CliResult;
use crate::report::{EntityKind, EntityReport, RunReport};
use crate::state_file::{StateFile, DEFAULT_STATE_PATH};

#[derive(Args, Debug)]
pub struct ApplyArgs {
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

/// Execute the apply command
pub async fn execute(args: ApplyArgs, cancel: CancellationToken) -> CliResult<()> {
    let document = document::load(&args.file)?;
    let mut state = StateFile::load(&args.state)?;
    let engine = Engine::from_env(document.provider.as_ref())?;

    let report = run(&engine, &document, &mut state, &cancel).await;

    // Saved even on failure: state must reflect what was applied remotely.
    state.save(&args.state)?;
    report.finish(args.json)
}

/// What to do with an entity's state entry after an operation.
#[derive(Debug)]
pub enum StateChange<S> {
    Keep,
    Store(S),
    Forget,
}

/// Plan, then create or update one entity.
///
/// An entity whose plan fails is left untouched.
pub async fn converge<R: Resource>(
    resource: &R,
    kind: EntityKind,
    key: &str,
    desired: &R::Desired,
    prior: Option<&R::State>,
    cancel: &CancellationToken,
) -> (EntityReport, StateChange<R::State>) {
    let planned = resource.plan(desired, prior, cancel).await;
    let mut report = EntityReport::from_plan(kind, key, &planned);
    if planned.has_errors() {
        return (report, StateChange::Keep);
    }

    let outcome = match prior {
        Some(prior) => resource.update(desired, prior, cancel).await,
        None => resource.create(desired, cancel).await,
    };
    let failed = outcome.has_errors();
    report.diagnostics.extend(outcome.diagnostics);

    let change = match outcome.value {
        Some(state) => StateChange::Store(state),
        None if !failed => StateChange::Forget,
        None => StateChange::Keep,
    };
    (report, change)
}

/// Delete one entity that is no longer declared.
pub async fn remove<R: Resource>(
    resource: &R,
    kind: EntityKind,
    key: &str,
    prior: &R::State,
    cancel: &CancellationToken,
) -> (EntityReport, StateChange<R::State>) {
    let mut report = EntityReport::destroy(kind, key);
    report.diagnostics = resource.delete(prior, cancel).await;
    let change = if report.has_errors() {
        StateChange::Keep
    } else {
        StateChange::Forget
    };
    (report, change)
}

fn record<S>(entries: &mut BTreeMap<String, S>, key: String, change: StateChange<S>) {
    match change {
        StateChange::Keep => {}
        StateChange::Store(state) => {
            entries.insert(key, state);
        }
        StateChange::Forget => {
            entries.remove(&key);
        }
    }
}

/// Converge every declared entity and delete undeclared ones, updating
/// `state` as each entity finishes.
pub async fn run(
    engine: &Engine,
    document: &DesiredDocument,
    state: &mut StateFile,
    cancel: &CancellationToken,
) -> RunReport {
    let mut report = RunReport::new("apply");

    // Users first: rules may name them in their people conditions.
    for desired in &document.users {
        let key = desired.login.clone();
        let prior = state.users.get(&key).cloned();
        let (entity, change) = converge(
            &engine.users,
            EntityKind::User,
            &key,
            desired,
            prior.as_ref(),
            cancel,
        )
        .await;
        report.push(entity);
        record(&mut state.users, key, change);
    }

    for desired in &document.rule_collections {
        let key = DesiredDocument::collection_key(desired);
        let prior = state.rule_collections.get(&key).cloned();
        let (entity, change) = converge(
            &engine.rules,
            EntityKind::RuleCollection,
            &key,
            desired,
            prior.as_ref(),
            cancel,
        )
        .await;
        report.push(entity);
        record(&mut state.rule_collections, key, change);
    }

    for key in orphaned_collections(document, state) {
        let Some(prior) = state.rule_collections.get(&key).cloned() else {
            continue;
        };
        let (entity, change) =
            remove(&engine.rules, EntityKind::RuleCollection, &key, &prior, cancel).await;
        report.push(entity);
        record(&mut state.rule_collections, key, change);
    }

    for key in orphaned_users(document, state) {
        let Some(prior) = state.users.get(&key).cloned() else {
            continue;
        };
        let (entity, change) = remove(&engine.users, EntityKind::User, &key, &prior, cancel).await;
        report.push(entity);
        record(&mut state.users, key, change);
    }

    tracing::info!(
        changes = report.change_count(),
        errors = report.error_count(),
        "Apply finished"
    );
    report
}
