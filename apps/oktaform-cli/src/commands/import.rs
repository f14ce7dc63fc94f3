//! Bring existing Okta entities under management

use std::path::PathBuf;

use clap::{Args, Subcommand};
use oktaform_core::{CancellationToken, Resource};

use crate::commands::Engine;
use crate::document;
use crate::error::{CliError, CliResult};
use crate::report::{EntityKind, EntityReport, RunReport};
use crate::state_file::{StateFile, DEFAULT_STATE_PATH};

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(subcommand)]
    pub target: ImportTarget,

    /// Path to the state file
    #[arg(short = 's', long = "state", default_value = DEFAULT_STATE_PATH, global = true)]
    pub state: PathBuf,

    /// Desired-state document to read provider settings from
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ImportTarget {
    /// Every rule of a policy, as <authorization-server-id>/<policy-id>
    Rules { id: String },

    /// One user, by ID, login or email
    User { id: String },
}

/// Execute the import command
pub async fn execute(args: ImportArgs, cancel: CancellationToken) -> CliResult<()> {
    let provider = match &args.file {
        Some(path) => document::load(path)?.provider,
        None => None,
    };
    let mut state = StateFile::load(&args.state)?;
    let engine = Engine::from_env(provider.as_ref())?;

    let report = run(&engine, &args.target, &mut state, &cancel).await?;
    if report.error_count() == 0 {
        state.save(&args.state)?;
    }
    report.finish(args.json)
}

/// Import `target` into `state`. Importing an entity already in state is
/// refused.
pub async fn run(
    engine: &Engine,
    target: &ImportTarget,
    state: &mut StateFile,
    cancel: &CancellationToken,
) -> CliResult<RunReport> {
    let mut report = RunReport::new("import");

    match target {
        ImportTarget::Rules { id } => {
            if state.rule_collections.contains_key(id) {
                return Err(already_managed(EntityKind::RuleCollection, id));
            }
            let outcome = Resource::import(&engine.rules, id, cancel).await;
            let mut entity = EntityReport::new(EntityKind::RuleCollection, id);
            entity.diagnostics = outcome.diagnostics;
            if let (Some(imported), false) = (outcome.value, entity.has_errors()) {
                entity.changes.push(format!(
                    "+ import rule collection '{}' ({} rule(s))",
                    imported.id,
                    imported.rules.len()
                ));
                state.rule_collections.insert(imported.id.clone(), imported);
            }
            report.push(entity);
        }
        ImportTarget::User { id } => {
            let outcome = Resource::import(&engine.users, id, cancel).await;
            let mut entity = EntityReport::new(EntityKind::User, id);
            entity.diagnostics = outcome.diagnostics;
            if let (Some(imported), false) = (outcome.value, entity.has_errors()) {
                let key = StateFile::user_key(&imported);
                if state.users.contains_key(&key) {
                    return Err(already_managed(EntityKind::User, &key));
                }
                entity.changes.push(format!("+ import user '{key}' ({})", imported.id));
                entity.id = key.clone();
                state.users.insert(key, imported);
            }
            report.push(entity);
        }
    }

    Ok(report)
}

fn already_managed(kind: EntityKind, key: &str) -> CliError {
    CliError::Validation(format!(
        "{} '{key}' is already in the state file",
        kind.label()
    ))
}
