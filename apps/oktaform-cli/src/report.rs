//! Per-entity results of a command, printed as text or JSON.

use oktaform_core::{Diagnostics, Outcome, PlanSummary};
use serde::Serialize;

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    RuleCollection,
    User,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::RuleCollection => "rule collection",
            EntityKind::User => "user",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub kind: EntityKind,
    pub id: String,
    pub changes: Vec<String>,
    pub diagnostics: Diagnostics,
}

impl EntityReport {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            changes: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn from_plan<P: PlanSummary>(
        kind: EntityKind,
        id: impl Into<String>,
        outcome: &Outcome<P>,
    ) -> Self {
        let mut report = Self::new(kind, id);
        if let Some(plan) = &outcome.value {
            report.changes = plan.changes();
        }
        report.diagnostics = outcome.diagnostics.clone();
        report
    }

    /// Planned removal of an entity no longer declared.
    pub fn destroy(kind: EntityKind, id: impl Into<String>) -> Self {
        let id = id.into();
        let mut report = Self::new(kind, id.clone());
        report.changes.push(format!("- destroy {} '{id}'", kind.label()));
        report
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub command: &'static str,
    pub entities: Vec<EntityReport>,
}

impl RunReport {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            entities: Vec::new(),
        }
    }

    pub fn push(&mut self, entity: EntityReport) {
        self.entities.push(entity);
    }

    pub fn change_count(&self) -> usize {
        self.entities.iter().map(|e| e.changes.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.entities.iter().map(|e| e.diagnostics.errors().count()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.entities
            .iter()
            .map(|e| e.diagnostics.warnings().count())
            .sum()
    }

    pub fn print_text(&self) {
        for entity in &self.entities {
            if entity.changes.is_empty() && entity.diagnostics.is_empty() {
                continue;
            }
            println!("{} '{}':", entity.kind.label(), entity.id);
            for change in &entity.changes {
                println!("  {change}");
            }
            for diag in entity.diagnostics.iter() {
                println!("  {diag}");
            }
        }

        let changes = self.change_count();
        if changes == 0 && self.error_count() == 0 {
            println!("No changes. Okta matches the desired state.");
        } else {
            println!(
                "{}: {changes} change(s), {} error(s), {} warning(s).",
                self.command,
                self.error_count(),
                self.warning_count()
            );
        }
    }

    /// Print the report, then fail with exit code 3 when any error was reported.
    pub fn finish(&self, json: bool) -> CliResult<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            self.print_text();
        }
        match self.error_count() {
            0 => Ok(()),
            count => Err(CliError::Diagnostics { count }),
        }
    }
}
