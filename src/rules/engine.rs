use super::predicate::evaluate_at;
use super::{MatchMode, Rule};
use crate::actions::{ActionApplier, ApplyReport};
use crate::db::Database;
use crate::gmail::Mailbox;
use crate::models::MessageRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub rules: usize,
    pub matched: usize,
    pub actions: ApplyReport,
}

pub struct RuleEngine<'a> {
    db: &'a Database,
    mailbox: &'a dyn Mailbox,
    inbox_label: &'a str,
}

impl<'a> RuleEngine<'a> {
    pub fn new(db: &'a Database, mailbox: &'a dyn Mailbox, inbox_label: &'a str) -> Self {
        Self {
            db,
            mailbox,
            inbox_label,
        }
    }

    /// Evaluates each rule against a fresh snapshot of the store, so changes made by one
    /// rule's actions are visible to the rules after it.
    pub async fn run(&self, rules: &[Rule]) -> Result<RunSummary> {
        let mut applier = ActionApplier::new(self.db, self.mailbox, self.inbox_label);
        let mut summary = RunSummary::default();

        for rule in rules {
            info!("Applying rule: {} ({})", rule.name, rule.match_mode);
            summary.rules += 1;

            if rule.conditions.is_empty() {
                warn!(
                    "Rule {} has no conditions; {} matches {}",
                    rule.name,
                    rule.match_mode,
                    if rule.match_mode == MatchMode::All { "every message" } else { "nothing" }
                );
            }

            let records = self
                .db
                .list_all()
                .await
                .context("Failed to load stored messages")?;
            let now = Utc::now();
            let mut matches: Vec<MessageRecord> = records
                .into_iter()
                .filter(|record| rule_matches(rule, record, now))
                .collect();
            info!("  {} matches", matches.len());
            summary.matched += matches.len();

            let report = applier.apply(&mut matches, &rule.actions).await;
            summary.actions.merge(report);
        }

        info!(
            "Processed {} rules: {} matches, {} actions applied, {} skipped, {} failed",
            summary.rules,
            summary.matched,
            summary.actions.applied,
            summary.actions.skipped,
            summary.actions.failed
        );
        Ok(summary)
    }
}

/// Every condition is evaluated; one that fails to evaluate counts as a non-match.
pub fn rule_matches(rule: &Rule, record: &MessageRecord, now: DateTime<Utc>) -> bool {
    let results: Vec<bool> = rule
        .conditions
        .iter()
        .map(|condition| match evaluate_at(record, condition, now) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(
                    "Rule {}: condition on {:?} not evaluated: {}",
                    rule.name, condition.field, e
                );
                false
            }
        })
        .collect();
    rule.match_mode.combine(results)
}
