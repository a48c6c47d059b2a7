use crate::db::Database;
use crate::gmail::{Mailbox, UNREAD_LABEL};
use crate::models::MessageRecord;
use crate::rules::Action;
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ApplyReport {
    pub fn merge(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

enum Outcome {
    Applied,
    Skipped,
}

/// Applies rule actions to matched messages, remote side first, then the local store.
pub struct ActionApplier<'a> {
    db: &'a Database,
    mailbox: &'a dyn Mailbox,
    inbox_label: &'a str,
    /// Lowercased label name -> remote label id.
    label_ids: HashMap<String, String>,
}

impl<'a> ActionApplier<'a> {
    pub fn new(db: &'a Database, mailbox: &'a dyn Mailbox, inbox_label: &'a str) -> Self {
        Self {
            db,
            mailbox,
            inbox_label,
            label_ids: HashMap::new(),
        }
    }

    /// Runs every action against every record, in order. A failure only affects the
    /// (record, action) pair it happened on.
    pub async fn apply(&mut self, records: &mut [MessageRecord], actions: &[Action]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for record in records.iter_mut() {
            for action in actions {
                match self.apply_one(record, action).await {
                    Ok(Outcome::Applied) => report.applied += 1,
                    Ok(Outcome::Skipped) => report.skipped += 1,
                    Err(e) => {
                        error!(
                            "Action {} failed for message {}: {:#}",
                            action.name(),
                            record.message_id,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }

    async fn apply_one(&mut self, record: &mut MessageRecord, action: &Action) -> Result<Outcome> {
        match action {
            Action::MarkAsRead => self.set_read(record, true).await,
            Action::MarkAsUnread => self.set_read(record, false).await,
            Action::MoveToLabel { label } => {
                let Some(label) = label.as_deref().map(str::trim).filter(|l| !l.is_empty()) else {
                    warn!("No label specified for move_to_label; skipping");
                    return Ok(Outcome::Skipped);
                };
                let label_id = self.ensure_label(label).await?;
                self.mailbox
                    .modify_labels(
                        &record.message_id,
                        &[label_id],
                        &[self.inbox_label.to_string()],
                    )
                    .await?;
                info!("Moved message to {}: {}", label, record.subject);
                Ok(Outcome::Applied)
            }
            Action::Unknown(name) => {
                warn!("Unknown action: {:?}", name);
                Ok(Outcome::Skipped)
            }
        }
    }

    async fn set_read(&self, record: &mut MessageRecord, is_read: bool) -> Result<Outcome> {
        if record.is_read == is_read {
            return Ok(Outcome::Skipped);
        }

        let unread = [UNREAD_LABEL.to_string()];
        if is_read {
            self.mailbox
                .modify_labels(&record.message_id, &[], &unread)
                .await?;
        } else {
            self.mailbox
                .modify_labels(&record.message_id, &unread, &[])
                .await?;
        }

        // The remote change already happened; a local failure leaves the two out of step
        // until the next successful run.
        self.db
            .update_is_read(&record.message_id, is_read)
            .await
            .context(format!(
                "Gmail updated but local store did not; message {} is out of sync",
                record.message_id
            ))?;
        record.is_read = is_read;

        info!(
            "Marked {}: {}",
            if is_read { "read" } else { "unread" },
            record.subject
        );
        Ok(Outcome::Applied)
    }

    /// Finds a label by case-insensitive name, creating it when Gmail has none.
    async fn ensure_label(&mut self, name: &str) -> Result<String> {
        let key = name.to_lowercase();
        if let Some(id) = self.label_ids.get(&key) {
            return Ok(id.clone());
        }

        let labels = self.mailbox.list_labels().await?;
        let id = match labels.into_iter().find(|l| l.name.to_lowercase() == key) {
            Some(label) => label.id,
            None => {
                info!("Creating label {}", name);
                self.mailbox.create_label(name).await?
            }
        };
        self.label_ids.insert(key, id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{record, temp_database};
    use crate::gmail::mock::{MockMailbox, ModifyCall};

    fn call(id: &str, add: &[&str], remove: &[&str]) -> ModifyCall {
        ModifyCall {
            id: id.to_string(),
            add: add.iter().map(|s| s.to_string()).collect(),
            remove: remove.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn mark_as_read_updates_remote_then_local() {
        let (_dir, db) = temp_database().await;
        db.insert(&record("a")).await.unwrap();
        let mailbox = MockMailbox::default();
        let mut records = vec![record("a")];

        let report = ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(&mut records, &[Action::MarkAsRead])
            .await;

        assert_eq!(report, ApplyReport { applied: 1, skipped: 0, failed: 0 });
        assert_eq!(mailbox.modify_calls(), vec![call("a", &[], &["UNREAD"])]);
        assert!(records[0].is_read);
        assert!(db.get("a").await.unwrap().unwrap().is_read);
    }

    #[tokio::test]
    async fn already_in_state_is_a_noop() {
        let (_dir, db) = temp_database().await;
        let mut read = record("a");
        read.is_read = true;
        db.insert(&read).await.unwrap();
        let mailbox = MockMailbox::default();
        let mut records = vec![read];

        let report = ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(&mut records, &[Action::MarkAsRead, Action::MarkAsRead])
            .await;

        assert_eq!(report.skipped, 2);
        assert!(mailbox.modify_calls().is_empty());
    }

    #[tokio::test]
    async fn mark_as_unread_adds_unread_label() {
        let (_dir, db) = temp_database().await;
        let mut read = record("a");
        read.is_read = true;
        db.insert(&read).await.unwrap();
        let mailbox = MockMailbox::default();
        let mut records = vec![read];

        ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(&mut records, &[Action::MarkAsUnread])
            .await;

        assert_eq!(mailbox.modify_calls(), vec![call("a", &["UNREAD"], &[])]);
        assert!(!db.get("a").await.unwrap().unwrap().is_read);
    }

    #[tokio::test]
    async fn move_to_label_reuses_existing_label_case_insensitively() {
        let (_dir, db) = temp_database().await;
        let mailbox = MockMailbox::default().with_labels(&[("L1", "Inbox"), ("L2", "Reports")]);
        let mut records = vec![record("a"), record("b")];

        let report = ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(
                &mut records,
                &[Action::MoveToLabel { label: Some("reports".to_string()) }],
            )
            .await;

        assert_eq!(report.applied, 2);
        assert!(mailbox.created_labels().is_empty());
        assert_eq!(*mailbox.label_list_calls.lock().unwrap(), 1);
        assert_eq!(
            mailbox.modify_calls(),
            vec![call("a", &["L2"], &["INBOX"]), call("b", &["L2"], &["INBOX"])]
        );
    }

    #[tokio::test]
    async fn move_to_label_creates_missing_label_once() {
        let (_dir, db) = temp_database().await;
        let mailbox = MockMailbox::default();
        let mut records = vec![record("a"), record("b")];

        ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(
                &mut records,
                &[Action::MoveToLabel { label: Some("Custom".to_string()) }],
            )
            .await;

        assert_eq!(mailbox.created_labels(), vec!["Custom".to_string()]);
        assert_eq!(mailbox.modify_calls().len(), 2);
    }

    #[tokio::test]
    async fn missing_label_and_unknown_action_are_skipped() {
        let (_dir, db) = temp_database().await;
        db.insert(&record("a")).await.unwrap();
        let mailbox = MockMailbox::default();
        let mut records = vec![record("a")];

        let report = ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(
                &mut records,
                &[
                    Action::MoveToLabel { label: None },
                    Action::MoveToLabel { label: Some("  ".to_string()) },
                    Action::Unknown("archive_forever".to_string()),
                    Action::MarkAsRead,
                ],
            )
            .await;

        assert_eq!(report, ApplyReport { applied: 1, skipped: 3, failed: 0 });
        assert_eq!(mailbox.modify_calls(), vec![call("a", &[], &["UNREAD"])]);
    }

    #[tokio::test]
    async fn remote_failure_is_isolated() {
        let (_dir, db) = temp_database().await;
        db.insert(&record("a")).await.unwrap();
        db.insert(&record("b")).await.unwrap();
        let mut mailbox = MockMailbox::default();
        mailbox.failing_modifies.insert("a".to_string());
        let mut records = vec![record("a"), record("b")];

        let report = ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(&mut records, &[Action::MarkAsRead])
            .await;

        assert_eq!(report, ApplyReport { applied: 1, skipped: 0, failed: 1 });
        assert!(!records[0].is_read);
        assert!(!db.get("a").await.unwrap().unwrap().is_read);
        assert!(db.get("b").await.unwrap().unwrap().is_read);
    }

    #[tokio::test]
    async fn local_failure_after_remote_success_is_reported() {
        let (_dir, db) = temp_database().await;
        let mailbox = MockMailbox::default();
        // Not in the store, so the local update cannot find it.
        let mut records = vec![record("ghost")];

        let report = ActionApplier::new(&db, &mailbox, "INBOX")
            .apply(&mut records, &[Action::MarkAsRead])
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(mailbox.modify_calls().len(), 1);
        assert!(!records[0].is_read);
    }
}
