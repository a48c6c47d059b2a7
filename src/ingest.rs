use crate::db::{Database, InsertOutcome};
use crate::gmail::{Mailbox, UNREAD_LABEL};
use crate::models::{MessageRecord, RemoteMessage};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub listed: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub failed: usize,
}

pub struct Ingestor<'a> {
    db: &'a Database,
    mailbox: &'a dyn Mailbox,
    label_id: &'a str,
}

impl<'a> Ingestor<'a> {
    pub fn new(db: &'a Database, mailbox: &'a dyn Mailbox, label_id: &'a str) -> Self {
        Self {
            db,
            mailbox,
            label_id,
        }
    }

    /// Pulls up to `max_results` messages from the folder and stores the ones not seen before.
    /// Every message is committed on its own; only a failed listing aborts the run.
    pub async fn fetch_and_store(&self, max_results: u32) -> Result<IngestReport> {
        let ids = self
            .mailbox
            .list_message_ids(self.label_id, max_results)
            .await
            .context(format!("Failed to list messages in {}", self.label_id))?;

        let mut report = IngestReport {
            listed: ids.len(),
            ..Default::default()
        };
        info!("Found {} messages to fetch", ids.len());

        for id in &ids {
            let remote = match self.mailbox.get_message(id).await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping message {}: {:#}", id, e);
                    report.failed += 1;
                    continue;
                }
            };

            let record = normalize(remote);
            match self.db.insert(&record).await {
                Ok(InsertOutcome::Created) => {
                    info!("Stored: {}", record.subject);
                    report.stored += 1;
                }
                Ok(InsertOutcome::AlreadyExists) => {
                    info!("Already stored: {}", record.subject);
                    report.duplicates += 1;
                }
                Err(e) => {
                    error!("Failed to store message {}: {}", record.message_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Ingestion finished: {} stored, {} already present, {} failed",
            report.stored, report.duplicates, report.failed
        );
        Ok(report)
    }
}

pub fn normalize(remote: RemoteMessage) -> MessageRecord {
    let header = |name: &str| remote.header(name).unwrap_or_default().to_string();

    MessageRecord {
        subject: header("subject"),
        sender: header("from"),
        recipient: header("to"),
        received_at: received_at_from_millis(remote.internal_date),
        is_read: !remote.label_ids.iter().any(|l| l == UNREAD_LABEL),
        snippet: remote.snippet.unwrap_or_default(),
        thread_id: remote.thread_id.unwrap_or_default(),
        message_id: remote.id,
    }
}

/// Missing or out-of-range values yield `None` rather than a bogus timestamp.
pub fn received_at_from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::<Utc>::from_timestamp_millis)
}
