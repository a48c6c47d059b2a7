use crate::auth::Authenticator;
use crate::config::Settings;
use crate::models;
use anyhow::{Context, Result};
use async_trait::async_trait;
use google_gmail1::Gmail;
use google_gmail1::api::Scope;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use tracing::debug;

pub const UNREAD_LABEL: &str = "UNREAD";

/// The remote operations the ingestion pipeline and the action applier need.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn list_message_ids(&self, label_id: &str, max_results: u32) -> Result<Vec<String>>;

    async fn get_message(&self, id: &str) -> Result<models::RemoteMessage>;

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;

    async fn list_labels(&self) -> Result<Vec<models::Label>>;

    /// Creates a user label and returns its id.
    async fn create_label(&self, name: &str) -> Result<String>;
}

/// An authenticated Gmail session. Acquired once per command with [`GmailClient::connect`]
/// and released when dropped.
#[derive(Clone)]
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailClient {
    pub fn new(hub: Gmail<HttpsConnector<HttpConnector>>) -> Self {
        Self { hub }
    }

    pub async fn connect(settings: &Settings) -> Result<Self> {
        let secret = Authenticator::load_secret(&settings.credentials_path).await?;
        let auth = Authenticator::authenticate(secret).await?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native roots")?
            .https_only()
            .enable_http1()
            .build();
        let hub = Gmail::new(hyper::Client::builder().build(connector), auth);

        Ok(Self::new(hub))
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_message_ids(&self, label_id: &str, max_results: u32) -> Result<Vec<String>> {
        let (_, message_list) = self
            .hub
            .users()
            .messages_list("me")
            .add_label_ids(label_id)
            .max_results(max_results)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Failed to list messages")?;

        let ids = message_list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<models::RemoteMessage> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context(format!("Failed to get message {}", id))?;

        let headers = msg
            .payload
            .and_then(|p| p.headers)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| {
                Some(models::Header {
                    name: h.name?,
                    value: h.value.unwrap_or_default(),
                })
            })
            .collect();

        Ok(models::RemoteMessage {
            id: msg.id.unwrap_or_else(|| id.to_string()),
            thread_id: msg.thread_id,
            headers,
            snippet: msg.snippet,
            internal_date: msg.internal_date,
            label_ids: msg.label_ids.unwrap_or_default(),
        })
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        debug!(message_id = id, ?add, ?remove, "Modifying labels");
        let req = google_gmail1::api::ModifyMessageRequest {
            add_label_ids: (!add.is_empty()).then(|| add.to_vec()),
            remove_label_ids: (!remove.is_empty()).then(|| remove.to_vec()),
            ..Default::default()
        };
        self.hub
            .users()
            .messages_modify(req, "me", id)
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context(format!("Failed to modify labels on message {}", id))?;
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<models::Label>> {
        let (_, label_list) = self
            .hub
            .users()
            .labels_list("me")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context("Failed to list labels")?;

        let labels = label_list
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| models::Label {
                id: l.id.unwrap_or_default(),
                name: l.name.unwrap_or_default(),
            })
            .collect();

        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let label = google_gmail1::api::Label {
            name: Some(name.to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
            ..Default::default()
        };
        let (_, created) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope(Scope::Modify)
            .doit()
            .await
            .context(format!("Failed to create label {}", name))?;

        created
            .id
            .context(format!("Gmail returned no id for new label {}", name))
    }
}
