use anyhow::{Result, Context};
use keyring::Entry;
use yup_oauth2::{InstalledFlowAuthenticator, InstalledFlowReturnMethod, ApplicationSecret, read_application_secret};
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use google_gmail1::oauth2;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use yup_oauth2::storage::{TokenStorage, TokenInfo};
use serde::{Serialize, Deserialize};
use async_trait::async_trait;
use tracing::{info, warn};

const APP_NAME: &str = "inbox-rules";
const TOKEN_KEY: &str = "gmail_token";

/// Reading messages and changing their labels needs nothing broader than `gmail.modify`.
pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.modify"];

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenData {
    tokens: Vec<TokenInfo>,
}

/// Keeps the OAuth token in the OS keyring instead of a file next to the binary.
pub struct RingStorage;

#[async_trait]
impl TokenStorage for RingStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> Result<()> {
        let entry = Entry::new(APP_NAME, TOKEN_KEY)
            .map_err(|e| anyhow::anyhow!("Keyring error: {}", e))?;

        let data = TokenData { tokens: vec![token] };

        let serialized = serde_json::to_string(&data)
            .context("Failed to serialize tokens")?;

        entry.set_password(&serialized)
            .map_err(|e| anyhow::anyhow!("Keyring error: {}", e))?;

        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        match self.get_all().await {
            Ok(data) => data.tokens.first().cloned(),
            Err(e) => {
                warn!("Could not read stored token: {}", e);
                None
            }
        }
    }
}

impl RingStorage {
    async fn get_all(&self) -> Result<TokenData> {
        let entry = Entry::new(APP_NAME, TOKEN_KEY)
            .map_err(|e| anyhow::anyhow!("Keyring error: {}", e))?;

        match entry.get_password() {
            Ok(serialized) => serde_json::from_str(&serialized)
                .context("Failed to deserialize tokens"),
            Err(keyring::Error::NoEntry) => Ok(TokenData::default()),
            Err(e) => Err(anyhow::anyhow!("Keyring error: {}", e)),
        }
    }

    pub async fn clear_token(&self) -> Result<()> {
        let entry = Entry::new(APP_NAME, TOKEN_KEY)
            .map_err(|e| anyhow::anyhow!("Keyring error: {}", e))?;

        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Keyring error: {}", e)),
        }
    }
}

/// Logs the consent URL and tries to open it in the default browser.
struct BrowserDelegate;

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            info!("Authorize access to Gmail at: {}", url);
            if let Err(e) = open::that(url) {
                warn!("Could not open a browser ({}); open the URL above manually", e);
            }
            // With HTTP redirect the code arrives on the local listener.
            Ok(String::new())
        })
    }
}

pub struct Authenticator;

impl Authenticator {
    pub async fn load_secret<P: AsRef<Path>>(path: P) -> Result<ApplicationSecret> {
        let path = path.as_ref();
        read_application_secret(path)
            .await
            .with_context(|| format!("Failed to read application secret from {}", path.display()))
    }

    pub async fn authenticate(secret: ApplicationSecret) -> Result<oauth2::authenticator::Authenticator<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>> {
        let auth = InstalledFlowAuthenticator::builder(
            secret,
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(RingStorage))
        .flow_delegate(Box::new(BrowserDelegate))
        .build()
        .await
        .context("Failed to build authenticator")?;

        // Run the consent flow now so a failure aborts before any work starts.
        auth.token(SCOPES).await.context("Failed to obtain an access token")?;

        Ok(auth)
    }
}
