//! Shared request state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jobtrack_core::{
    ConfigStore, Database, DbConfig, DeliveryRepository, EmailRepository, InterviewRepository,
    MailSync,
};
use jobtrack_fetch::{Mailbox, ProcessTask};
use tokio::sync::Notify;
use tracing::{error, info};

use super::ApiError;

/// The three stores; one that failed to open stays `None` and its
/// endpoints answer 503.
#[derive(Clone, Default)]
pub struct Stores {
    /// Interview schedule.
    pub interviews: Option<Arc<InterviewRepository>>,
    /// Synchronized emails.
    pub emails: Option<Arc<EmailRepository>>,
    /// Application log.
    pub deliveries: Option<Arc<DeliveryRepository>>,
}

impl Stores {
    /// Opens every store under the configured data directory.
    pub async fn open(db: &DbConfig) -> Self {
        let dir = db.resolved_data_dir();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            error!(dir = %dir.display(), error = %e, "Cannot create data directory");
        }

        let stores = Self {
            interviews: opened(
                InterviewRepository::new(&path_str(db, Database::Interviews)).await,
                Database::Interviews,
            ),
            emails: opened(
                EmailRepository::new(&path_str(db, Database::Emails)).await,
                Database::Emails,
            ),
            deliveries: opened(
                DeliveryRepository::new(&path_str(db, Database::Deliveries)).await,
                Database::Deliveries,
            ),
        };
        info!(dir = %dir.display(), "Databases initialized");
        stores
    }
}

fn path_str(db: &DbConfig, database: Database) -> String {
    db.database_path(database).to_string_lossy().into_owned()
}

fn opened<T>(result: jobtrack_core::Result<T>, database: Database) -> Option<Arc<T>> {
    match result {
        Ok(repo) => Some(Arc::new(repo)),
        Err(e) => {
            error!(database = database.file_name(), error = %e, "Failed to open database");
            None
        }
    }
}

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Configuration store.
    pub config: Arc<ConfigStore>,
    /// Record stores.
    pub stores: Stores,
    /// Directory the HTML pages are served from.
    pub public_dir: PathBuf,
    /// Signalled by `POST /api/exit`.
    pub shutdown: Arc<Notify>,
    /// Lookup for the mailbox environment fallbacks.
    pub mailbox_env: fn(&str) -> Option<String>,
}

impl AppState {
    /// Bundles the pieces.
    pub fn new(config: Arc<ConfigStore>, stores: Stores, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            stores,
            public_dir: public_dir.into(),
            shutdown: Arc::new(Notify::new()),
            mailbox_env: process_env,
        }
    }

    pub(crate) fn interviews(&self) -> Result<&InterviewRepository, ApiError> {
        self.stores
            .interviews
            .as_deref()
            .ok_or(ApiError::Unavailable("Interview store"))
    }

    pub(crate) fn emails(&self) -> Result<&EmailRepository, ApiError> {
        self.stores
            .emails
            .as_deref()
            .ok_or(ApiError::Unavailable("Email store"))
    }

    pub(crate) fn deliveries(&self) -> Result<&DeliveryRepository, ApiError> {
        self.stores
            .deliveries
            .as_deref()
            .ok_or(ApiError::Unavailable("Delivery store"))
    }

    /// Sync service built from the current configuration.
    pub(crate) fn mail_sync(&self) -> MailSync<ProcessTask> {
        let snapshot = self.config.snapshot();
        MailSync::from_config(&snapshot, &self.config.base_dir())
    }

    /// Configured mailbox with environment fallbacks, then per-request
    /// header overrides.
    pub(crate) fn mailbox(&self, overrides: &MailboxOverrides) -> Mailbox {
        let mut mailbox = self
            .config
            .snapshot()
            .email
            .to_mailbox_with(self.mailbox_env);
        if let Some(address) = &overrides.address {
            mailbox.address.clone_from(address);
        }
        if let Some(secret) = &overrides.secret {
            mailbox.secret.clone_from(secret);
        }
        if let Some(host) = &overrides.host {
            mailbox.host.clone_from(host);
        }
        mailbox
    }

    pub(crate) fn page(&self, name: &str) -> PathBuf {
        self.public_dir.join(name)
    }

    pub(crate) fn public_root(&self) -> &Path {
        &self.public_dir
    }
}

fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Mailbox fields supplied by request headers.
#[derive(Debug, Default)]
pub struct MailboxOverrides {
    /// `X-Email-Address`.
    pub address: Option<String>,
    /// `X-Email-Password`.
    pub secret: Option<String>,
    /// `X-Imap-Server`.
    pub host: Option<String>,
}
