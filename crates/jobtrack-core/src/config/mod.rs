//! Application configuration.
//!
//! One JSON document with a `db`, an `email` and a `fetch` section. Missing
//! fields take their defaults; updates merge per section.

mod model;
mod store;

pub use model::{
    AppConfig, Database, DbConfig, EMAIL_DB_ENV, FetchConfig, MAILBOX_ENV_FALLBACKS, MailboxConfig,
};
pub use store::ConfigStore;
