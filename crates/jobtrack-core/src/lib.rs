//! # jobtrack-core
//!
//! Storage, configuration and mail synchronization for `jobtrack`.
//!
//! This crate provides:
//! - The JSON configuration store with per-section merge
//! - The deduplicating email store (`SQLite`)
//! - Interview schedule and application log repositories
//! - The sync service that runs the external fetch task and recovers its counts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod db;
pub mod delivery;
pub mod email;
mod error;
pub mod interview;
pub mod sync;
pub mod time;

pub use config::{
    AppConfig, ConfigStore, Database, DbConfig, EMAIL_DB_ENV, FetchConfig, MailboxConfig,
};
pub use delivery::{Delivery, DeliveryRepository, NewDelivery};
pub use email::{EmailRecord, EmailRepository, EmailStats, MergeReport, NewEmail};
pub use error::{Error, Result};
pub use interview::{Interview, InterviewRepository, NewInterview};
pub use sync::{MailSync, SyncError, SyncReport};
