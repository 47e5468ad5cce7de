//! Email synchronization through the external fetch task.

mod error;
mod service;

pub use error::SyncError;
pub use service::{MailSync, SyncReport};
