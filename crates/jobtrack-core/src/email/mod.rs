//! Synchronized emails and their deduplicating store.

mod model;
mod repository;

pub use model::{EmailRecord, EmailStats, KEY_PREFIX_CHARS, MergeReport, NewEmail};
pub use repository::EmailRepository;
