//! # jobtrack-fetch
//!
//! Runs the external mail-fetch task and makes sense of what it printed.
//!
//! The fetch task is an independently-versioned program (usually a Python
//! script talking IMAP) that is invoked as
//!
//! ```text
//! <task> <address> <secret> <host> [<startDate> <endDate>]
//! ```
//!
//! and reports its result only as human-readable text. This crate provides:
//!
//! - [`Launcher`]: spawns a [`TaskCommand`], captures stdout/stderr, and
//!   enforces a wall-clock limit with `SIGTERM` → `SIGKILL` escalation
//! - [`RunOutcome`]: success, failure, or timeout, with the captured output
//! - [`extract()`]: the ordered pattern rules that recover
//!   `(processed, inserted)` counts from the task's stdout
//! - [`TaskRunner`]: the narrow seam callers depend on, so output handling
//!   can be tested without spawning processes
//!
//! ## Example
//!
//! ```ignore
//! use jobtrack_fetch::{DateRange, Launcher, Mailbox, RunOutcome, TaskCommand};
//!
//! let task = TaskCommand::new("python").arg("script/fetch_mail.py");
//! let mailbox = Mailbox::new("me@example.com", "app-code", "imap.example.com");
//! let range = DateRange::parse("2025-09-15", "2025-09-22")?;
//! let args = jobtrack_fetch::fetch_arguments(&mailbox, Some(&range));
//!
//! match Launcher::default().run(&task, &args).await? {
//!     RunOutcome::Success(output) => {
//!         let counts = jobtrack_fetch::extract_counts(&output.stdout);
//!         println!("{} new", counts.inserted);
//!     }
//!     other => eprintln!("fetch did not succeed: {other:?}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod extract;
pub mod launcher;
pub mod task;

pub use error::{Error, Result};
pub use extract::{Extraction, MatchedRule, SyncCounts, extract, extract_counts, summary_line};
pub use launcher::{
    DEFAULT_GRACE_PERIOD, DEFAULT_RUN_TIMEOUT, ExitReason, Launcher, Phase, ProcessTask,
    RawOutput, RunOutcome, TaskRunner, Termination, Timeouts,
};
pub use task::{DateRange, Mailbox, TaskCommand, body_arguments, fetch_arguments, parse_date};
