//! Task command lines and positional argument construction.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::{Error, Result};

/// Date format used on the task's command line.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar-date window passed to the fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting one that ends before it starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvertedRange`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvertedRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses a range from two `YYYY-MM-DD` strings.
    ///
    /// # Errors
    ///
    /// Returns an error if either date is malformed or the range is inverted.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// First day of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// The two trailing positional arguments for this window.
    #[must_use]
    pub fn to_args(&self) -> [String; 2] {
        [
            self.start.format(DATE_FORMAT).to_string(),
            self.end.format(DATE_FORMAT).to_string(),
        ]
    }
}

/// Parses a single `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the value is not a calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate {
        value: value.to_string(),
    })
}

/// Mailbox credentials handed to the external tasks.
#[derive(Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Mailbox address (login name).
    pub address: String,
    /// Password or app-specific authorization code.
    pub secret: String,
    /// IMAP server host.
    pub host: String,
}

impl Mailbox {
    /// Creates a new mailbox description.
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        secret: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
            host: host.into(),
        }
    }

    /// Returns true when address, secret and host are all non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.address.trim().is_empty()
            && !self.secret.is_empty()
            && !self.host.trim().is_empty()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

/// Builds `<address> <secret> <host> [<start> <end>]`.
///
/// The date window, when present, is appended after the three mailbox
/// arguments rather than replacing any of them.
#[must_use]
pub fn fetch_arguments(mailbox: &Mailbox, range: Option<&DateRange>) -> Vec<String> {
    let mut args = vec![
        mailbox.address.clone(),
        mailbox.secret.clone(),
        mailbox.host.clone(),
    ];
    if let Some(range) = range {
        args.extend(range.to_args());
    }
    args
}

/// Builds `<external_id> <address> <secret> <host>` for the body task.
#[must_use]
pub fn body_arguments(external_id: &str, mailbox: &Mailbox) -> Vec<String> {
    vec![
        external_id.to_string(),
        mailbox.address.clone(),
        mailbox.secret.clone(),
        mailbox.host.clone(),
    ]
}

/// An external program plus the arguments that always precede the
/// per-invocation ones (typically an interpreter and a script path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCommand {
    program: PathBuf,
    leading_args: Vec<String>,
    working_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl TaskCommand {
    /// Creates a command for `program` with no leading arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            working_dir: None,
            envs: Vec::new(),
        }
    }

    /// Appends a leading argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Sets the working directory the task runs in.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable for the task.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments placed before the per-invocation ones.
    #[must_use]
    pub fn leading_args(&self) -> &[String] {
        &self.leading_args
    }

    /// Extra environment variables, in the order they were added.
    #[must_use]
    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// The configured working directory, or the directory holding the
    /// running executable when none was set.
    #[must_use]
    pub fn resolved_working_dir(&self) -> PathBuf {
        self.working_dir.clone().unwrap_or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}
