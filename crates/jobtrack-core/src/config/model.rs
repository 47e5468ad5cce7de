//! Configuration document types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jobtrack_fetch::{Launcher, Mailbox, ProcessTask, TaskCommand, Timeouts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{Error, Result};

/// Environment variables consulted when a mailbox field is left empty.
pub const MAILBOX_ENV_FALLBACKS: [&str; 3] = ["EMAIL_ADDRESS", "EMAIL_PASSWORD", "IMAP_SERVER"];

/// Environment variable telling the fetch task where the email store lives.
pub const EMAIL_DB_ENV: &str = "JOBTRACK_EMAIL_DB";

/// Fields an update may change, per section. Everything else, including
/// the whole `fetch` section, is only read from the file.
const EDITABLE_FIELDS: [(&str, &[&str]); 2] = [
    ("db", &["host", "user", "password", "charset"]),
    ("email", &["address", "password", "imap_server"]),
];

/// Directory name used under the platform data directory.
const DATA_DIR_NAME: &str = "jobtrack";

/// The three logical databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Database {
    /// Interview schedule.
    Interviews,
    /// Synchronized emails.
    Emails,
    /// Application/delivery log.
    Deliveries,
}

impl Database {
    /// File name of the database inside the data directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Interviews => "interview_schedule.db",
            Self::Emails => "job_emails.db",
            Self::Deliveries => "job_deliveries.db",
        }
    }
}

/// Database section.
///
/// `host`, `user`, `password` and `charset` are kept for the external fetch
/// task, which reads the same document. The tracker's own stores are `SQLite`
/// files under `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Database server host.
    pub host: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Character set.
    pub charset: String,
    /// Directory holding the `SQLite` files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            password: String::new(),
            charset: "utf8mb4".to_string(),
            data_dir: None,
        }
    }
}

impl DbConfig {
    /// The configured data directory, or `<platform data dir>/jobtrack`.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir().map_or_else(|| PathBuf::from("data"), |dir| dir.join(DATA_DIR_NAME))
        })
    }

    /// Full path of one database file.
    #[must_use]
    pub fn database_path(&self, database: Database) -> PathBuf {
        self.resolved_data_dir().join(database.file_name())
    }
}

/// Mailbox section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Mailbox address.
    pub address: String,
    /// Password or authorization code.
    pub password: String,
    /// IMAP server host.
    pub imap_server: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            password: String::new(),
            imap_server: "imap.qq.com".to_string(),
        }
    }
}

impl MailboxConfig {
    /// Builds task credentials, filling empty fields through `lookup`
    /// (keyed by [`MAILBOX_ENV_FALLBACKS`]).
    #[must_use]
    pub fn to_mailbox_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Mailbox {
        let pick = |value: &str, var: &str| {
            if value.trim().is_empty() {
                lookup(var).unwrap_or_default()
            } else {
                value.to_string()
            }
        };
        let [address_var, password_var, server_var] = MAILBOX_ENV_FALLBACKS;
        Mailbox::new(
            pick(&self.address, address_var),
            pick(&self.password, password_var),
            pick(&self.imap_server, server_var),
        )
    }
}

/// External task section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Interpreter or executable.
    pub program: PathBuf,
    /// Fetch script, relative paths resolve against the config directory.
    pub script: PathBuf,
    /// Realtime body script, resolved like `script`.
    pub body_script: PathBuf,
    /// Working directory; defaults to the executable's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Wall-clock limit in seconds.
    pub timeout_secs: u64,
    /// Wait between `SIGTERM` and `SIGKILL` in milliseconds.
    pub grace_millis: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python"),
            script: PathBuf::from("script/qq_email_imap.py"),
            body_script: PathBuf::from("script/get_email_body_by_id.py"),
            working_dir: None,
            timeout_secs: 300,
            grace_millis: 1000,
        }
    }
}

impl FetchConfig {
    /// Timing limits for both tasks.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            run: Duration::from_secs(self.timeout_secs),
            grace: Duration::from_millis(self.grace_millis),
        }
    }

    /// The bulk fetch task, told about the email store through
    /// [`EMAIL_DB_ENV`].
    #[must_use]
    pub fn fetch_task(&self, base_dir: &Path, email_db: &Path) -> ProcessTask {
        let command = self
            .command(&self.script, base_dir)
            .env(EMAIL_DB_ENV, email_db.to_string_lossy());
        ProcessTask::new(command, Launcher::new(self.timeouts()))
    }

    /// The realtime body task.
    #[must_use]
    pub fn body_task(&self, base_dir: &Path) -> ProcessTask {
        ProcessTask::new(
            self.command(&self.body_script, base_dir),
            Launcher::new(self.timeouts()),
        )
    }

    fn command(&self, script: &Path, base_dir: &Path) -> TaskCommand {
        let script = if script.is_relative() {
            base_dir.join(script)
        } else {
            script.to_path_buf()
        };
        let mut command = TaskCommand::new(&self.program).arg(script.to_string_lossy());
        if let Some(dir) = &self.working_dir {
            command = command.working_dir(dir);
        }
        command
    }
}

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database section.
    pub db: DbConfig,
    /// Mailbox section.
    pub email: MailboxConfig,
    /// External task section.
    pub fetch: FetchConfig,
}

impl AppConfig {
    /// Returns a copy with `patch` merged in section by section.
    ///
    /// Each top-level key of `patch` names a section whose fields overwrite
    /// the current ones; fields the patch does not mention are kept. Only the
    /// credential fields of `db` and `email` can be changed this way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the patch is not an object of
    /// objects, touches a read-only section or field, or a field has the
    /// wrong type.
    pub fn merged(&self, patch: &Value) -> Result<Self> {
        let Value::Object(sections) = patch else {
            return Err(Error::Validation(
                "configuration update must be a JSON object".to_string(),
            ));
        };

        let mut document = serde_json::to_value(self)?;
        let Value::Object(current) = &mut document else {
            return Err(Error::Config("configuration did not serialize to an object".to_string()));
        };

        for (name, fields) in sections {
            let Some(editable) = EDITABLE_FIELDS
                .iter()
                .find_map(|(section, editable)| (*section == name.as_str()).then_some(*editable))
            else {
                if current.contains_key(name) {
                    return Err(Error::Validation(format!("section '{name}' is read-only")));
                }
                warn!(section = %name, "Ignoring unknown configuration section");
                continue;
            };
            let Value::Object(fields) = fields else {
                return Err(Error::Validation(format!("section '{name}' must be an object")));
            };
            let Some(Value::Object(section)) = current.get_mut(name) else {
                return Err(Error::Config(format!("section '{name}' did not serialize")));
            };
            for (key, value) in fields {
                if !editable.contains(&key.as_str()) {
                    return Err(Error::Validation(format!("field '{name}.{key}' is read-only")));
                }
                section.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(document).map_err(|e| Error::Validation(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_value(json!({ "email": { "address": "me@example.com" } })).unwrap();
        assert_eq!(config.email.address, "me@example.com");
        assert_eq!(config.email.imap_server, "imap.qq.com");
        assert_eq!(config.db.charset, "utf8mb4");
        assert_eq!(config.fetch.timeout_secs, 300);
    }

    #[test]
    fn test_merge_overwrites_only_named_fields() {
        let mut config = AppConfig::default();
        config.db.host = "localhost".to_string();
        config.db.user = "root".to_string();

        let merged = config
            .merged(&json!({ "db": { "user": "tracker" }, "email": { "password": "code" } }))
            .unwrap();
        assert_eq!(merged.db.host, "localhost");
        assert_eq!(merged.db.user, "tracker");
        assert_eq!(merged.email.password, "code");
        assert_eq!(merged.email.imap_server, "imap.qq.com");
    }

    #[test]
    fn test_merge_refuses_read_only_settings() {
        let config = AppConfig::default();
        for patch in [
            json!({ "fetch": { "program": "sh", "script": "/tmp/other.sh" } }),
            json!({ "fetch": {} }),
            json!({ "db": { "data_dir": "/var/lib/jobtrack" } }),
            json!({ "email": { "address": "me@example.com", "imap_port": 993 } }),
        ] {
            assert!(
                matches!(config.merged(&patch), Err(Error::Validation(_))),
                "accepted {patch}"
            );
        }
    }

    #[test]
    fn test_merge_rejects_wrong_types() {
        let config = AppConfig::default();
        assert!(matches!(config.merged(&json!([1, 2])), Err(Error::Validation(_))));
        assert!(matches!(
            config.merged(&json!({ "db": "localhost" })),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            config.merged(&json!({ "email": { "address": 5 } })),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_merge_ignores_unknown_sections() {
        let merged = AppConfig::default()
            .merged(&json!({ "theme": { "mode": "dark" } }))
            .unwrap();
        assert_eq!(merged, AppConfig::default());
    }

    #[test]
    fn test_mailbox_env_fallbacks() {
        let section = MailboxConfig {
            address: String::new(),
            password: "from-file".to_string(),
            imap_server: String::new(),
        };
        let mailbox = section.to_mailbox_with(|var| match var {
            "EMAIL_ADDRESS" => Some("env@example.com".to_string()),
            "EMAIL_PASSWORD" => Some("from-env".to_string()),
            _ => None,
        });
        assert_eq!(mailbox.address, "env@example.com");
        assert_eq!(mailbox.secret, "from-file");
        assert_eq!(mailbox.host, "");
        assert!(!mailbox.is_complete());
    }

    #[test]
    fn test_relative_script_resolves_against_base() {
        let fetch = FetchConfig::default();
        let task = fetch.fetch_task(
            Path::new("/opt/jobtrack"),
            Path::new("/var/lib/jobtrack/job_emails.db"),
        );
        assert_eq!(task.command().program(), Path::new("python"));
        assert_eq!(
            task.command().leading_args(),
            ["/opt/jobtrack/script/qq_email_imap.py"]
        );
        assert_eq!(
            task.command().envs(),
            [(
                EMAIL_DB_ENV.to_string(),
                "/var/lib/jobtrack/job_emails.db".to_string()
            )]
        );
    }

    #[test]
    fn test_absolute_script_kept() {
        let fetch = FetchConfig {
            body_script: PathBuf::from("/usr/local/bin/body.py"),
            ..FetchConfig::default()
        };
        let task = fetch.body_task(Path::new("/opt/jobtrack"));
        assert_eq!(task.command().leading_args(), ["/usr/local/bin/body.py"]);
    }

    #[test]
    fn test_database_paths() {
        let db = DbConfig {
            data_dir: Some(PathBuf::from("/data")),
            ..DbConfig::default()
        };
        assert_eq!(
            db.database_path(Database::Emails),
            PathBuf::from("/data/job_emails.db")
        );
    }
}
