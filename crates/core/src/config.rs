use crate::domain::watchlist::{WatchlistFile, WatchlistItem};
use crate::error::StageError;
use crate::notify::GmailCredentials;
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lettre::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = "stock_agent_data";
const CONFIG_FILE: &str = "config.json";
const WATCHLIST_FILE: &str = "watchlist.json";
const REPORTS_DIR: &str = "reports";

/// Process environment, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_timeout_secs: Option<u64>,
    pub gmail_user: Option<String>,
    pub gmail_app_password: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_timeout_secs: Option<u64>,
    pub sentry_dsn: Option<String>,
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(key)
        .map(|s| s.parse::<T>().with_context(|| format!("{key} is not valid: {s}")))
        .transpose()
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            data_dir: non_empty_var("DIGEST_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL"),
            gemini_model: non_empty_var("GEMINI_MODEL"),
            gemini_timeout_secs: parse_var("GEMINI_TIMEOUT_SECS")?,
            gmail_user: non_empty_var("GMAIL_USER"),
            gmail_app_password: non_empty_var("GMAIL_APP_PASSWORD"),
            smtp_host: non_empty_var("SMTP_HOST"),
            smtp_timeout_secs: parse_var("SMTP_TIMEOUT_SECS")?,
            sentry_dsn: non_empty_var("SENTRY_DSN"),
        })
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join(REPORTS_DIR)
    }
}

/// Daily trigger time configured in the UI. Registration with the OS scheduler happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub hour: u32,
    pub minute: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl Schedule {
    pub fn at(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).map(|t| date.and_time(t))
    }
}

/// Everything one run needs, validated up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub api_key: String,
    pub credentials: GmailCredentials,
    pub recipient: String,
    pub watchlist: Vec<WatchlistItem>,
    pub schedule: Schedule,
    pub market_briefs: bool,
}

pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<ConfigSnapshot, StageError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    gemini_api_key: String,
    #[serde(default)]
    gmail_user: String,
    #[serde(default)]
    gmail_app_password: String,
    #[serde(default)]
    email_recipient: Option<String>,
    #[serde(default)]
    schedule_hour: Option<u32>,
    #[serde(default)]
    schedule_minute: Option<u32>,
    #[serde(default)]
    market_briefs: Option<bool>,
}

/// Reads `config.json` and `watchlist.json` from the data directory.
///
/// Credentials present in the environment win over the file.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    data_dir: PathBuf,
    api_key: Option<String>,
    gmail_user: Option<String>,
    gmail_app_password: Option<String>,
}

impl FileConfigSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            api_key: None,
            gmail_user: None,
            gmail_app_password: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data_dir: settings.data_dir.clone(),
            api_key: settings.gemini_api_key.clone(),
            gmail_user: settings.gmail_user.clone(),
            gmail_app_password: settings.gmail_app_password.clone(),
        }
    }

    fn read_config_file(&self) -> Result<ConfigFile, StageError> {
        let path = self.data_dir.join(CONFIG_FILE);
        match read_json::<ConfigFile>(&path) {
            Ok(Some(file)) => Ok(file),
            // The UI only writes the file once settings are saved.
            Ok(None) => Ok(ConfigFile::default()),
            Err(err) => Err(StageError::config_missing(format!("{err:#}"))),
        }
    }

    fn read_watchlist(&self) -> Result<Vec<WatchlistItem>, StageError> {
        let path = self.data_dir.join(WATCHLIST_FILE);
        let file = read_json::<WatchlistFile>(&path)
            .map_err(|err| StageError::config_missing(format!("{err:#}")))?
            .ok_or_else(|| {
                StageError::config_missing(format!("watchlist not found at {}", path.display()))
            })?;

        let items = file.into_items();
        if items.is_empty() {
            return Err(StageError::config_missing(format!(
                "watchlist at {} has no stocks or industries",
                path.display()
            )));
        }
        Ok(items)
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<ConfigSnapshot, StageError> {
        let file = self.read_config_file()?;

        let pick = |env: &Option<String>, from_file: &str| {
            env.clone()
                .unwrap_or_else(|| from_file.trim().to_string())
        };
        let api_key = pick(&self.api_key, &file.gemini_api_key);
        let gmail_user = pick(&self.gmail_user, &file.gmail_user);
        let app_password = pick(&self.gmail_app_password, &file.gmail_app_password);

        if api_key.is_empty() {
            return Err(StageError::config_missing("Gemini API key is not configured"));
        }
        if gmail_user.is_empty() {
            return Err(StageError::config_missing("Gmail address is not configured"));
        }
        parse_address("Gmail address", &gmail_user)?;
        let credentials = GmailCredentials::new(gmail_user, &app_password);
        if credentials.app_password().is_empty() {
            return Err(StageError::config_missing("Gmail app password is not configured"));
        }

        let recipient = file
            .email_recipient
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| credentials.user.clone());
        parse_address("email recipient", &recipient)?;

        let defaults = Schedule::default();
        let schedule = Schedule {
            hour: file.schedule_hour.unwrap_or(defaults.hour),
            minute: file.schedule_minute.unwrap_or(defaults.minute),
        };
        if schedule.hour > 23 || schedule.minute > 59 {
            return Err(StageError::config_missing(format!(
                "invalid schedule time {:02}:{:02}",
                schedule.hour, schedule.minute
            )));
        }

        let watchlist = self.read_watchlist()?;

        Ok(ConfigSnapshot {
            api_key,
            credentials,
            recipient,
            watchlist,
            schedule,
            market_briefs: file.market_briefs.unwrap_or(true),
        })
    }
}

fn parse_address(what: &str, value: &str) -> Result<Address, StageError> {
    value
        .parse::<Address>()
        .map_err(|err| StageError::config_missing(format!("{what} is not valid ({value}): {err}")))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read {} failed", path.display())),
    };
    let parsed = serde_json::from_slice::<T>(&bytes)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Some(parsed))
}
