use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR_NAME: &str = "tip-distribution";
const DB_FILE_NAME: &str = "tip_distribution.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    Azure,
    /// Offline backend that always returns the bundled sample report.
    Sample,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureOcrConfig {
    pub key: String,
    pub endpoint: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl AzureOcrConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_POLLS: u32 = 60;

    pub fn new(key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_polls: Self::DEFAULT_MAX_POLLS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub ocr_backend: OcrBackend,
    /// `None` when the key or endpoint is missing; Azure extraction then fails at call time.
    pub azure: Option<AzureOcrConfig>,
}

impl AppConfig {
    /// Load `.env` from the working directory and the app data directory, then read the
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let data_dir = match env_var("TIP_DISTRIBUTION_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join(APP_DIR_NAME),
        };
        // Production users can drop credentials next to the database.
        let env_path = data_dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }
        Self::from_lookup(data_dir, env_var)
    }

    fn from_lookup<F>(data_dir: PathBuf, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TIP_DISTRIBUTION_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(DB_FILE_NAME));

        let ocr_backend = match lookup("TIP_DISTRIBUTION_OCR_BACKEND").as_deref() {
            None | Some("azure") => OcrBackend::Azure,
            Some("sample") => OcrBackend::Sample,
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let azure = match (lookup("AZURE_OCR_KEY"), lookup("AZURE_OCR_ENDPOINT")) {
            (Some(key), Some(endpoint)) => {
                let mut azure = AzureOcrConfig::new(key, endpoint);
                if let Some(secs) = lookup("AZURE_OCR_POLL_SECS") {
                    let secs = parse_number::<u64>("AZURE_OCR_POLL_SECS", &secs)?;
                    azure.poll_interval = Duration::from_secs(secs);
                }
                if let Some(polls) = lookup("AZURE_OCR_MAX_POLLS") {
                    azure.max_polls = parse_number("AZURE_OCR_MAX_POLLS", &polls)?;
                }
                Some(azure)
            }
            _ => None,
        };

        Ok(Self {
            data_dir,
            db_path,
            ocr_backend,
            azure,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}
