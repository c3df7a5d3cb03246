use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::web_link::DEFAULT_EXCLUDED_DOMAINS;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub webdriver: WebDriverSettings,
    pub collector: CollectorSettings,
    pub enrichment: EnrichmentSettings,
    pub verification: VerificationSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = match self.require_ssl {
            true => PgSslMode::Require,
            false => PgSslMode::Prefer,
        };

        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct WebDriverSettings {
    pub server_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub chrome_binary: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_width: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_height: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CollectorSettings {
    pub maps_base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub feed_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub scroll_pause_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_stale_scrolls: u8,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub detail_settle_millis: u64,
}

impl CollectorSettings {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_millis)
    }

    pub fn detail_settle(&self) -> Duration {
        Duration::from_millis(self.detail_settle_millis)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct EnrichmentSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_load_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub settle_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub search_timeout_secs: u64,
    pub search_region: String,
    pub search_engines: Vec<String>,
    #[serde(default = "default_excluded_domains")]
    pub excluded_domains: Vec<String>,
    pub lookup_decision_makers: bool,
}

impl EnrichmentSettings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

fn default_excluded_domains() -> Vec<String> {
    DEFAULT_EXCLUDED_DOMAINS
        .iter()
        .map(|d| d.to_string())
        .collect()
}

#[derive(Deserialize, Clone, Debug)]
pub struct VerificationSettings {
    pub dns_servers: Vec<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub dns_timeout_secs: u64,
}

impl VerificationSettings {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
