use crate::gateway::http::EndpointOverrides;
use anyhow::Error;
use clap::Parser;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};

const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    #[clap(long)]
    pub conf: Option<String>,
    /// Overrides the domain from the config file.
    #[clap(long, value_enum)]
    pub domain: Option<DomainName>,
    /// Fetch once, print the counts as JSON and exit.
    #[clap(long)]
    pub once: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DomainName {
    #[default]
    Admin,
    Supplier,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountsSource {
    /// Use the backend counts endpoint, deriving locally when it fails.
    #[default]
    Server,
    /// Always derive counts from the fetched records.
    Derived,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub domain: DomainName,
    pub store: StoreConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub poll_interval_ms: u64,
    /// Stop the timer once the last listener is removed.
    pub stop_when_idle: bool,
    pub counts_source: CountsSource,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
    pub endpoints: EndpointOverrides,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stop_when_idle: true,
            counts_source: CountsSource::Server,
        }
    }
}

impl StoreConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_ms: Some(5000),
            headers: None,
            endpoints: EndpointOverrides::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            log_file: None,
            domain: DomainName::Admin,
            store: StoreConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }
}
