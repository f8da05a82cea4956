use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr},
    num::NonZeroU64,
    path::PathBuf,
};
use thiserror::Error;
use tracing::debug;
use yatube_common::{
    page::DEFAULT_PAGE_SIZE,
    snowflake::{ProcessId, WorkerId},
};

/// Value of `database_url` selecting the in-process store.
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    #[serde(default = "default_server_address")]
    pub server_address: IpAddr,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    pub database_url: String,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_page_size")]
    pub page_size: NonZeroU64,
    /// Zero disables the index page cache.
    #[serde(default = "default_index_cache_seconds")]
    pub index_cache_seconds: u64,
    /// Zero makes sessions last until logout.
    #[serde(default = "default_session_lifetime_seconds")]
    pub session_lifetime_seconds: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
    /// Comma separated slugs of groups created on startup if missing.
    #[serde(default)]
    pub seed_groups: Vec<String>,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_server_port() -> u16 {
    8000
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_page_size() -> NonZeroU64 {
    DEFAULT_PAGE_SIZE
}

fn default_index_cache_seconds() -> u64 {
    20
}

fn default_session_lifetime_seconds() -> u64 {
    60 * 60 * 24 * 14
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

impl Env {
    #[must_use]
    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

/// Reads `.env` if there is one, then the process environment.
pub fn get_env() -> Result<Env, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(ConfigError::from)
}
