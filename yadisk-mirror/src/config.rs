use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::mirror::EngineConfig;
use crate::mirror::engine::{DEFAULT_DIRECTORY_WORKERS, DEFAULT_MAX_CONCURRENT_REQUESTS};

pub const DEFAULT_API_URL: &str = "https://cloud-api.yandex.net";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub sync_root: PathBuf,
    pub remote_root: String,
    pub token: String,
    pub api_url: String,
    pub sync_interval: Duration,
    pub engine: EngineConfig,
    pub permanent_delete: bool,
}

impl MirrorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        let sync_root = std::env::var("YADISK_SYNC_DIR")
            .map(|value| expand_with_home(&value, &home))
            .context("YADISK_SYNC_DIR is not set")?;
        let remote_root =
            std::env::var("YADISK_REMOTE_ROOT").context("YADISK_REMOTE_ROOT is not set")?;
        let token = std::env::var("YADISK_TOKEN").context("YADISK_TOKEN is not set")?;
        let api_url =
            std::env::var("YADISK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let sync_interval = Duration::from_secs(read_u64_env(
            "YADISK_SYNC_INTERVAL_SECS",
            DEFAULT_SYNC_INTERVAL_SECS,
        ));
        let engine = EngineConfig {
            max_concurrent_requests: read_u64_env(
                "YADISK_MAX_CONCURRENT_REQUESTS",
                DEFAULT_MAX_CONCURRENT_REQUESTS as u64,
            ) as usize,
            directory_workers: read_u64_env(
                "YADISK_DIRECTORY_WORKERS",
                DEFAULT_DIRECTORY_WORKERS as u64,
            ) as usize,
        };
        let permanent_delete = read_bool_env("YADISK_PERMANENT_DELETE", false);

        if remote_root.trim().is_empty() {
            anyhow::bail!("YADISK_REMOTE_ROOT is empty");
        }
        if token.trim().is_empty() {
            anyhow::bail!("YADISK_TOKEN is empty");
        }

        Ok(Self {
            sync_root,
            remote_root,
            token,
            api_url,
            sync_interval,
            engine,
            permanent_delete,
        })
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
