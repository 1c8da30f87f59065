use crate::services::azure::AzureConfig;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt::Display, str::FromStr};

const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
const DEFAULT_PARALLELISM: usize = 16;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body on `POST /upload`.
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
}

/// Which backend to talk to, and everything needed to construct it.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local(LocalStoreConfig),
    Azure(AzureConfig),
}

#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub storage_dir: String,
    pub database_url: String,
    pub container: String,
    pub page_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Local,
    Azure,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "azure" => Ok(BackendKind::Azure),
            other => Err(format!("unknown backend `{}` (expected local or azure)", other)),
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Web front-end for a blob storage container")]
pub struct Args {
    /// Host to bind to (overrides BLOB_FRONT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BLOB_FRONT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides BLOB_FRONT_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Container to serve (overrides BLOB_FRONT_CONTAINER)
    #[arg(long)]
    pub container: Option<String>,

    /// Directory where the local backend stores payloads (overrides BLOB_FRONT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// SQLite URL for the local backend (overrides BLOB_FRONT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Azure storage account name (overrides BLOB_FRONT_AZURE_ACCOUNT)
    #[arg(long)]
    pub azure_account: Option<String>,

    /// Azure storage account key, base64 (overrides BLOB_FRONT_AZURE_KEY)
    #[arg(long)]
    pub azure_key: Option<String>,

    /// Azure blob endpoint, e.g. for Azurite (overrides BLOB_FRONT_AZURE_ENDPOINT)
    #[arg(long)]
    pub azure_endpoint: Option<String>,

    /// Objects requested per listing page (overrides BLOB_FRONT_PAGE_SIZE)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Upload block size in bytes (overrides BLOB_FRONT_BLOCK_SIZE)
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Concurrent block uploads (overrides BLOB_FRONT_PARALLELISM)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Maximum upload size in bytes (overrides BLOB_FRONT_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations for the local backend and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over `env` lookups over built-in defaults.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = args
            .host
            .or_else(|| env("BLOB_FRONT_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = pick(args.port, &env, "BLOB_FRONT_PORT", 3000)?;
        let max_upload_bytes = pick(
            args.max_upload_bytes,
            &env,
            "BLOB_FRONT_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;
        let backend = pick(args.backend, &env, "BLOB_FRONT_BACKEND", BackendKind::Local)?;
        let container = args
            .container
            .or_else(|| env("BLOB_FRONT_CONTAINER"))
            .unwrap_or_else(|| "uploads".into());
        let page_size = pick(args.page_size, &env, "BLOB_FRONT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            bail!("page size must be at least 1");
        }

        let storage = match backend {
            BackendKind::Local => StorageConfig::Local(LocalStoreConfig {
                storage_dir: args
                    .storage_dir
                    .or_else(|| env("BLOB_FRONT_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/objects".into()),
                database_url: args
                    .database_url
                    .or_else(|| env("BLOB_FRONT_DATABASE_URL"))
                    .unwrap_or_else(|| "sqlite://./data/meta/blob_front.db".into()),
                container,
                page_size,
            }),
            BackendKind::Azure => {
                let account = args
                    .azure_account
                    .or_else(|| env("BLOB_FRONT_AZURE_ACCOUNT"))
                    .context("BLOB_FRONT_AZURE_ACCOUNT is required for the azure backend")?;
                let access_key = args
                    .azure_key
                    .or_else(|| env("BLOB_FRONT_AZURE_KEY"))
                    .context("BLOB_FRONT_AZURE_KEY is required for the azure backend")?;
                StorageConfig::Azure(AzureConfig {
                    account,
                    access_key,
                    container,
                    endpoint: args
                        .azure_endpoint
                        .or_else(|| env("BLOB_FRONT_AZURE_ENDPOINT")),
                    page_size,
                    block_size: pick(
                        args.block_size,
                        &env,
                        "BLOB_FRONT_BLOCK_SIZE",
                        DEFAULT_BLOCK_SIZE,
                    )?,
                    parallelism: pick(
                        args.parallelism,
                        &env,
                        "BLOB_FRONT_PARALLELISM",
                        DEFAULT_PARALLELISM,
                    )?,
                })
            }
        };

        Ok(Self {
            host,
            port,
            max_upload_bytes,
            storage,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CLI value if given, else the parsed environment variable, else `default`.
fn pick<T>(cli: Option<T>, env: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(value) = cli {
        return Ok(value);
    }
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_local_backend() {
        let cfg = AppConfig::resolve(Args::default(), env_of(&[])).unwrap();

        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        match cfg.storage {
            StorageConfig::Local(local) => {
                assert_eq!(local.container, "uploads");
                assert_eq!(local.page_size, DEFAULT_PAGE_SIZE);
                assert_eq!(local.storage_dir, "./data/objects");
            }
            other => panic!("expected local backend, got {:?}", other),
        }
    }

    #[test]
    fn cli_overrides_environment() {
        let args = Args {
            port: Some(9000),
            container: Some("from-cli".into()),
            ..Args::default()
        };
        let env = env_of(&[
            ("BLOB_FRONT_PORT", "8000"),
            ("BLOB_FRONT_CONTAINER", "from-env"),
            ("BLOB_FRONT_HOST", "127.0.0.1"),
        ]);

        let cfg = AppConfig::resolve(args, env).unwrap();

        assert_eq!(cfg.addr(), "127.0.0.1:9000");
        match cfg.storage {
            StorageConfig::Local(local) => assert_eq!(local.container, "from-cli"),
            other => panic!("expected local backend, got {:?}", other),
        }
    }

    #[test]
    fn azure_backend_from_environment() {
        let env = env_of(&[
            ("BLOB_FRONT_BACKEND", "Azure"),
            ("BLOB_FRONT_AZURE_ACCOUNT", "acct"),
            ("BLOB_FRONT_AZURE_KEY", "a2V5"),
            ("BLOB_FRONT_CONTAINER", "photos"),
            ("BLOB_FRONT_PARALLELISM", "4"),
        ]);

        let cfg = AppConfig::resolve(Args::default(), env).unwrap();

        match cfg.storage {
            StorageConfig::Azure(azure) => {
                assert_eq!(azure.account, "acct");
                assert_eq!(azure.container, "photos");
                assert_eq!(azure.parallelism, 4);
                assert_eq!(azure.block_size, DEFAULT_BLOCK_SIZE);
                assert_eq!(azure.endpoint, None);
            }
            other => panic!("expected azure backend, got {:?}", other),
        }
    }

    #[test]
    fn azure_backend_requires_credentials() {
        let args = Args {
            backend: Some(BackendKind::Azure),
            azure_account: Some("acct".into()),
            ..Args::default()
        };

        let err = AppConfig::resolve(args, env_of(&[])).unwrap_err();

        assert!(err.to_string().contains("BLOB_FRONT_AZURE_KEY"));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = AppConfig::resolve(Args::default(), env_of(&[("BLOB_FRONT_PORT", "http")]))
            .unwrap_err();

        assert!(err.to_string().contains("BLOB_FRONT_PORT"));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let args = Args {
            page_size: Some(0),
            ..Args::default()
        };

        assert!(AppConfig::resolve(args, env_of(&[])).is_err());
    }
}
