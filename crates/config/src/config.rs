use core::time::Duration;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, bail};
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;

pub const DEFAULT_GMS_URL: &str = "http://localhost:8080";
pub const DEFAULT_LANGCHAIN_ENDPOINT: &str = "https://api.smith.langchain.com";

/// Port the catalog's web frontend listens on; it proxies the API under `/api/gms`.
const FRONTEND_PORT: &str = ":9002";

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::from_env().expect("Failed to create config"));

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog API endpoint
    pub gms_url: String,

    /// Catalog bearer token
    pub token: Option<String>,

    pub dry_run: bool,
    pub hard_fail: bool,

    /// Catalog environment (`PROD`, `DEV`, ...)
    pub env: String,

    /// Catalog data platform the entities are published under
    pub platform: String,

    pub langsmith_api_key: Option<String>,
    pub langchain_endpoint: String,
    pub langchain_project: String,

    pub window_days: u32,
    pub batch_size: usize,
    pub limit: usize,

    /// Directory for debug artifact dumps
    pub debug_dir: Option<PathBuf>,

    pub max_retries: usize,
    pub retry_delay: Duration,
    pub stage_delay: Duration,
}

impl Config {
    /// Loads configuration from the process environment, after reading `.env`.
    ///
    /// Every variable has a default except the credentials, which
    /// [`Config::validate`] checks once CLI overrides have been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let flag = |key: &str, default: bool| var(key).map_or(default, |value| parse_bool(&value));

        let gms_url = normalize_gms_url(
            &var("DATAHUB_GMS_URL").unwrap_or_else(|| DEFAULT_GMS_URL.to_string()),
        );

        Ok(Self {
            gms_url,
            token: var("DATAHUB_TOKEN"),
            dry_run: flag("DATAHUB_DRY_RUN", false),
            hard_fail: flag("DATAHUB_HARD_FAIL", true),
            env: var("DATAHUB_ENV").unwrap_or_else(|| "PROD".to_string()),
            platform: var("LLM_PLATFORM").unwrap_or_else(|| "llm".to_string()),
            langsmith_api_key: var("LANGSMITH_API_KEY"),
            langchain_endpoint: var("LANGCHAIN_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_LANGCHAIN_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            langchain_project: var("LANGCHAIN_PROJECT").unwrap_or_else(|| "default".to_string()),
            window_days: parse_or(&var, "INGEST_WINDOW_DAYS", 7)?,
            batch_size: parse_or(&var, "INGEST_BATCH_SIZE", 100)?,
            limit: parse_or(&var, "INGEST_LIMIT", 1000)?,
            debug_dir: var("DEBUG_DIR").map(PathBuf::from),
            max_retries: parse_or(&var, "EMIT_MAX_RETRIES", 3)?,
            retry_delay: Duration::from_millis(parse_or(&var, "EMIT_RETRY_DELAY_MS", 1000)?),
            stage_delay: Duration::from_millis(parse_or(&var, "EMIT_STAGE_DELAY_MS", 500)?),
        })
    }

    /// Checks that the configuration can drive an ingest.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is missing or a size is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.dry_run && self.token.is_none() {
            bail!("DATAHUB_TOKEN environment variable not set (required unless dry-run)");
        }
        if self.langsmith_api_key.is_none() {
            bail!("LANGSMITH_API_KEY environment variable not set");
        }
        if self.batch_size == 0 {
            bail!("batch size must be greater than zero");
        }
        if self.limit == 0 {
            bail!("limit must be greater than zero");
        }

        Ok(())
    }
}

/// Opens a local object store rooted at `dir`, creating the directory first.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or opened.
pub fn local_store(dir: &Path) -> anyhow::Result<Arc<dyn ObjectStore>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let store = LocalFileSystem::new_with_prefix(dir).context("Failed to create object store")?;
    Ok(Arc::new(store))
}

/// Parses a boolean environment value; `true`, `1`, `yes` and `on` are true.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Points a frontend URL at the API it proxies and drops trailing slashes.
#[must_use]
pub fn normalize_gms_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    if url.contains(FRONTEND_PORT) && !url.ends_with("/api/gms") {
        format!("{url}/api/gms")
    } else {
        url.to_string()
    }
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} must be a non-negative integer, got {raw:?}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use object_store::ObjectStoreExt;
    use object_store::path::Path as ObjectStorePath;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.gms_url, DEFAULT_GMS_URL);
        assert!(!config.dry_run);
        assert!(config.hard_fail);
        assert_eq!(config.env, "PROD");
        assert_eq!(config.platform, "llm");
        assert_eq!(config.langchain_project, "default");
        assert_eq!(config.window_days, 7);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.limit, 1000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.stage_delay, Duration::from_millis(500));
        assert!(config.debug_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATAHUB_GMS_URL", "http://datahub:9002/"),
            ("DATAHUB_DRY_RUN", "Yes"),
            ("DATAHUB_HARD_FAIL", "0"),
            ("INGEST_LIMIT", "50"),
            ("DEBUG_DIR", "/tmp/debug"),
        ])
        .unwrap();

        assert_eq!(config.gms_url, "http://datahub:9002/api/gms");
        assert!(config.dry_run);
        assert!(!config.hard_fail);
        assert_eq!(config.limit, 50);
        assert_eq!(config.debug_dir, Some(PathBuf::from("/tmp/debug")));
    }

    #[test]
    fn test_invalid_number() {
        assert!(config(&[("INGEST_BATCH_SIZE", "lots")]).is_err());

        let error = config(&[("EMIT_RETRY_DELAY_MS", "-5")]).unwrap_err();
        assert!(error.to_string().contains("EMIT_RETRY_DELAY_MS"));
    }

    #[test]
    fn test_validate() {
        let mut config = config(&[("LANGSMITH_API_KEY", "ls-key")]).unwrap();
        assert!(config.validate().is_err(), "token required outside dry-run");

        config.dry_run = true;
        assert!(config.validate().is_ok());

        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 10;
        config.langsmith_api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_gms_url() {
        assert_eq!(normalize_gms_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(
            normalize_gms_url("http://localhost:9002/api/gms"),
            "http://localhost:9002/api/gms"
        );
    }

    #[test]
    fn test_parse_bool() {
        for value in ["true", "TRUE", "1", "yes", "on"] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(value), "{value}");
        }
    }

    #[tokio::test]
    async fn test_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");
        let store = local_store(&root).unwrap();

        let path = ObjectStorePath::from("out.jsonl");
        store.put(&path, b"{}\n".to_vec().into()).await.unwrap();

        assert_eq!(std::fs::read_to_string(root.join("out.jsonl")).unwrap(), "{}\n");
    }
}
