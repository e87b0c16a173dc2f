//! Client configuration
//!
//! [`TvmClientConfig`] is what callers hand to [`TvmClient::init`]. It is
//! resolved once against the process environment into an immutable
//! [`ResolvedConfig`] owned by the client.
//!
//! [`TvmClient::init`]: crate::TvmClient::init

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TvmError};
use crate::utils::log_sanitizer::mask_secret;

/// Production TVM host.
pub const PRODUCTION_API_URL: &str = "https://firefly-tvm.adobe.io";
/// Staging TVM host, selected with `TVM_ENV=stage`.
pub const STAGE_API_URL: &str = "https://firefly-tvm-stage.adobe.io";
/// Value of the `x-api-key` header when none is configured.
pub const DEFAULT_API_KEY: &str = "tvm-client";
/// File name of the default cache file inside the temp directory.
pub const DEFAULT_CACHE_FILE_NAME: &str = ".tvmCache";

/// Environment fallback for [`OwCredentials::namespace`].
pub const ENV_NAMESPACE: &str = "__OW_NAMESPACE";
/// Environment fallback for [`OwCredentials::auth`].
pub const ENV_AUTH: &str = "__OW_AUTH";
/// Environment switch between production and staging hosts.
pub const ENV_TVM_ENV: &str = "TVM_ENV";

const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
const DEFAULT_MAX_WAIT_MS: u64 = 60_000;

// ============ Caller Identity ============

/// Caller namespace and auth secret.
///
/// Both fields may be left out and filled from `__OW_NAMESPACE` /
/// `__OW_AUTH` at init time.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OwCredentials {
    pub namespace: Option<String>,
    pub auth: Option<String>,
}

impl OwCredentials {
    pub fn new(namespace: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            auth: Some(auth.into()),
        }
    }
}

impl std::fmt::Debug for OwCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwCredentials")
            .field("namespace", &self.namespace)
            .field("auth", &self.auth.as_deref().map(mask_secret))
            .finish()
    }
}

// ============ Cache File ============

/// Where the persisted cache lives.
///
/// In JSON (`cacheFile`): absent means [`Default`](Self::Default), a string
/// is a path, and `false` or `null` disables file caching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheFileSetting {
    /// `<temp dir>/.tvmCache`
    #[default]
    Default,
    /// No file cache; only the in-memory tier is used.
    Disabled,
    /// Explicit cache file location.
    Path(PathBuf),
}

impl CacheFileSetting {
    /// The concrete file path, or `None` when file caching is off.
    pub fn resolve(&self) -> Option<PathBuf> {
        match self {
            Self::Default => Some(std::env::temp_dir().join(DEFAULT_CACHE_FILE_NAME)),
            Self::Disabled => None,
            Self::Path(path) => Some(path.clone()),
        }
    }
}

impl Serialize for CacheFileSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Default => serializer.serialize_bool(true),
            Self::Disabled => serializer.serialize_bool(false),
            Self::Path(path) => path.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CacheFileSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Path(PathBuf),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => Self::Disabled,
            Some(Raw::Flag(true)) => Self::Default,
            Some(Raw::Path(path)) if path.as_os_str().is_empty() => Self::Disabled,
            Some(Raw::Path(path)) => Self::Path(path),
        })
    }
}

// ============ Retry ============

/// Backoff tuning for TVM requests.
///
/// Retry `n` (0-based) waits `min(2^n * initial_delay_ms, max_wait_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RetryOptions {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay_ms: u64,
    /// Ceiling for any single wait.
    pub max_wait_ms: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

// ============ Client Config ============

/// Input configuration for [`TvmClient`](crate::TvmClient).
///
/// Unknown keys are rejected when deserializing, so a typo in a JSON config
/// fails with [`TvmError::BadArgument`] instead of being silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TvmClientConfig {
    /// Caller identity. Falls back to the environment.
    #[serde(default)]
    pub ow: Option<OwCredentials>,
    /// TVM base URL. Defaults to the production (or staging) host.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Persisted cache location.
    #[serde(default)]
    pub cache_file: CacheFileSetting,
    /// Backoff tuning.
    #[serde(default)]
    pub retry: RetryOptions,
    /// Value for the `x-api-key` header.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl TvmClientConfig {
    pub fn new(namespace: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            ow: Some(OwCredentials::new(namespace, auth)),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TvmError::bad_argument(format!("config: {e}")))
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    #[must_use]
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = CacheFileSetting::Path(path.into());
        self
    }

    #[must_use]
    pub fn without_cache_file(mut self) -> Self {
        self.cache_file = CacheFileSetting::Disabled;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Merge environment fallbacks and validate.
    ///
    /// `env` looks up a variable by name; blank values count as unset.
    pub fn resolve<F>(self, env: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let ow = self.ow.unwrap_or_default();

        let namespace = non_empty(ow.namespace)
            .or_else(|| lookup(ENV_NAMESPACE))
            .ok_or_else(|| {
                TvmError::bad_argument(format!("ow.namespace is required (or set {ENV_NAMESPACE})"))
            })?;
        let auth = non_empty(ow.auth)
            .or_else(|| lookup(ENV_AUTH))
            .ok_or_else(|| {
                TvmError::bad_argument(format!("ow.auth is required (or set {ENV_AUTH})"))
            })?;

        let api_url = match self.api_url {
            Some(api_url) => {
                validate_api_url(&api_url)?;
                api_url
            }
            None if lookup(ENV_TVM_ENV).is_some_and(|v| v.eq_ignore_ascii_case("stage")) => {
                STAGE_API_URL.to_string()
            }
            None => PRODUCTION_API_URL.to_string(),
        };

        Ok(ResolvedConfig {
            namespace,
            auth,
            api_url,
            cache_file: self.cache_file.resolve(),
            retry: self.retry,
            api_key: non_empty(self.api_key).unwrap_or_else(|| DEFAULT_API_KEY.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_api_url(api_url: &str) -> Result<()> {
    let parsed = url::Url::parse(api_url).map_err(|e| {
        TvmError::bad_argument(format!("apiUrl '{api_url}' is not a valid uri: {e}"))
    })?;
    if parsed.cannot_be_a_base() {
        return Err(TvmError::bad_argument(format!(
            "apiUrl '{api_url}' is not a valid uri"
        )));
    }
    Ok(())
}

/// Validated, immutable client settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub namespace: String,
    pub auth: String,
    pub api_url: String,
    pub cache_file: Option<PathBuf>,
    pub retry: RetryOptions,
    pub api_key: String,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("namespace", &self.namespace)
            .field("auth", &mask_secret(&self.auth))
            .field("api_url", &self.api_url)
            .field("cache_file", &self.cache_file)
            .field("retry", &self.retry)
            .field("api_key", &self.api_key)
            .finish()
    }
}
