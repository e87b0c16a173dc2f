//! TVM client: credential fetch pipeline and per-kind entry points

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::cache::{FileCache, MemoryCache, derive_cache_key, is_valid};
use crate::config::{ResolvedConfig, TvmClientConfig};
use crate::error::{ErrorContext, Result, TvmError};
use crate::http_client::BackoffRequester;
use crate::types::{
    AwsS3Credentials, AzureBlobCredentials, AzureCosmosCredentials, AzurePresignCredentials,
    CredentialKind, CredentialRecord, PresignOptions,
};
use crate::utils::url;

/// Header identifying the calling application to the TVM.
const API_KEY_HEADER: &str = "x-api-key";

/// Client for the token vending machine.
///
/// Cheap to clone; clones share configuration, HTTP connection pool and
/// memory cache.
///
/// Lookup order for cacheable kinds: memory, then file, then network. A
/// network result is written back to both tiers; failing to write the file
/// only logs a warning.
#[derive(Debug, Clone)]
pub struct TvmClient {
    config: Arc<ResolvedConfig>,
    headers: HeaderMap,
    requester: BackoffRequester,
    memory: MemoryCache,
    file: Option<FileCache>,
}

impl TvmClient {
    /// Creates a client, filling missing identity fields from
    /// `__OW_NAMESPACE` / `__OW_AUTH`.
    pub fn init(config: TvmClientConfig) -> Result<Self> {
        Self::init_with_env(config, |name| std::env::var(name).ok())
    }

    /// [`init`](Self::init) with an injected environment lookup.
    pub fn init_with_env<F>(config: TvmClientConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = config.resolve(env)?;
        let headers = build_headers(&config)?;
        let requester = BackoffRequester::new(config.retry)?;
        let file = config.cache_file.clone().map(FileCache::new);

        log::debug!(
            "[tvm] Client initialized: namespace={}, apiUrl={}, cacheFile={:?}",
            config.namespace,
            config.api_url,
            config.cache_file
        );

        Ok(Self {
            config: Arc::new(config),
            headers,
            requester,
            memory: MemoryCache::global(),
            file,
        })
    }

    /// Use `cache` instead of the process-wide memory cache.
    #[must_use]
    pub fn with_memory_cache(mut self, cache: MemoryCache) -> Self {
        self.memory = cache;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub fn cache_file(&self) -> Option<&Path> {
        self.file.as_ref().map(FileCache::path)
    }

    pub fn memory_cache(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    // ============ Core ============

    /// Fetch credentials for `kind`, serving from cache while valid.
    ///
    /// Non-cacheable kinds always go to the network.
    pub async fn get_credentials(&self, kind: CredentialKind) -> Result<CredentialRecord> {
        self.get_checked(kind, |_| Ok(())).await.map(|(record, ())| record)
    }

    /// Cache lookup and fetch where `check` must accept a record before it
    /// is served from or written to either tier.
    ///
    /// A cached record `check` rejects is treated as a miss.
    async fn get_checked<T, F>(
        &self,
        kind: CredentialKind,
        check: F,
    ) -> Result<(CredentialRecord, T)>
    where
        F: Fn(&CredentialRecord) -> Result<T>,
    {
        if !kind.is_cacheable() {
            let record = self.request_uncached(kind, &[]).await?;
            let checked = check(&record).map_err(fail)?;
            return Ok((record, checked));
        }

        let full_url = self.endpoint_url(kind);
        let key = derive_cache_key(&full_url, &self.config.namespace, &self.config.auth);

        if let Some(record) = self.memory.get(&key).await {
            if let Some(checked) = usable(kind, "Memory", &record, &check) {
                log::debug!("[tvm] Memory cache hit for {kind}");
                return Ok((record, checked));
            }
        }

        if let Some(file) = &self.file {
            if let Some(record) = file.read(&key).await {
                if let Some(checked) = usable(kind, "File", &record, &check) {
                    log::debug!("[tvm] File cache hit for {kind}");
                    self.memory.put(&key, record.clone()).await;
                    return Ok((record, checked));
                }
            }
        }

        let record = self.fetch_record(&full_url, &[]).await?;
        let checked = check(&record).map_err(fail)?;

        self.memory.put(&key, record.clone()).await;
        if let Some(file) = &self.file {
            if let Err(e) = file.write(&key, &record).await {
                log::warn!(
                    "[tvm] Failed to write cache file {}: {e}",
                    file.path().display()
                );
            }
        }

        Ok((record, checked))
    }

    /// One network round-trip to `kind`'s endpoint, bypassing both caches.
    pub async fn request_uncached(
        &self,
        kind: CredentialKind,
        query: &[(&str, String)],
    ) -> Result<CredentialRecord> {
        let full_url = self.endpoint_url(kind);
        self.fetch_record(&full_url, query).await
    }

    // ============ Per-kind ============

    /// Temporary AWS S3 credentials for the `<namespace>/` prefix.
    pub async fn get_aws_s3_credentials(&self) -> Result<AwsS3Credentials> {
        self.get_typed(CredentialKind::AwsS3).await
    }

    /// SAS URLs for the namespace's private and public blob containers.
    pub async fn get_azure_blob_credentials(&self) -> Result<AzureBlobCredentials> {
        self.get_typed(CredentialKind::AzureBlob).await
    }

    /// Resource token for the namespace's Cosmos partition.
    pub async fn get_azure_cosmos_credentials(&self) -> Result<AzureCosmosCredentials> {
        self.get_typed(CredentialKind::AzureCosmos).await
    }

    /// Signature for a single blob URL.
    ///
    /// All options are checked before anything is sent; a missing one fails
    /// with [`TvmError::MissingOption`].
    pub async fn get_azure_blob_presign_credentials(
        &self,
        options: &PresignOptions,
    ) -> Result<AzurePresignCredentials> {
        let query = options.to_query()?;
        let record = self
            .request_uncached(CredentialKind::AzurePresign, &query)
            .await?;
        self.decode(CredentialKind::AzurePresign, &record)
            .map_err(fail)
    }

    /// Invalidate every presigned URL issued for the namespace.
    pub async fn revoke_presign_urls(&self) -> Result<serde_json::Value> {
        let url = self.namespaced_url(&self.endpoint_url(CredentialKind::AzureRevoke));
        let body = self.send(&url, &[]).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            fail(TvmError::Parse {
                detail: e.to_string(),
                context: self.error_context(&url),
            })
        })
    }

    // ============ Internals ============

    async fn get_typed<T: DeserializeOwned>(&self, kind: CredentialKind) -> Result<T> {
        let (_, typed) = self
            .get_checked(kind, |record| self.decode(kind, record))
            .await?;
        Ok(typed)
    }

    /// Typed view of `record`. Not logged here; callers decide whether a
    /// mismatch is a failure or a cache miss.
    fn decode<T: DeserializeOwned>(
        &self,
        kind: CredentialKind,
        record: &CredentialRecord,
    ) -> Result<T> {
        record.deserialize_into().map_err(|e| {
            let url = self.namespaced_url(&self.endpoint_url(kind));
            TvmError::Parse {
                detail: format!("unexpected {kind} response: {e}"),
                context: self.error_context(&url),
            }
        })
    }

    async fn fetch_record(
        &self,
        full_url: &str,
        query: &[(&str, String)],
    ) -> Result<CredentialRecord> {
        let url = self.namespaced_url(full_url);
        let body = self.send(&url, query).await?;
        CredentialRecord::from_json_str(&body).map_err(|e| {
            fail(TvmError::Parse {
                detail: e.to_string(),
                context: self.error_context(&url),
            })
        })
    }

    /// GET with retries; non-2xx becomes [`TvmError::Response`].
    async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let context = self.error_context(url);
        let response = self
            .requester
            .get(url, &self.headers, query, &context)
            .await
            .map_err(fail)?;

        if !response.is_success() {
            return Err(fail(TvmError::Response {
                status: response.status,
                body: response.body,
                context,
            }));
        }

        Ok(response.body)
    }

    fn endpoint_url(&self, kind: CredentialKind) -> String {
        url::join(&[&self.config.api_url, kind.endpoint()])
    }

    fn namespaced_url(&self, full_url: &str) -> String {
        url::join(&[full_url, &self.config.namespace])
    }

    fn error_context(&self, url: &str) -> ErrorContext {
        ErrorContext {
            namespace: self.config.namespace.clone(),
            url: url.to_string(),
            cache_file: self
                .file
                .as_ref()
                .map(|f| f.path().display().to_string()),
        }
    }
}

/// Run `check` on a cached record; expired or rejected records are misses.
fn usable<T, F>(kind: CredentialKind, tier: &str, record: &CredentialRecord, check: &F) -> Option<T>
where
    F: Fn(&CredentialRecord) -> Result<T>,
{
    if !is_valid(record) {
        log::debug!("[tvm] {tier} cache entry for {kind} expired");
        return None;
    }
    match check(record) {
        Ok(checked) => Some(checked),
        Err(e) => {
            log::debug!("[tvm] {tier} cache entry for {kind} rejected: {e}");
            None
        }
    }
}

/// Log at the level [`TvmError::is_expected`] asks for and hand the error back.
fn fail(err: TvmError) -> TvmError {
    if err.is_expected() {
        log::warn!("[tvm] {err}");
    } else {
        log::error!("[tvm] {err}");
    }
    err
}

fn build_headers(config: &ResolvedConfig) -> Result<HeaderMap> {
    let mut authorization =
        HeaderValue::from_str(&format!("Basic {}", BASE64.encode(&config.auth)))
            .map_err(|e| TvmError::bad_argument(format!("ow.auth: {e}")))?;
    authorization.set_sensitive(true);

    let api_key = HeaderValue::from_str(&config.api_key)
        .map_err(|e| TvmError::bad_argument(format!("apiKey: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(API_KEY_HEADER, api_key);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PRODUCTION_API_URL, STAGE_API_URL};

    fn client(config: TvmClientConfig) -> TvmClient {
        TvmClient::init_with_env(config, |_| None)
            .unwrap()
            .with_memory_cache(MemoryCache::new())
    }

    #[test]
    fn api_url_defaults_to_production() {
        let tvm = client(TvmClientConfig::new("fakens", "fakeauth"));
        assert_eq!(tvm.api_url(), PRODUCTION_API_URL);
    }

    #[test]
    fn api_url_when_specified() {
        let tvm =
            client(TvmClientConfig::new("fakens", "fakeauth").with_api_url("https://fake.com"));
        assert_eq!(tvm.api_url(), "https://fake.com");
    }

    #[test]
    fn stage_env_switches_host() {
        let tvm = TvmClient::init_with_env(TvmClientConfig::new("fakens", "fakeauth"), |name| {
            (name == "TVM_ENV").then(|| "stage".to_string())
        })
        .unwrap();
        assert_eq!(tvm.api_url(), STAGE_API_URL);
    }

    #[test]
    fn init_without_identity_is_bad_argument() {
        let err = TvmClient::init_with_env(TvmClientConfig::default(), |_| None).unwrap_err();
        assert_eq!(err.code(), "ERROR_BAD_ARGUMENT");
    }

    #[test]
    fn auth_with_control_chars_still_encodes() {
        // base64 output is always a valid header value
        let tvm = client(TvmClientConfig::new("fakens", "line\nbreak"));
        assert!(tvm.headers.get(AUTHORIZATION).is_some());
    }

    #[test]
    fn invalid_api_key_is_bad_argument() {
        let err = TvmClient::init_with_env(
            TvmClientConfig::new("fakens", "fakeauth").with_api_key("bad\nkey"),
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, TvmError::BadArgument { .. }));
    }

    #[test]
    fn headers_carry_basic_auth_and_api_key() {
        let tvm = client(TvmClientConfig::new("fakens", "fakeauth").with_api_key("my-app"));
        let auth = tvm.headers.get(AUTHORIZATION).unwrap();
        assert!(auth.is_sensitive());
        assert_eq!(auth.to_str().unwrap(), "Basic ZmFrZWF1dGg=");
        assert_eq!(tvm.headers.get("x-api-key").unwrap(), "my-app");
    }

    #[test]
    fn urls_join_endpoint_and_namespace() {
        let tvm =
            client(TvmClientConfig::new("fakens", "fakeauth").with_api_url("https://fake.com/"));
        let full = tvm.endpoint_url(CredentialKind::AwsS3);
        assert_eq!(full, "https://fake.com/aws/s3");
        assert_eq!(tvm.namespaced_url(&full), "https://fake.com/aws/s3/fakens");
    }

    #[test]
    fn error_context_is_redacted() {
        let tvm = client(
            TvmClientConfig::new("fakens", "very-secret-auth").with_cache_file("/tmp/some-cache"),
        );
        let ctx = tvm.error_context("https://fake.com/aws/s3/fakens");
        assert_eq!(ctx.namespace, "fakens");
        assert_eq!(ctx.cache_file.as_deref(), Some("/tmp/some-cache"));
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("very-secret-auth"));
    }

    #[test]
    fn disabled_cache_file() {
        let tvm = client(TvmClientConfig::new("fakens", "fakeauth").without_cache_file());
        assert_eq!(tvm.cache_file(), None);
        assert_eq!(tvm.error_context("u").cache_file, None);
    }

    #[test]
    fn default_memory_cache_is_global() {
        let tvm = TvmClient::init_with_env(TvmClientConfig::new("a", "b"), |_| None).unwrap();
        assert!(tvm.memory_cache().ptr_eq(&MemoryCache::global()));
    }
}
