//! # tvm-client
//!
//! Client for a token vending machine (TVM): exchanges an OpenWhisk
//! namespace and auth secret for short-lived cloud storage credentials.
//!
//! ## Supported Endpoints
//!
//! | Kind | Endpoint | Cached |
//! |------|----------|--------|
//! | [`CredentialKind::AwsS3`] | `aws/s3` | yes |
//! | [`CredentialKind::AzureBlob`] | `azure/blob` | yes |
//! | [`CredentialKind::AzureCosmos`] | `azure/cosmos` | yes |
//! | [`CredentialKind::AzurePresign`] | `azure/presign` | no |
//! | [`CredentialKind::AzureRevoke`] | `azure/revoke` | no |
//!
//! ## Feature Flags
//!
//! - **`native-tls`** *(default)* — Use the platform's native TLS implementation.
//! - **`rustls`** — Use rustls. Recommended for cross-compilation and static builds.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tvm_client::{TvmClient, TvmClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Namespace and auth fall back to __OW_NAMESPACE / __OW_AUTH
//!     let tvm = TvmClient::init(TvmClientConfig::default())?;
//!
//!     let creds = tvm.get_aws_s3_credentials().await?;
//!     println!("bucket={} expires={}", creds.params.bucket, creds.expiration);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Caching
//!
//! Cacheable kinds are looked up in a process-wide memory cache, then in a
//! JSON cache file (`<tmpdir>/.tvmCache` unless configured otherwise), and
//! only then fetched. Entries stay valid until one minute before their
//! `expiration`.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, TvmError>`](TvmError). Every error
//! carries a stable code:
//!
//! - [`TvmError::BadArgument`] — `ERROR_BAD_ARGUMENT`, invalid configuration
//! - [`TvmError::MissingOption`] — `ERROR_MISSING_OPTION`, presign option absent
//! - [`TvmError::Response`] — `ERROR_RESPONSE`, non-2xx status from the TVM
//! - [`TvmError::Network`] — `ERROR_NETWORK`, transport failure after retries
//! - [`TvmError::Parse`] — `ERROR_PARSE`, unexpected response body
//!
//! 5xx responses and transport failures are retried with exponential backoff
//! (see [`RetryOptions`]).

pub mod cache;
mod client;
mod config;
mod error;
mod http_client;
mod types;
mod utils;

pub use client::TvmClient;

pub use config::{
    CacheFileSetting, DEFAULT_API_KEY, DEFAULT_CACHE_FILE_NAME, ENV_AUTH, ENV_NAMESPACE,
    ENV_TVM_ENV, OwCredentials, PRODUCTION_API_URL, ResolvedConfig, RetryOptions, STAGE_API_URL,
    TvmClientConfig,
};

pub use error::{ErrorContext, Result, TvmError};

pub use http_client::{BackoffRequester, RawResponse, backoff_delay, max_total_wait};

pub use types::{
    AwsS3Credentials, AwsS3Params, AzureBlobCredentials, AzureCosmosCredentials,
    AzurePresignCredentials, CredentialKind, CredentialRecord, PresignOptions,
};

pub use utils::url::join as join_url;
