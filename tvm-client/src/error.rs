use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request context attached to remote failures.
///
/// Carries enough to locate the failing call in logs. The caller's auth
/// secret is never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// Caller namespace the request was made for.
    pub namespace: String,
    /// Full request URL, namespace segment included.
    pub url: String,
    /// Cache file in use, if file caching is enabled.
    pub cache_file: Option<String>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "namespace={}, url={}", self.namespace, self.url)?;
        if let Some(path) = &self.cache_file {
            write!(f, ", cacheFile={path}")?;
        }
        Ok(())
    }
}

/// Unified error type for all TVM client operations.
///
/// Cache-layer failures never surface here: a missing, corrupt or
/// unwritable cache file degrades to a cache miss.
///
/// # Retry behaviour
///
/// 5xx responses and transport failures are retried by the backoff requester
/// before they reach the caller as [`Response`](Self::Response) or
/// [`Network`](Self::Network).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum TvmError {
    /// Invalid or missing construction input, or an HTTP client that could
    /// not be built. Raised only while constructing a client; never retried.
    #[serde(rename = "ERROR_BAD_ARGUMENT")]
    #[error("[ERROR_BAD_ARGUMENT] {detail}")]
    BadArgument {
        /// What was wrong with the input.
        detail: String,
    },

    /// A call-specific required parameter is absent.
    #[serde(rename = "ERROR_MISSING_OPTION")]
    #[error("[ERROR_MISSING_OPTION] missing required option '{option}'")]
    MissingOption {
        /// Name of the missing parameter, as sent on the wire.
        option: String,
    },

    /// The TVM answered with a non-2xx status (after retries, for 5xx).
    #[serde(rename = "ERROR_RESPONSE")]
    #[error("[ERROR_RESPONSE] error response from TVM with status {status} ({context})")]
    Response {
        /// HTTP status code of the last response.
        status: u16,
        /// Raw response body.
        body: String,
        /// Redacted request context.
        context: ErrorContext,
    },

    /// The request could not be completed at the transport level.
    #[serde(rename = "ERROR_NETWORK")]
    #[error("[ERROR_NETWORK] {detail} ({context})")]
    Network {
        /// Transport error details.
        detail: String,
        /// Redacted request context.
        context: ErrorContext,
    },

    /// The TVM returned 2xx but the body is not a JSON object.
    #[serde(rename = "ERROR_PARSE")]
    #[error("[ERROR_PARSE] {detail} ({context})")]
    Parse {
        /// Parser error details.
        detail: String,
        /// Redacted request context.
        context: ErrorContext,
    },
}

impl TvmError {
    pub(crate) fn bad_argument(detail: impl Into<String>) -> Self {
        Self::BadArgument {
            detail: detail.into(),
        }
    }

    pub(crate) fn missing_option(option: impl Into<String>) -> Self {
        Self::MissingOption {
            option: option.into(),
        }
    }

    /// Stable string code of the error, matching its serialized `code` tag.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadArgument { .. } => "ERROR_BAD_ARGUMENT",
            Self::MissingOption { .. } => "ERROR_MISSING_OPTION",
            Self::Response { .. } => "ERROR_RESPONSE",
            Self::Network { .. } => "ERROR_NETWORK",
            Self::Parse { .. } => "ERROR_PARSE",
        }
    }

    /// HTTP status of a [`Response`](Self::Response) error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 是否为预期行为（调用方输入错误、4xx 响应），用于日志分级。
    ///
    /// 返回 `true` 时应使用 `warn` 级别，`false` 时使用 `error` 级别。
    /// **新增变体时请同步更新此方法。**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::BadArgument { .. } | Self::MissingOption { .. } => true,
            Self::Response { status, .. } => (400..500).contains(status),
            Self::Network { .. } | Self::Parse { .. } => false,
        }
    }
}

/// Convenience type alias for `Result<T, TvmError>`.
pub type Result<T> = std::result::Result<T, TvmError>;
