//! 共享测试工具和辅助函数

#![allow(dead_code)]

use std::path::PathBuf;

use serde_json::{Value, json};
use tvm_client::cache::{MemoryCache, derive_cache_key};
use tvm_client::{CredentialKind, RetryOptions, TvmClient, TvmClientConfig, join_url};
use wiremock::MockServer;

pub const NAMESPACE: &str = "fakens";
pub const AUTH: &str = "fakeauth";
/// base64("fakeauth")
pub const AUTH_HEADER: &str = "Basic ZmFrZWF1dGg=";

pub const FAR_FUTURE: &str = "2999-01-01T00:00:00.000Z";
pub const PAST: &str = "2000-01-01T00:00:00.000Z";

/// 跳过测试的宏（当环境变量缺失时）
#[macro_export]
macro_rules! skip_if_no_credentials {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("跳过测试: 缺少环境变量 {}", $var);
                return;
            }
        )+
    };
}

/// 断言 `Option` 为 `Some`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_some {
    ($expr:expr $(,)?) => {{
        let opt = $expr;
        assert!(opt.is_some(), "expected Some(..), got None");
        let Some(val) = opt else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let opt = $expr;
        assert!(opt.is_some(), "{}", format_args!($($msg)+));
        let Some(val) = opt else {
            return;
        };
        val
    }};
}

/// 断言 `Result` 为 `Ok`，并解包返回内部值（失败则直接让测试失败）。
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
    ($expr:expr, $($msg:tt)+) => {{
        let res = $expr;
        assert!(
            res.is_ok(),
            "{}: {res:?}",
            format_args!($($msg)+)
        );
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// 断言 `Result` 为 `Err`，并解包返回错误值。
#[macro_export]
macro_rules! require_err {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_err(), "expected Err(..), got {res:?}");
        let Err(err) = res else {
            return;
        };
        err
    }};
}

/// 快速重试配置，避免测试等待过久
pub fn fast_retry() -> RetryOptions {
    RetryOptions {
        max_retries: 3,
        initial_delay_ms: 10,
        max_wait_ms: 50,
    }
}

/// 模拟 `aws/s3` 响应
pub fn s3_response(expiration: &str) -> Value {
    json!({
        "accessKeyId": "fake",
        "secretAccessKey": "fake",
        "sessionToken": "fake",
        "expiration": expiration,
        "params": { "Bucket": "fake" }
    })
}

/// 模拟 `azure/blob` 响应
pub fn blob_response(expiration: &str) -> Value {
    json!({
        "sasURLPrivate": "https://fake.blob.core.windows.net/private?sig=fake",
        "sasURLPublic": "https://fake.blob.core.windows.net/public?sig=fake",
        "expiration": expiration
    })
}

/// 模拟 `azure/cosmos` 响应
pub fn cosmos_response(expiration: &str) -> Value {
    json!({
        "endpoint": "https://fake.documents.azure.com:443/",
        "resourceToken": "fake",
        "databaseId": "fakedb",
        "containerId": "fakecontainer",
        "partitionKey": NAMESPACE,
        "expiration": expiration
    })
}

/// 测试上下文 - 封装 mock 服务器和临时缓存目录
pub struct TestContext {
    pub server: MockServer,
    pub dir: tempfile::TempDir,
    pub memory: MemoryCache,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().expect("创建临时目录失败"),
            memory: MemoryCache::new(),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join(".tvmCache")
    }

    /// mock 服务器地址 + 临时缓存文件 + 快速重试
    pub fn config(&self) -> TvmClientConfig {
        TvmClientConfig::new(NAMESPACE, AUTH)
            .with_api_url(self.server.uri())
            .with_cache_file(self.cache_path())
            .with_retry(fast_retry())
    }

    /// 使用隔离内存缓存的客户端
    pub fn client(&self) -> TvmClient {
        self.client_with(self.config())
    }

    pub fn client_with(&self, config: TvmClientConfig) -> TvmClient {
        TvmClient::init_with_env(config, |_| None)
            .expect("初始化客户端失败")
            .with_memory_cache(self.memory.clone())
    }

    /// 该上下文中 `kind` 对应的缓存键
    pub fn key(&self, kind: CredentialKind) -> String {
        let full_url = join_url(&[&self.server.uri(), kind.endpoint()]);
        derive_cache_key(&full_url, NAMESPACE, AUTH)
    }

    /// 直接写入缓存文件
    pub async fn seed_cache_file(&self, content: &Value) {
        tokio::fs::write(self.cache_path(), content.to_string())
            .await
            .expect("写入缓存文件失败");
    }

    pub async fn read_cache_file(&self) -> Value {
        let content = tokio::fs::read(self.cache_path())
            .await
            .expect("读取缓存文件失败");
        serde_json::from_slice(&content).expect("缓存文件不是合法 JSON")
    }

    pub async fn received_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}
