use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TvmError};

// ============ Credential Record ============

/// Opaque credential payload as returned by the TVM.
///
/// Every credential kind has its own schema, but the cache layers only care
/// about the `expiration` field (an ISO-8601 UTC timestamp). The record keeps
/// the raw JSON object so that it round-trips through the file cache
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRecord(Map<String, Value>);

impl CredentialRecord {
    /// Wrap an already parsed JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a response body. Anything other than a JSON object is rejected.
    pub fn from_json_str(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// The raw `expiration` string, if present.
    pub fn expiration(&self) -> Option<&str> {
        self.0.get("expiration").and_then(Value::as_str)
    }

    /// Look up a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record into a plain JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Convert into one of the typed credential views.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for CredentialRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// ============ Credential Kind ============

/// TVM endpoint a credential request is addressed to.
///
/// All kinds go through the same fetch routine; the variant only decides the
/// endpoint path and whether the response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialKind {
    /// Temporary AWS S3 credentials scoped to the namespace prefix.
    AwsS3,
    /// SAS URLs for a private and a public Azure blob container.
    AzureBlob,
    /// Resource token for a single Azure Cosmos partition.
    AzureCosmos,
    /// Signed URL for a single blob. Needs [`PresignOptions`].
    AzurePresign,
    /// Revoke every presigned URL issued for the namespace.
    AzureRevoke,
}

impl CredentialKind {
    /// Endpoint path relative to the TVM base URL.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::AwsS3 => "aws/s3",
            Self::AzureBlob => "azure/blob",
            Self::AzureCosmos => "azure/cosmos",
            Self::AzurePresign => "azure/presign",
            Self::AzureRevoke => "azure/revoke",
        }
    }

    /// Presign and revoke are one-shot actions, never served from cache.
    pub fn is_cacheable(self) -> bool {
        matches!(self, Self::AwsS3 | Self::AzureBlob | Self::AzureCosmos)
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

// ============ Presign ============

/// Parameters for [`CredentialKind::AzurePresign`].
///
/// Every field is required; they are optional here so that a missing one can
/// be reported by name as [`TvmError::MissingOption`] before any request is
/// sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignOptions {
    /// Blob to sign, relative to the namespace container.
    pub blob_name: Option<String>,
    /// Lifetime of the signed URL.
    pub expiry_in_seconds: Option<u64>,
    /// Azure permission letters, e.g. `"r"` or `"rwd"`.
    pub permissions: Option<String>,
}

impl PresignOptions {
    pub fn new(
        blob_name: impl Into<String>,
        expiry_in_seconds: u64,
        permissions: impl Into<String>,
    ) -> Self {
        Self {
            blob_name: Some(blob_name.into()),
            expiry_in_seconds: Some(expiry_in_seconds),
            permissions: Some(permissions.into()),
        }
    }

    /// Check required fields and render them as query parameters.
    pub(crate) fn to_query(&self) -> Result<Vec<(&'static str, String)>> {
        let blob_name = self
            .blob_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TvmError::missing_option("blobName"))?;
        let expiry = self
            .expiry_in_seconds
            .ok_or_else(|| TvmError::missing_option("expiryInSeconds"))?;
        let permissions = self
            .permissions
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TvmError::missing_option("permissions"))?;

        Ok(vec![
            ("blobName", blob_name.to_string()),
            ("expiryInSeconds", expiry.to_string()),
            ("permissions", permissions.to_string()),
        ])
    }
}

// ============ Typed Views ============

/// Bucket scope of [`AwsS3Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsS3Params {
    #[serde(rename = "Bucket")]
    pub bucket: String,
}

/// Temporary AWS credentials restricted to the `<namespace>/` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsS3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
    pub params: AwsS3Params,
}

/// SAS URLs for the namespace's private and public blob containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureBlobCredentials {
    #[serde(rename = "sasURLPrivate")]
    pub sas_url_private: String,
    #[serde(rename = "sasURLPublic")]
    pub sas_url_public: String,
    pub expiration: String,
}

/// Resource token scoped to one Cosmos partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCosmosCredentials {
    pub endpoint: String,
    pub resource_token: String,
    pub database_id: String,
    pub container_id: String,
    pub partition_key: String,
    pub expiration: String,
}

/// Signature for a single presigned blob URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePresignCredentials {
    pub signature: String,
}
