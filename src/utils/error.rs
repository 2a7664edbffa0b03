use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Extract failed for {endpoint}: {reason}")]
    ExtractError { endpoint: String, reason: String },

    #[error("Transform failed: {message} (record: {record})")]
    TransformError { message: String, record: String },

    #[error("Load into {collection} failed after {loaded} documents: {message}")]
    LoadError {
        collection: String,
        loaded: usize,
        message: String,
    },

    #[error("Staging for {collection} failed after {staged} documents, target left unchanged: {message}")]
    StagingError {
        collection: String,
        staged: usize,
        message: String,
    },

    #[error("Validation error on '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("Store error: {message}")]
    StoreError { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[cfg(feature = "libsql-store")]
    #[error("libSQL error: {0}")]
    DatabaseError(#[from] libsql::Error),

    #[cfg(feature = "mongodb-store")]
    #[error("MongoDB error: {0}")]
    MongoError(#[from] mongodb::error::Error),

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Data,
    Storage,
    Validation,
    Configuration,
    System,
}

/// 嚴重程度，決定 CLI 的退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn extract(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExtractError {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreError {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ExtractError { .. } | Self::ApiError(_) => ErrorCategory::Network,
            Self::TransformError { .. } | Self::SerializationError(_) => ErrorCategory::Data,
            Self::LoadError { .. } | Self::StagingError { .. } | Self::StoreError { .. } => {
                ErrorCategory::Storage
            }
            #[cfg(feature = "libsql-store")]
            Self::DatabaseError(_) => ErrorCategory::Storage,
            #[cfg(feature = "mongodb-store")]
            Self::MongoError(_) => ErrorCategory::Storage,
            Self::ValidationError { .. } => ErrorCategory::Validation,
            Self::TomlError(_)
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 上游暫時性問題，重跑通常即可
            Self::ExtractError { .. } | Self::ApiError(_) => ErrorSeverity::Medium,
            Self::ValidationError { .. } => ErrorSeverity::Low,
            Self::TransformError { .. } | Self::SerializationError(_) => ErrorSeverity::High,
            Self::LoadError { .. } | Self::StagingError { .. } => ErrorSeverity::High,
            Self::StoreError { .. } | Self::IoError(_) => ErrorSeverity::Critical,
            #[cfg(feature = "libsql-store")]
            Self::DatabaseError(_) => ErrorSeverity::Critical,
            #[cfg(feature = "mongodb-store")]
            Self::MongoError(_) => ErrorSeverity::Critical,
            Self::TomlError(_)
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
        }
    }

    /// 寫入中途失敗時，目標集合中已寫入的文件數
    pub fn loaded_count(&self) -> Option<usize> {
        match self {
            Self::LoadError { loaded, .. } => Some(*loaded),
            // 暫存集合的內容從未出現在目標集合
            Self::StagingError { .. } => Some(0),
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check the upstream endpoint and network access, then re-run the refresh"
            }
            ErrorCategory::Data => {
                "Inspect the offending upstream record; the transform should accept any shape"
            }
            ErrorCategory::Storage => {
                "Verify the store URI and that the store is reachable; re-run once it responds"
            }
            ErrorCategory::Validation => "Fix the rejected field and submit the request again",
            ErrorCategory::Configuration => {
                "Review the TOML configuration and required environment variables"
            }
            ErrorCategory::System => "Check file permissions and free disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ExtractError { endpoint, .. } => {
                format!("Could not fetch data from {}", endpoint)
            }
            Self::LoadError {
                collection, loaded, ..
            } => format!(
                "Writing to '{}' stopped after {} documents; the collection may be incomplete",
                collection, loaded
            ),
            Self::StagingError {
                collection, staged, ..
            } => format!(
                "Refreshing '{}' failed after staging {} documents; the collection still holds its previous contents",
                collection, staged
            ),
            Self::ValidationError { field, message } => format!("{}: {}", field, message),
            other => other.to_string(),
        }
    }
}
