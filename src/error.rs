use thiserror::Error;

/// Error taxonomy. Each variant names the boundary it crosses: per-policy
/// failures are captured into a `PolicyResult` by the invocation loop and
/// never become an `Err` here; everything else aborts the invocation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("credential acquisition failed for tenant {tenant_id}: {message}")]
    CredentialFailure { tenant_id: String, message: String },

    #[error("policy load failed for {source_file}: {message}")]
    PolicyLoad { source_file: String, message: String },

    #[error("policy execution failed for {policy_name}: {message}")]
    PolicyExecution {
        policy_name: String,
        message: String,
    },

    #[error("notification rendering failed for {policy_name}: {message}")]
    NotificationRender {
        policy_name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    #[error("unexpected error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
