//! Credential Broker.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::warn;

use crate::error::{OrchestratorError, Result};

/// Non-extending session duration.
const SESSION_DURATION_SECONDS: i32 = 900;

/// `{credentials, expiration, tenant_id, role_arn}`. `role_arn` is `None`
/// only for the hub-bypass path, where ambient credentials are used
/// directly instead of an assumed role.
#[derive(Debug, Clone)]
pub struct AssumedSession {
    pub tenant_id: String,
    pub role_arn: Option<String>,
    pub credentials: Credentials,
    pub expiration: DateTime<Utc>,
}

impl AssumedSession {
    pub fn is_bypass(&self) -> bool {
        self.role_arn.is_none()
    }

    /// Binds this session's credentials into a fresh `SdkConfig` so every
    /// per-service client built from it (prefetch, policy actions) uses the
    /// assumed tenant credentials rather than the process's ambient ones.
    pub fn sdk_config(&self, region: &str) -> aws_config::SdkConfig {
        aws_config::SdkConfig::builder()
            .region(aws_config::Region::new(region.to_string()))
            .credentials_provider(aws_credential_types::provider::SharedCredentialsProvider::new(
                self.credentials.clone(),
            ))
            .build()
    }
}

#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn acquire(&self, tenant_id: &str, region: &str) -> Result<AssumedSession>;
}

/// STS-backed implementation. Role ARN and external ID are fully
/// deterministic, so no credential lookup table is needed.
pub struct StsCredentialBroker {
    sts_client: aws_sdk_sts::Client,
    ambient_credentials_provider: aws_credential_types::provider::SharedCredentialsProvider,
    role_name: String,
    external_id_prefix: String,
    hub_account_id: String,
}

impl StsCredentialBroker {
    pub fn new(
        sts_client: aws_sdk_sts::Client,
        ambient_credentials_provider: aws_credential_types::provider::SharedCredentialsProvider,
        role_name: impl Into<String>,
        external_id_prefix: impl Into<String>,
        hub_account_id: impl Into<String>,
    ) -> Self {
        Self {
            sts_client,
            ambient_credentials_provider,
            role_name: role_name.into(),
            external_id_prefix: external_id_prefix.into(),
            hub_account_id: hub_account_id.into(),
        }
    }

    fn role_arn(&self, tenant_id: &str) -> String {
        format!("arn:aws:iam::{tenant_id}:role/{}", self.role_name)
    }

    fn external_id(&self, tenant_id: &str) -> String {
        format!("{}-{tenant_id}", self.external_id_prefix)
    }

    async fn verify_identity(&self, session: &AssumedSession) {
        let Some(role_arn) = &session.role_arn else {
            return;
        };
        let verification = aws_sdk_sts::Client::from_conf(
            aws_sdk_sts::config::Builder::from(self.sts_client.config())
                .credentials_provider(session.credentials.clone())
                .build(),
        )
        .get_caller_identity()
        .send()
        .await;

        match verification {
            Ok(identity) => {
                if identity.account() != Some(session.tenant_id.as_str()) {
                    warn!(
                        tenant_id = %session.tenant_id,
                        role_arn = %role_arn,
                        returned_account = ?identity.account(),
                        "assumed session identity does not match tenant_id; continuing with the assumed credentials"
                    );
                }
            }
            Err(err) => {
                warn!(
                    tenant_id = %session.tenant_id,
                    role_arn = %role_arn,
                    error = %err,
                    "could not verify assumed session identity"
                );
            }
        }
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn acquire(&self, tenant_id: &str, _region: &str) -> Result<AssumedSession> {
        if tenant_id == self.hub_account_id {
            let credentials = self
                .ambient_credentials_provider
                .provide_credentials()
                .await
                .map_err(|err| OrchestratorError::CredentialFailure {
                    tenant_id: tenant_id.to_string(),
                    message: format!("hub bypass: could not resolve ambient credentials: {err}"),
                })?;
            return Ok(AssumedSession {
                tenant_id: tenant_id.to_string(),
                role_arn: None,
                expiration: Utc::now() + ChronoDuration::seconds(SESSION_DURATION_SECONDS as i64),
                credentials,
            });
        }

        let role_arn = self.role_arn(tenant_id);
        let external_id = self.external_id(tenant_id);

        let response = self
            .sts_client
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(format!("cloud-policy-orchestrator-{tenant_id}"))
            .external_id(&external_id)
            .duration_seconds(SESSION_DURATION_SECONDS)
            .send()
            .await
            .map_err(|err| OrchestratorError::CredentialFailure {
                tenant_id: tenant_id.to_string(),
                message: format!(
                    "assume-role on {role_arn} failed ({err}). Verify the role's trust policy \
                     allows this hub account and requires external id '{external_id}'."
                ),
            })?;

        let sts_credentials = response.credentials().ok_or_else(|| OrchestratorError::CredentialFailure {
            tenant_id: tenant_id.to_string(),
            message: "assume-role response carried no credentials".to_string(),
        })?;

        let expiration = DateTime::from_timestamp(sts_credentials.expiration().secs(), 0)
            .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(SESSION_DURATION_SECONDS as i64));

        let credentials = Credentials::new(
            sts_credentials.access_key_id(),
            sts_credentials.secret_access_key(),
            Some(sts_credentials.session_token().to_string()),
            Some(expiration.into()),
            "cloud-policy-orchestrator-assume-role",
        );

        let session = AssumedSession {
            tenant_id: tenant_id.to_string(),
            role_arn: Some(role_arn),
            expiration,
            credentials,
        };

        self.verify_identity(&session).await;

        Ok(session)
    }
}
