use std::env;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

const DEFAULT_ACCOUNT_MAPPING_KEY: &str = "config/account-policy-mapping.json";
const DEFAULT_ROLE_NAME: &str = "CloudCustodianExecutionRole";
const DEFAULT_EXTERNAL_ID_PREFIX: &str = "cloud-custodian";

/// Output format for CLI commands.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Per-invocation CLI arguments shared by `invoke` and `dry-run`.
#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// Path to a JSON file containing one inbound event envelope.
    #[arg(long)]
    pub event: PathBuf,

    /// Object-storage bucket holding policy files and the account mapping.
    #[arg(long, env = "POLICY_BUCKET")]
    pub policy_bucket: String,

    /// Key of the account-policy mapping file within the policy bucket.
    #[arg(long, env = "ACCOUNT_MAPPING_KEY")]
    pub account_mapping_key: Option<String>,

    /// Target role name assumed in each tenant account.
    #[arg(long, env = "CROSS_ACCOUNT_ROLE_NAME")]
    pub cross_account_role_name: Option<String>,

    /// Prefix used to build the deterministic external ID.
    #[arg(long, env = "EXTERNAL_ID_PREFIX")]
    pub external_id_prefix: Option<String>,

    /// Account ID the orchestrator itself runs in (the hub).
    #[arg(long, env = "HUB_ACCOUNT_ID")]
    pub hub_account_id: String,

    /// Output format for the invocation result.
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Parser)]
#[command(
    name = "cloud-policy-orchestrator",
    version,
    about = "Event-driven multi-account cloud policy orchestrator.",
    long_about = "Classifies an inbound cloud control-plane event, resolves it to policies via a two-tier account/global mapping, assumes a cross-account role, executes the resolved policies against the exact resources the event named, and drains any real-time notifications the policies produced."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one event through the full pipeline.
    Invoke(InvokeArgs),
    /// Run one event through the pipeline without executing actions.
    DryRun(InvokeArgs),
    /// Print the resolved configuration and exit.
    ExplainConfig(InvokeArgs),
}

/// Complete configuration used by one invocation of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorConfig {
    pub event_path: PathBuf,
    pub policy_bucket: String,
    pub account_mapping_key: String,
    pub cross_account_role_name: String,
    pub external_id_prefix: String,
    pub hub_account_id: String,
    pub dry_run: bool,
    pub explain_only: bool,
    #[serde(skip)]
    pub output: OutputFormat,
    #[serde(skip)]
    pub config_warnings: Vec<String>,
}

impl OrchestratorConfig {
    pub fn from_env_and_args(cli: CliArgs) -> Result<Self> {
        let (args, dry_run, explain_only) = match cli.command {
            Command::Invoke(args) => (args, false, false),
            Command::DryRun(args) => (args, true, false),
            Command::ExplainConfig(args) => (args, true, true),
        };

        if !args.event.exists() {
            return Err(OrchestratorError::ConfigInvalid(format!(
                "event file {} does not exist",
                args.event.display()
            )));
        }

        let mut warnings = Vec::new();

        let account_mapping_key = args.account_mapping_key.unwrap_or_else(|| {
            warnings.push(format!(
                "ACCOUNT_MAPPING_KEY not set; defaulting to '{DEFAULT_ACCOUNT_MAPPING_KEY}'"
            ));
            DEFAULT_ACCOUNT_MAPPING_KEY.to_string()
        });
        let cross_account_role_name = args.cross_account_role_name.unwrap_or_else(|| {
            warnings.push(format!(
                "CROSS_ACCOUNT_ROLE_NAME not set; defaulting to '{DEFAULT_ROLE_NAME}'"
            ));
            DEFAULT_ROLE_NAME.to_string()
        });
        let external_id_prefix = args.external_id_prefix.unwrap_or_else(|| {
            warnings.push(format!(
                "EXTERNAL_ID_PREFIX not set; defaulting to '{DEFAULT_EXTERNAL_ID_PREFIX}'"
            ));
            DEFAULT_EXTERNAL_ID_PREFIX.to_string()
        });

        Ok(Self {
            event_path: args.event,
            policy_bucket: args.policy_bucket,
            account_mapping_key,
            cross_account_role_name,
            external_id_prefix,
            hub_account_id: args.hub_account_id,
            dry_run,
            explain_only,
            output: args.output,
            config_warnings: warnings,
        })
    }
}

/// Resolves `LOG_LEVEL` to a `tracing_subscriber::EnvFilter` directive.
pub fn log_level() -> String {
    env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_args(event: &std::path::Path) -> Vec<String> {
        vec![
            "cloud-policy-orchestrator".to_string(),
            "invoke".to_string(),
            "--event".to_string(),
            event.display().to_string(),
            "--policy-bucket".to_string(),
            "policies.example".to_string(),
            "--hub-account-id".to_string(),
            "111111111111".to_string(),
        ]
    }

    #[test]
    fn defaults_account_mapping_key_with_warning() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let cli = CliArgs::parse_from(base_args(file.path()));
        let config = OrchestratorConfig::from_env_and_args(cli).expect("config builds");
        assert_eq!(config.account_mapping_key, DEFAULT_ACCOUNT_MAPPING_KEY);
        assert!(
            config
                .config_warnings
                .iter()
                .any(|w| w.contains("ACCOUNT_MAPPING_KEY"))
        );
    }

    #[test]
    fn rejects_missing_event_file() {
        let mut args = base_args(std::path::Path::new("/nonexistent/event.json"));
        args[3] = "/nonexistent/event.json".to_string();
        let cli = CliArgs::parse_from(args);
        let err = OrchestratorConfig::from_env_and_args(cli).unwrap_err();
        assert!(format!("{err}").contains("does not exist"));
    }

    #[test]
    fn dry_run_subcommand_sets_flag() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let mut args = base_args(file.path());
        args[1] = "dry-run".to_string();
        let cli = CliArgs::parse_from(args);
        let config = OrchestratorConfig::from_env_and_args(cli).expect("config builds");
        assert!(config.dry_run);
        assert!(!config.explain_only);
    }
}
