use clap::Parser;

use cloud_policy_orchestrator::config::OutputFormat;
use cloud_policy_orchestrator::{CliArgs, Handler, OrchestratorConfig};
use cloud_policy_orchestrator::credentials::StsCredentialBroker;
use cloud_policy_orchestrator::notify::LoggingNotificationChannel;
use cloud_policy_orchestrator::policy::S3ObjectStore;
use cloud_policy_orchestrator::queue::InMemoryNotifyQueue;
use cloud_policy_orchestrator::resources::AwsPrefetcherFactory;

#[tokio::main]
async fn main() {
    cloud_policy_orchestrator::telemetry::init();

    let cli = CliArgs::parse();
    let config = match OrchestratorConfig::from_env_and_args(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if !config.config_warnings.is_empty() {
        eprintln!("configuration warnings:");
        for warning in &config.config_warnings {
            eprintln!("- {warning}");
        }
    }

    if config.explain_only {
        print_payload(&config, config.output);
        return;
    }

    if let Err(err) = run(&config).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(config: &OrchestratorConfig) -> cloud_policy_orchestrator::Result<()> {
    let event_bytes = std::fs::read(&config.event_path)?;
    let raw_event: serde_json::Value = serde_json::from_slice(&event_bytes)?;

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ambient_credentials_provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| cloud_policy_orchestrator::OrchestratorError::ConfigInvalid(
            "no ambient AWS credentials provider resolved".to_string(),
        ))?;

    let object_store = S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk_config));
    let credential_broker = StsCredentialBroker::new(
        aws_sdk_sts::Client::new(&sdk_config),
        ambient_credentials_provider,
        &config.cross_account_role_name,
        &config.external_id_prefix,
        &config.hub_account_id,
    );
    let notify_queue = InMemoryNotifyQueue::new();
    let notification_channel = LoggingNotificationChannel;
    let prefetcher_factory = AwsPrefetcherFactory;

    let handler = Handler {
        config,
        object_store: &object_store,
        credential_broker: &credential_broker,
        notify_queue: &notify_queue,
        notification_channel: &notification_channel,
        prefetcher_factory: &prefetcher_factory,
        pre_validator: None,
    };

    let result = handler.handle(&raw_event, config.dry_run).await?;
    print_payload(&result, config.output);
    Ok(())
}

fn print_payload<T: serde::Serialize + std::fmt::Debug>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(payload) => println!("{payload}"),
            Err(_) => println!("{value:#?}"),
        },
        OutputFormat::Yaml => match serde_yaml_bw::to_string(value) {
            Ok(payload) => println!("{payload}"),
            Err(_) => println!("{value:#?}"),
        },
        OutputFormat::Text => println!("{value:#?}"),
    }
}
