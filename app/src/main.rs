use clap::{Args, Parser, Subcommand};
use pc_config::Config;
use pc_core::{telemetry, Error};
use pc_push::{
    BackoffConfig, BatchResponse, HttpTransport, PushError, PushSender, SendRequest,
    TransportLimits,
};
use std::collections::HashMap;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pushcast", version, about = "Send push notification batches with retries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one payload to a list of recipient tokens
    Send(SendArgs),
    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Recipient token; repeat for more recipients
    #[arg(long = "token", required = true)]
    tokens: Vec<String>,
    /// Payload entry as key=value; repeatable
    #[arg(long = "data", value_parser = parse_key_value)]
    data: Vec<(String, String)>,
    /// Retry rounds for unavailable recipients (defaults to retry.max_retries)
    #[arg(long, allow_negative_numbers = true)]
    retries: Option<i32>,
    #[arg(long)]
    collapse_key: Option<String>,
    /// Time-to-live in seconds
    #[arg(long)]
    ttl: Option<u32>,
    #[arg(long)]
    dry_run: bool,
    /// Give up on the whole call after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn build_sender(config: &Config) -> pc_push::Result<PushSender> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.push.timeout_seconds))
        .build()?;
    let endpoint = url::Url::parse(&config.push.endpoint)
        .map_err(|e| PushError::Config(format!("Invalid push endpoint: {}", e)))?;
    let mut transport = HttpTransport::with_client(client, endpoint, config.push.api_key.as_str())?;

    if config.push.max_recipients.is_some() || config.push.max_time_to_live_seconds.is_some() {
        let defaults = TransportLimits::default();
        transport = transport.with_limits(TransportLimits {
            max_recipients: config.push.max_recipients.unwrap_or(defaults.max_recipients),
            max_time_to_live: config
                .push
                .max_time_to_live_seconds
                .or(defaults.max_time_to_live),
        });
    }

    Ok(PushSender::new(Arc::new(transport)).with_backoff(BackoffConfig {
        initial_delay_ms: config.retry.initial_delay_ms,
        max_delay_ms: config.retry.max_delay_ms,
        jitter_percent: config.retry.jitter_percent,
    }))
}

fn build_request(args: &SendArgs) -> SendRequest {
    let data: HashMap<String, String> = args.data.iter().cloned().collect();
    let mut request = SendRequest::new(data, args.tokens.iter().cloned()).dry_run(args.dry_run);
    if let Some(key) = &args.collapse_key {
        request = request.with_collapse_key(key.clone());
    }
    if let Some(ttl) = args.ttl {
        request = request.with_time_to_live(ttl);
    }
    request
}

fn to_app_error(err: PushError) -> Error {
    match err {
        PushError::Config(msg) => Error::Config(msg),
        PushError::Validation(msg) => Error::Validation(msg),
        other => Error::External(other.to_string()),
    }
}

async fn send_command(config: &Config, args: &SendArgs) -> pc_core::Result<BatchResponse> {
    let sender = build_sender(config).map_err(to_app_error)?;
    let request = build_request(args);
    let retries = args.retries.unwrap_or(config.retry.max_retries);

    tracing::info!(
        request_id = %request.id,
        recipients = request.len(),
        retries,
        "Sending push batch"
    );

    let call = sender.send_with_retry(&request, retries);
    let result = match args.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), call)
            .await
            .map_err(|_| Error::External(format!("send timed out after {}s", secs)))?,
        None => call.await,
    };
    result.map_err(to_app_error)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration - exit with non-zero if invalid
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    telemetry::init_tracing(
        &config.telemetry.environment,
        &config.telemetry.service_name,
    );
    tracing::debug!(?config, "Configuration loaded successfully");

    match cli.command {
        Command::Config => println!("{:#?}", config),
        Command::Send(args) => match send_command(&config, &args).await {
            Ok(response) => match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!("Failed to encode response: {}", e);
                    process::exit(1);
                }
            },
            Err(e) => {
                tracing::error!("Send failed: {}", e);
                process::exit(1);
            }
        },
    }
}
