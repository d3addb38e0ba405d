use std::{path::PathBuf, process, sync::Arc};

use anyhow::anyhow;
use clap::{ArgGroup, Parser, Subcommand};
use messenger_relay::requirements::{Requirements, ValidationReport};
use messenger_relay::server;
use messenger_relay::values::{HttpMode, Values};
use messenger_relay_core::{
    Dispatcher, HttpSender, MessageSender, RecordingSender, WebhookRelay, decode_envelope,
    sign_payload,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "messenger-relay")]
#[command(about = "Relay messenger webhook deliveries back through the send API", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook endpoint.
    Serve {
        #[arg(long, value_name = "VALUES_JSON")]
        values: Option<PathBuf>,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Print the X-Hub-Signature value for a body.
    #[command(group(
        ArgGroup::new("input")
            .required(true)
            .args(["body", "body_file"])
    ))]
    Sign {
        #[arg(long)]
        secret: String,
        #[arg(long, group = "input")]
        body: Option<String>,
        #[arg(long = "body-file", value_name = "BODY_FILE", group = "input")]
        body_file: Option<PathBuf>,
    },
    /// Decode an envelope and print the payloads it would produce.
    #[command(group(
        ArgGroup::new("input")
            .required(true)
            .args(["body", "body_file"])
    ))]
    Dispatch {
        #[arg(long, value_name = "VALUES_JSON")]
        values: Option<PathBuf>,
        #[arg(long, group = "input")]
        body: Option<String>,
        #[arg(long = "body-file", value_name = "BODY_FILE", group = "input")]
        body_file: Option<PathBuf>,
    },
    /// Print the settings the relay needs.
    Requirements,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let exit_code = match run(cli.command) {
        Ok(_) => 0,
        Err(err) => {
            if !matches!(err, CliError::Validation { .. }) {
                eprintln!("error: {err}");
            }
            err.exit_code()
        }
    };
    process::exit(exit_code);
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,messenger_relay=debug,messenger_relay_core=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Serve {
            values,
            host,
            port,
            path,
        } => handle_serve(values, host, port, path),
        Command::Sign {
            secret,
            body,
            body_file,
        } => handle_sign(secret, body, body_file),
        Command::Dispatch {
            values,
            body,
            body_file,
        } => handle_dispatch(values, body, body_file),
        Command::Requirements => handle_requirements(),
    }
}

fn load_values(values_path: Option<PathBuf>) -> Result<Values, CliError> {
    let mut values = Values::from_env();
    if let Some(path) = values_path {
        let file = Values::load(&path).map_err(|err| CliError::ValuesLoad(path.clone(), err))?;
        values.merge(file);
    }
    Ok(values)
}

fn handle_serve(
    values_path: Option<PathBuf>,
    host: String,
    port: u16,
    path: String,
) -> Result<(), CliError> {
    if !path.starts_with('/') {
        return Err(CliError::Listen(format!(
            "route path '{path}' must start with '/'"
        )));
    }
    let values = load_values(values_path)?;
    let report = Requirements::relay().validate(&values);
    if !report.is_empty() {
        print_missing(&report);
        return Err(CliError::Validation { report });
    }
    let config = Arc::new(
        values
            .relay_config()
            .map_err(|err| CliError::Settings(err.into()))?,
    );
    let sender: Arc<dyn MessageSender> = match values.http_mode() {
        HttpMode::Real => Arc::new(HttpSender::new(config.send_endpoint.clone())),
        HttpMode::Mock => {
            warn!("http mode is mock; payloads are logged, not sent");
            Arc::new(RecordingSender::new(config.send_endpoint.clone()).with_history_limit(0))
        }
    };
    info!(?config, "relay configured");
    let app = server::router(WebhookRelay::new(config, sender), &path);

    let bind_addr = format!("{host}:{port}");
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Listen(err.to_string()))?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|err| CliError::Listen(format!("{bind_addr}: {err}")))?;
        server::serve(listener, app)
            .await
            .map_err(|err| CliError::Listen(err.to_string()))
    })
}

fn handle_sign(
    secret: String,
    body: Option<String>,
    body_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let body = resolve_body(body, body_file)?;
    println!("{}", sign_payload(&body, secret.as_bytes()));
    Ok(())
}

fn handle_dispatch(
    values_path: Option<PathBuf>,
    body: Option<String>,
    body_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let values = load_values(values_path)?;
    let policy = values
        .dispatch_policy()
        .map_err(|err| CliError::Settings(err.into()))?;
    let body = resolve_body(body, body_file)?;
    let envelope = decode_envelope(&body).map_err(|err| CliError::Decode(err.into()))?;
    let dispatcher = Dispatcher::new(policy);
    let payloads: Vec<_> = envelope
        .events()
        .flat_map(|event| dispatcher.dispatch(event))
        .collect();
    let output = json!({ "payloads": payloads });
    println!("{}", to_pretty(&output)?);
    Ok(())
}

fn handle_requirements() -> Result<(), CliError> {
    println!("{}", to_pretty(&Requirements::relay())?);
    Ok(())
}

fn resolve_body(body: Option<String>, body_file: Option<PathBuf>) -> Result<Vec<u8>, CliError> {
    match (body, body_file) {
        (Some(b), None) => Ok(b.into_bytes()),
        (None, Some(file)) => {
            std::fs::read(&file).map_err(|err| CliError::BodyInput(file.clone(), err.into()))
        }
        (Some(_), Some(_)) => Err(CliError::Usage(
            "--body and --body-file cannot be provided together".to_string(),
        )),
        (None, None) => Err(CliError::Usage(
            "--body or --body-file is required".to_string(),
        )),
    }
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|err| CliError::Settings(anyhow!(err)))
}

fn print_missing(report: &ValidationReport) {
    let message = json!({
        "error": "missing required values",
        "missing": {
            "config": report.missing_config,
            "secrets": report.missing_secrets,
        }
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&message).unwrap_or_else(|_| message.to_string())
    );
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("values load failed ({0}): {1}")]
    ValuesLoad(PathBuf, #[source] anyhow::Error),
    #[error("body input load failed ({0}): {1}")]
    BodyInput(PathBuf, #[source] anyhow::Error),
    #[error("{0}")]
    Usage(String),
    #[error("validation failed")]
    Validation { report: ValidationReport },
    #[error("invalid settings: {0}")]
    Settings(#[source] anyhow::Error),
    #[error("{0}")]
    Decode(#[source] anyhow::Error),
    #[error("listener failure: {0}")]
    Listen(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::ValuesLoad(_, _) => 1,
            CliError::BodyInput(_, _) => 1,
            CliError::Usage(_) => 1,
            CliError::Validation { .. } => 2,
            CliError::Settings(_) => 2,
            CliError::Decode(_) => 4,
            CliError::Listen(_) => 7,
        }
    }
}
