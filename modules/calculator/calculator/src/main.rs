use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use calculator::config::{AppConfig, CliOverrides};
use calculator::{Service, logging, server};
use calculator_sdk::{CalculatorGrpcClient, ServingStatus};

/// Calculator - remote arithmetic and scientific evaluation over gRPC
#[derive(Parser)]
#[command(name = "calculator")]
#[command(about = "Calculator - remote arithmetic and scientific evaluation over gRPC")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the server listener and the client (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host used by client commands (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gRPC server
    Serve,
    /// Evaluate one expression on a running server
    Calc {
        #[arg(allow_negative_numbers = true)]
        operand1: f64,
        operator: String,
        /// Ignored by unary operators; defaults to 0
        #[arg(allow_negative_numbers = true)]
        operand2: Option<f64>,
    },
    /// Query the server's health endpoint
    Health,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (CALCULATOR__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        port: cli.port,
        host: cli.host.clone(),
    });
    config.validate()?;

    logging::init(&config.logging, cli.verbose);

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Calc {
            operand1,
            operator,
            operand2,
        } => calc(&config, operand1, &operator, operand2).await,
        Commands::Health => health(&config).await,
        Commands::Check => check_config(&config),
    }
}

async fn run_server(config: AppConfig) -> Result<ExitCode> {
    tracing::info!(
        listen_addr = %config.server.listen_addr,
        max_safe_value = config.validation.max_safe_value,
        max_exponent = config.validation.max_exponent,
        "calculator server starting"
    );
    let service = Arc::new(Service::new(config.validation));
    server::run(&config.server, service).await?;
    Ok(ExitCode::SUCCESS)
}

async fn calc(
    config: &AppConfig,
    operand1: f64,
    operator: &str,
    operand2: Option<f64>,
) -> Result<ExitCode> {
    let client = Arc::new(CalculatorGrpcClient::new(&config.client, config.validation)?);
    let outcome = client
        .submit(operand1, operand2.unwrap_or(0.0), operator)
        .await?;
    client.shutdown();

    if outcome.success {
        println!("{}", outcome.result);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{outcome}");
        Ok(ExitCode::FAILURE)
    }
}

async fn health(config: &AppConfig) -> Result<ExitCode> {
    let client = CalculatorGrpcClient::new(&config.client, config.validation)?;
    match client.health().await {
        Ok((status, message)) => {
            println!("{}: {message}", status.as_str_name());
            Ok(if status == ServingStatus::Serving {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            eprintln!("health check failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check_config(config: &AppConfig) -> Result<ExitCode> {
    tracing::info!("Checking configuration...");
    // load_or_default and validate already passed at this point
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(ExitCode::SUCCESS)
}
