/*!
 * Seedkeeper CLI
 */

use clap::{Parser, Subcommand, ValueEnum};
use seedkeeper::{
    config::{AppConfig, LogLevel},
    error::{Result, EXIT_SUCCESS},
    logging,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seedkeeper")]
#[command(version, about = "Multi-user seedbox control plane", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and WebSocket telemetry server
    Serve {
        /// TOML configuration file
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config and PORT)
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Log level
        #[arg(long = "log-level", value_enum)]
        log_level: Option<LogLevelArg>,

        /// Write JSON logs to this file instead of stdout
        #[arg(long = "log-file", value_name = "FILE")]
        log_file: Option<PathBuf>,

        /// Verbose logging (debug level)
        #[arg(short = 'v', long)]
        verbose: bool,
    },

    /// Load and validate a configuration file, then print the effective settings
    CheckConfig {
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            log_level,
            log_file,
            verbose,
        } => {
            let mut config = AppConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(level) = log_level {
                config.logging.log_level = level.into();
            }
            if log_file.is_some() {
                config.logging.log_file = log_file;
            }
            config.logging.verbose |= verbose;
            config.validate()?;

            logging::init_logging(&config)?;
            tracing::info!(
                host = %config.server.host,
                port = config.server.port,
                monthly_cap_bytes = config.telemetry.monthly_cap_bytes,
                "Configuration loaded"
            );
            seedkeeper::serve(config)
        }
        Commands::CheckConfig { config } => {
            let config = AppConfig::load(config.as_deref())?;
            config.validate()?;

            // Secrets are not echoed back
            let mut shown = config.clone();
            shown.auth.jwt_secret = "<redacted>".to_string();
            shown.auth.admin_password = "<redacted>".to_string();
            let rendered = toml::to_string_pretty(&shown)
                .map_err(|e| seedkeeper::SeedkeeperError::Config(e.to_string()))?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
