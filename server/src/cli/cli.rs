// server/src/cli/cli.rs
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, info};

use crate::api;
use crate::cli::signals::handle_signals;
use lib::config::{
    load_clinic_config, redacted, render_clinic_config, report_config_source, validate_config, ClinicConfig,
    ConfigSource, StorageEngineType,
};
use lib::database::ClinicDatabase;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Clinic visit service", long_about = None)]
#[clap(propagate_version = true)]
pub struct CliArgs {
    /// Path to the YAML config file (defaults to ./clinic.yaml)
    #[clap(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Port for the HTTP API
    #[clap(long, short = 'p')]
    pub port: Option<u16>,
    /// in-memory, json-file, sled or postgres
    #[clap(long, value_name = "ENGINE")]
    pub storage_engine: Option<StorageEngineType>,
    /// Directory for the json-file and sled engines
    #[clap(long, value_name = "DIR")]
    pub data_directory: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::Subcommand)]
pub enum Commands {
    /// Run the HTTP API until SIGINT or SIGTERM
    Serve,
    /// Print the effective config with secrets redacted
    ShowConfig,
}

/// File, then environment, then command line.
pub fn load_effective_config(args: &CliArgs) -> Result<(ClinicConfig, ConfigSource)> {
    let (mut config, source) = load_clinic_config(args.config.as_deref())?;
    apply_cli_overrides(&mut config, args);
    validate_config(&config).map_err(|e| anyhow!(e.to_string()))?;
    Ok((config, source))
}

pub fn apply_cli_overrides(config: &mut ClinicConfig, args: &CliArgs) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(engine) = args.storage_engine {
        config.storage.engine = engine;
    }
    if let Some(dir) = &args.data_directory {
        config.storage.data_directory = dir.clone();
    }
}

/// `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if let Err(e) = env_logger::Builder::from_env(env).format_timestamp_millis().try_init() {
        eprintln!("Logger already initialized: {}", e);
    }
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    let (config, source) = load_effective_config(&args)?;
    // The level comes from the config, so the source is reported once logging is up.
    init_logging(&config.log_level);
    report_config_source(&source);
    debug!("Parsed CLI arguments: {:?}", args);
    run_command(args.command.unwrap_or(Commands::Serve), config).await
}

pub async fn run_command(command: Commands, config: ClinicConfig) -> Result<()> {
    match command {
        Commands::Serve => serve(config).await,
        Commands::ShowConfig => {
            println!("{}", render_clinic_config(&redacted(&config))?);
            Ok(())
        }
    }
}

async fn serve(config: ClinicConfig) -> Result<()> {
    let addr = config.server.socket_addr().map_err(|e| anyhow!(e.to_string()))?;
    let db = ClinicDatabase::new(&config)
        .await
        .with_context(|| format!("Failed to open {} storage", config.storage.engine))?;

    let (bound, server) = warp::serve(api::routes(db.clone()))
        .try_bind_with_graceful_shutdown(addr, handle_signals())
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Clinic server listening on http://{} ({} storage)", bound, db.storage_type());

    server.await;
    info!("HTTP server stopped");
    db.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_serve() {
        let args = CliArgs::try_parse_from(["clinic-server"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn should_parse_overrides_and_subcommand() {
        let args = CliArgs::try_parse_from([
            "clinic-server",
            "--port",
            "4000",
            "--storage-engine",
            "sled",
            "--data-directory",
            "/tmp/clinic",
            "show-config",
        ])
        .unwrap();
        assert_eq!(args.command, Some(Commands::ShowConfig));

        let mut config = ClinicConfig::default();
        apply_cli_overrides(&mut config, &args);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.engine, StorageEngineType::Sled);
        assert_eq!(config.storage.data_directory, PathBuf::from("/tmp/clinic"));
    }

    #[test]
    fn should_load_config_file_before_logging() {
        let dir = std::env::temp_dir().join(format!("clinic-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clinic.yaml");
        std::fs::write(&path, "clinic:\n  log_level: debug\n  storage:\n    engine: sled\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let args =
            CliArgs::try_parse_from(["clinic-server", "--config", path_arg.as_str(), "--storage-engine", "in-memory"])
                .unwrap();
        let (config, source) = load_effective_config(&args).unwrap();
        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn should_reject_unknown_engine() {
        assert!(CliArgs::try_parse_from(["clinic-server", "--storage-engine", "cassandra"]).is_err());
    }
}
