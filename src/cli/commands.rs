//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::geonames::config::probe_writable;
use crate::geonames::{GeoNamesConfig, SqliteStoreFactory};
use crate::http_server::{ConnectionManager, HttpServer, InitMode};
use crate::observability::{init_logging, Verbosity};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Command-line values that override the configuration file
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_dir: Option<PathBuf>,
    pub lazy: bool,
}

impl Overrides {
    /// Apply to a loaded configuration and re-validate
    pub fn apply(self, mut config: ServiceConfig) -> CliResult<ServiceConfig> {
        if let Some(host) = self.host {
            config.http.host = host;
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(base_dir) = self.base_dir {
            config.data.base_dir = base_dir;
        }
        if self.lazy {
            config.init_mode = InitMode::Lazy;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Main CLI entry point
///
/// Parses arguments, installs logging and dispatches the command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(Verbosity::from_flags(cli.verbose, cli.quiet));
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            host,
            port,
            base_dir,
            lazy,
        } => {
            let loaded = ServiceConfig::load_or_default(config.as_deref())?;
            let overrides = Overrides {
                host,
                port,
                base_dir,
                lazy,
            };
            serve(overrides.apply(loaded)?)
        }
        Command::Init { config, base_dir } => {
            let loaded = ServiceConfig::load_or_default(config.as_deref())?;
            let overrides = Overrides {
                base_dir,
                ..Default::default()
            };
            init(&overrides.apply(loaded)?)?;
            Ok(())
        }
    }
}

/// Create the data directory and verify it accepts writes
pub fn init(config: &ServiceConfig) -> CliResult<GeoNamesConfig> {
    let paths = config.data.resolve()?;

    probe_writable(&paths.save_dir).map_err(|e| {
        CliError::not_writable(format!(
            "Data directory {} is not writable: {}",
            paths.save_dir.display(),
            e
        ))
    })?;

    write_response(json!({
        "initialized": true,
        "data_dir": paths.save_dir.display().to_string(),
        "database_file": paths.database_filepath.display().to_string(),
    }))?;

    Ok(paths)
}

/// Run the HTTP server until Ctrl-C
pub fn serve(config: ServiceConfig) -> CliResult<()> {
    let paths = config.data.resolve()?;
    let writable = paths.is_writable();

    info!(base_dir = %config.data.base_dir.display(), "base directory");
    info!(data_dir = %paths.save_dir.display(), exists = paths.save_dir.is_dir(), writable, "data directory");
    if !writable {
        warn!("data directory is not writable");
    }

    let manager = Arc::new(ConnectionManager::new(
        paths,
        Arc::new(SqliteStoreFactory::new()),
    ));
    let server = HttpServer::new(config.http, config.init_mode, manager);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::serve_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(server.start())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_replace_config_values() {
        let overrides = Overrides {
            host: Some("127.0.0.1".to_string()),
            port: Some(8081),
            base_dir: Some(PathBuf::from("/srv")),
            lazy: true,
        };

        let config = overrides.apply(ServiceConfig::default()).unwrap();
        assert_eq!(config.http.socket_addr(), "127.0.0.1:8081");
        assert_eq!(config.data.base_dir, PathBuf::from("/srv"));
        assert_eq!(config.init_mode, InitMode::Lazy);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let config = Overrides::default().apply(ServiceConfig::default()).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_override_rejects_zero_port() {
        let overrides = Overrides {
            port: Some(0),
            ..Default::default()
        };
        assert!(overrides.apply(ServiceConfig::default()).is_err());
    }

    #[test]
    fn test_init_creates_data_dir() {
        let base = TempDir::new().unwrap();
        let mut config = ServiceConfig::default();
        config.data.base_dir = base.path().to_path_buf();

        let paths = init(&config).unwrap();
        assert!(paths.save_dir.is_dir());
        assert!(paths.save_dir.starts_with(base.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_init_command_dispatches() {
        let base = TempDir::new().unwrap();

        run_command(Command::Init {
            config: None,
            base_dir: Some(base.path().to_path_buf()),
        })
        .unwrap();

        assert!(base.path().join("geonames_data").is_dir());
    }
}
