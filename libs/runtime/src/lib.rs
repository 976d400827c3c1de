//! Process-level plumbing for the server binary: layered configuration,
//! logging setup and home directory resolution.

pub mod config;
pub mod logging;
pub mod paths;

pub use config::{
    default_logging_config, AppConfig, AppConfigProvider, CliArgs, ConfigProvider,
    DatabaseConfig, LoggingConfig, Section, ServerConfig,
};
