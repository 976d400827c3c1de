use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use modkit::{run, DbOptions, Registrator, RunOptions, ShutdownOptions};
use modkit_db::{redact_credentials_in_dsn, DbHandle};
use runtime::{AppConfig, AppConfigProvider, CliArgs, ConfigProvider};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Exposes the `modules` bag of the loaded config to modkit.
struct ModkitConfigAdapter(Arc<AppConfigProvider>);

impl modkit::ConfigProvider for ModkitConfigAdapter {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.0.get_module_config(module_name)
    }
}

/// Modules composed into the server, in registration order.
fn modules() -> Vec<Registrator> {
    vec![
        Registrator(api_ingress::register),
        Registrator(registrar::register),
    ]
}

#[derive(Parser)]
#[command(name = "registrar-server")]
#[command(about = "Course, student and registration admin server")]
#[command(version)]
struct Cli {
    /// YAML config file (defaults and environment apply without one)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding config and PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Raise console logging: -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Keep data in memory instead of MongoDB
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the API and client (default)
    Run,
    /// Validate configuration without connecting
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    let mut config = AppConfig::load_layered(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);
    apply_ingress_defaults(&mut config, args.port.is_some())?;

    let logging_config = config
        .logging
        .clone()
        .unwrap_or_else(runtime::default_logging_config);
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), home = %config.server.home_dir, "registrar-server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config, args).await,
        Commands::Check => check_config(&config, &args),
    }
}

/// Fill `modules.api_ingress` from the `server` section where the module
/// section leaves a key unset. An explicit `--port` always wins.
fn apply_ingress_defaults(config: &mut AppConfig, force_bind: bool) -> Result<()> {
    let bind_addr = config.bind_addr();
    let timeout = config.server.timeout_sec;

    let section = config
        .modules
        .entry(api_ingress::MODULE_NAME.to_string())
        .or_insert_with(|| json!({}));
    let Some(obj) = section.as_object_mut() else {
        bail!("modules.{} must be a mapping", api_ingress::MODULE_NAME);
    };

    if force_bind || !obj.contains_key("bind_addr") {
        obj.insert("bind_addr".into(), Value::String(bind_addr));
    }
    if timeout > 0 && !obj.contains_key("request_timeout_secs") {
        obj.insert("request_timeout_secs".into(), json!(timeout));
    }
    Ok(())
}

async fn run_server(config: AppConfig, args: CliArgs) -> Result<()> {
    let modules_cfg = Arc::new(ModkitConfigAdapter(Arc::new(AppConfigProvider::new(
        config.clone(),
    ))));

    let db = if args.mock {
        tracing::warn!("--mock given, data is kept in memory");
        DbOptions::None
    } else {
        let Some(db_config) = config.database.clone() else {
            bail!("No database configured: set MONGO_URL and DB_NAME or pass --mock");
        };
        let handle = DbHandle::connect(&db_config.url, &db_config.name, db_config.connect_opts())
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to {}",
                    redact_credentials_in_dsn(Some(&db_config.url))
                )
            })?;
        DbOptions::Handle(Arc::new(handle))
    };

    run(RunOptions {
        modules_cfg,
        db,
        shutdown: ShutdownOptions::Signals,
        modules: modules(),
    })
    .await
}

/// Validates what can be validated without a network round-trip.
fn check_config(config: &AppConfig, args: &CliArgs) -> Result<()> {
    match &config.database {
        Some(db) => {
            DbHandle::detect(&db.url)?;
            if db.name.trim().is_empty() {
                bail!("database.name must not be empty");
            }
        }
        None if args.mock => {}
        None => bail!("No database configured: set MONGO_URL and DB_NAME or pass --mock"),
    }

    let bind = config
        .modules
        .get(api_ingress::MODULE_NAME)
        .and_then(|m| m.get("bind_addr"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    bind.parse::<SocketAddr>()
        .with_context(|| format!("Invalid bind address '{bind}'"))?;

    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}
