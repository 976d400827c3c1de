use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::resolve_home_dir;

/// Plain environment variables honoured on top of the `APP__` prefix, with
/// the config key each one feeds.
const PLAIN_ENV_KEYS: &[(&str, &str)] = &[
    ("MONGO_URL", "database.url"),
    ("DB_NAME", "database.name"),
    ("PORT", "server.port"),
];

const DEFAULT_SUBDIR: &str = ".registrar";

/// Everything `registrar-server` reads at startup. `modules` holds one
/// free-form section per module, deserialized by the module itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Document store connection; absent means "no database configured".
    pub database: Option<DatabaseConfig>,
    /// Subsystem sections; `None` falls back to [`default_logging_config`].
    pub logging: Option<LoggingConfig>,
    /// `<name>.yaml` files here replace `modules.<name>`.
    #[serde(default)]
    pub modules_dir: Option<String>,
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Normalized to an absolute path on load.
    #[serde(default)]
    pub home_dir: String,
    pub host: String,
    pub port: u16,
    /// Default per-request timeout for the HTTP ingress; 0 keeps the ingress default.
    #[serde(default)]
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// MongoDB connection string, e.g. `mongodb://localhost:27017`.
    pub url: String,
    /// Database name inside the deployment.
    pub name: String,
    #[serde(default)]
    pub max_pool_size: Option<u32>,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub server_selection_timeout_ms: Option<u64>,
}

impl DatabaseConfig {
    /// Driver options derived from this section; unset knobs keep driver defaults.
    pub fn connect_opts(&self) -> modkit_db::ConnectOpts {
        let defaults = modkit_db::ConnectOpts::default();
        modkit_db::ConnectOpts {
            app_name: Some("registrar-server".to_string()),
            max_pool_size: self.max_pool_size.or(defaults.max_pool_size),
            connect_timeout: self
                .connect_timeout_ms
                .map(Duration::from_millis)
                .or(defaults.connect_timeout),
            server_selection_timeout: self
                .server_selection_timeout_ms
                .map(Duration::from_millis)
                .or(defaults.server_selection_timeout),
            ..defaults
        }
    }
}

/// Target prefix (crate name) to its outputs; `default` covers the rest.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Section {
    /// "trace" | "debug" | "info" | "warn" | "error" | "off"
    pub console_level: String,
    /// Log file, relative to `server.home_dir` unless absolute; empty disables file output.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    /// Rotated files to keep.
    #[serde(default)]
    pub max_backups: Option<usize>,
    /// Rotate once the file grows past this many MB.
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            timeout_sec: 0,
        }
    }
}

/// Console at info, `logs/registrar.log` at debug.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/registrar.log".to_string(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: None,
            logging: Some(default_logging_config()),
            modules_dir: None,
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file (if given) → `APP__*` env → plain env
    /// (`MONGO_URL`, `DB_NAME`, `PORT`).
    ///
    /// Normalizes `server.home_dir` into an absolute path and creates the directory.
    pub fn load_layered<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let mut figment = Figment::new().merge(Serialized::defaults(base));
        if let Some(path) = config_path.as_ref() {
            let path: &Path = path.as_ref();
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        let figment = figment
            // APP__SERVER__PORT=8080 maps to server.port
            .merge(Env::prefixed("APP__").split("__"))
            .merge(
                Env::raw()
                    .only(&PLAIN_ENV_KEYS.iter().map(|(k, _)| *k).collect::<Vec<_>>())
                    .map(|key| {
                        PLAIN_ENV_KEYS
                            .iter()
                            .find(|(env, _)| key == *env)
                            .map(|(_, cfg)| (*cfg).into())
                            .unwrap_or_else(|| key.into())
                    }),
            );

        let mut config: AppConfig = figment
            .extract()
            .context("invalid configuration")?;

        normalize_home_dir_inplace(&mut config.server)
            .context("resolving server.home_dir")?;

        if let Some(dir) = config.modules_dir.clone() {
            merge_module_files(&mut config.modules, dir)?;
        }

        Ok(config)
    }

    /// Defaults only, with `home_dir` normalized; no file or environment.
    pub fn load_defaults() -> Result<Self> {
        let mut c = Self::default();
        normalize_home_dir_inplace(&mut c.server)
            .context("resolving default server.home_dir")?;
        Ok(c)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("rendering config as YAML")
    }

    /// `--port` replaces `server.port`; each `-v` raises the default console level.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }

    /// `host:port` the HTTP server should listen on by default.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Flags from the command line that feed configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
    pub mock: bool,
}

/// Read-only access to per-module configuration sections.
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// [`ConfigProvider`] backed by a loaded [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AppConfigProvider(AppConfig);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(config)
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.0
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.modules.get(module_name)
    }
}

fn normalize_home_dir_inplace(server: &mut ServerConfig) -> Result<()> {
    let configured = Some(server.home_dir.clone()).filter(|s| !s.trim().is_empty());
    let resolved: PathBuf = resolve_home_dir(configured, DEFAULT_SUBDIR, true)
        .with_context(|| format!("home directory {:?} is unusable", server.home_dir))?;
    server.home_dir = resolved.display().to_string();
    Ok(())
}

/// Merge `<modules_dir>/<module>.yaml` files into the module bag; files win
/// over inline sections.
fn merge_module_files(
    bag: &mut HashMap<String, serde_json::Value>,
    dir: impl AsRef<Path>,
) -> Result<()> {
    use std::fs;
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext != "yml" && ext != "yaml" {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading module config {}", path.display()))?;
        let val: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?;
        bag.insert(name.to_string(), serde_json::to_value(val)?);
    }
    Ok(())
}
