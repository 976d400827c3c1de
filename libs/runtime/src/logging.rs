//! Global `tracing` subscriber built from the `logging` config section.
//!
//! Every section name is a target prefix (a crate such as `registrar` or
//! `modkit_db`) and `default` catches whatever no other section owns. A
//! record belongs to the section with the longest matching prefix, so it is
//! written at most once per output. Each section gets a plain-text console
//! layer and, when `file` is set, a JSON-lines file rotated by size.

use crate::config::{LoggingConfig, Section};
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use std::{
    io::{IsTerminal, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{Level, Metadata};
use tracing_subscriber::{
    filter::FilterFn, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// `None` switches the output off. Unrecognized names mean INFO.
fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => None,
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => Some(Level::INFO),
    }
}

/// `target` is `prefix` itself or a module path below it.
fn has_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Section that owns `target`: the longest matching name, else `default`.
fn owner<'a>(target: &str, names: &'a [String]) -> &'a str {
    names
        .iter()
        .filter(|n| n.as_str() != DEFAULT_SECTION && has_prefix(target, n))
        .max_by_key(|n| n.len())
        .map_or(DEFAULT_SECTION, String::as_str)
}

/// Passes records owned by `section` at `level` or more severe.
fn section_filter(
    section: String,
    names: Arc<[String]>,
    level: Level,
) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
    FilterFn::new(move |meta: &Metadata<'_>| {
        *meta.level() <= level && owner(meta.target(), &names) == section
    })
}

/// A rotating log file shared by every writer handed out for it.
#[derive(Clone)]
struct SharedFile(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

/// Relative paths live under `base_dir` (the server home directory).
fn log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_rotating(path: &Path, section: &Section) -> std::io::Result<SharedFile> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let max_mb = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB);
    let max_bytes = usize::try_from(max_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX);
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    let file = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(backups)),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(SharedFile(Arc::new(Mutex::new(file))))
}

/// Console and file layers for one section.
fn section_layers(
    name: &str,
    section: &Section,
    names: &Arc<[String]>,
    base_dir: &Path,
    ansi: bool,
) -> Vec<BoxedLayer> {
    let mut layers = Vec::new();

    if let Some(level) = parse_level(&section.console_level) {
        layers.push(
            fmt::layer()
                .with_ansi(ansi)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_filter(section_filter(name.to_string(), names.clone(), level))
                .boxed(),
        );
    }

    if section.file.trim().is_empty() {
        return layers;
    }
    let Some(level) = parse_level(&section.file_level) else {
        return layers;
    };
    let path = log_path(&section.file, base_dir);
    match open_rotating(&path, section) {
        Ok(file) => layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(move || file.clone())
                .with_filter(section_filter(name.to_string(), names.clone(), level))
                .boxed(),
        ),
        // No subscriber yet, stderr is the only place to say so
        Err(e) => eprintln!("log file for '{name}' unavailable at {}: {e}", path.display()),
    }
    layers
}

/// Install the global subscriber. A second call is ignored.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // mongodb and friends log through `log`
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let mut sections: Vec<(&String, &Section)> = cfg.iter().collect();
    sections.sort_by_key(|(name, _)| name.as_str());
    let names: Arc<[String]> = sections.iter().map(|(n, _)| (*n).clone()).collect();
    let ansi = std::io::stdout().is_terminal();

    let layers: Vec<BoxedLayer> = sections
        .iter()
        .flat_map(|(name, section)| section_layers(name, section, &names, base_dir, ansi))
        .collect();

    let _ = Registry::default().with(layers).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_logging_config;
    use tempfile::tempdir;

    fn section(file: &str) -> Section {
        Section {
            console_level: "info".into(),
            file: file.into(),
            file_level: "debug".into(),
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level(" warning "), Some(Level::WARN));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level("none"), None);
        assert_eq!(parse_level("loud"), Some(Level::INFO));
        assert_eq!(parse_level(""), Some(Level::INFO));
    }

    #[test]
    fn prefixes_match_whole_path_segments() {
        assert!(has_prefix("registrar", "registrar"));
        assert!(has_prefix("registrar::domain::service", "registrar"));
        assert!(!has_prefix("registrar_server", "registrar"));
        assert!(!has_prefix("modkit_db", "modkit"));
    }

    #[test]
    fn longest_section_owns_the_target() {
        let n = names(&["default", "modkit", "modkit::runtime", "registrar"]);
        assert_eq!(owner("modkit::runtime::runner", &n), "modkit::runtime");
        assert_eq!(owner("modkit::registry", &n), "modkit");
        assert_eq!(owner("registrar::api::rest", &n), "registrar");
        assert_eq!(owner("mongodb::connection", &n), "default");
        assert_eq!(owner("modkit_db", &n), "default");
    }

    #[test]
    fn relative_log_paths_resolve_under_base_dir() {
        let tmp = tempdir().unwrap();
        assert_eq!(log_path("logs/a.log", tmp.path()), tmp.path().join("logs/a.log"));

        let absolute = tmp.path().join("abs.log");
        assert_eq!(log_path(absolute.to_str().unwrap(), Path::new("/elsewhere")), absolute);
    }

    #[test]
    fn rotating_file_creates_parent_dirs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested/dir/app.log");

        let mut file = open_rotating(&path, &section("unused")).unwrap();
        file.write_all(b"{\"msg\":\"hello\"}\n").unwrap();
        file.flush().unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("hello"));
    }

    #[test]
    fn layers_follow_section_settings() {
        let tmp = tempdir().unwrap();
        let n: Arc<[String]> = names(&["default", "registrar"]).into();

        assert_eq!(section_layers("registrar", &section(""), &n, tmp.path(), false).len(), 1);
        assert_eq!(
            section_layers("registrar", &section("logs/r.log"), &n, tmp.path(), false).len(),
            2
        );

        let silent = Section {
            console_level: "off".into(),
            file_level: "off".into(),
            ..section("logs/r.log")
        };
        assert!(section_layers("registrar", &silent, &n, tmp.path(), false).is_empty());
    }

    #[test]
    fn init_twice_does_not_panic() {
        let tmp = tempdir().unwrap();
        let cfg = default_logging_config();
        init_logging_from_config(&cfg, tmp.path());
        init_logging_from_config(&cfg, tmp.path());
        tracing::info!("logging initialized in test");
    }
}
