//! Home directory resolution.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Resolve the application home directory to an absolute path.
///
/// - `None` (or blank) ⇒ `<platform home>/<default_subdir>`
/// - a leading `~` expands to the platform home
/// - relative paths are resolved against the current directory
///
/// When `create` is set, the directory is created if missing.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let configured = configured.filter(|s| !s.trim().is_empty());

    let path = match configured.as_deref() {
        None => platform_home()?.join(default_subdir),
        Some("~") => platform_home()?,
        Some(s) if s.starts_with("~/") || s.starts_with("~\\") => platform_home()?.join(&s[2..]),
        Some(s) if s.starts_with('~') => bail!("unsupported home_dir form '{s}' (only '~/' is expanded)"),
        Some(s) => absolutize(Path::new(s))?,
    };

    if create {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create home_dir {}", path.display()))?;
    }
    Ok(path)
}

fn platform_home() -> Result<PathBuf> {
    dirs::home_dir().context("cannot determine the user's home directory")
}

fn absolutize(p: &Path) -> Result<PathBuf> {
    if p.is_absolute() {
        Ok(p.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absolute_path_is_kept_and_created() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("nested/home");
        let out = resolve_home_dir(Some(target.to_string_lossy().into_owned()), ".x", true).unwrap();
        assert_eq!(out, target);
        assert!(target.is_dir());
    }

    #[test]
    fn tilde_expands_to_platform_home() {
        let out = resolve_home_dir(Some("~/.registrar_test_home".into()), ".x", false).unwrap();
        assert!(out.is_absolute());
        assert!(out.ends_with(".registrar_test_home"));
        assert!(!out.to_string_lossy().contains('~'));
    }

    #[test]
    fn blank_uses_default_subdir() {
        let out = resolve_home_dir(Some("   ".into()), ".registrar_default", false).unwrap();
        assert!(out.ends_with(".registrar_default"));
    }

    #[test]
    fn other_user_tilde_is_rejected() {
        assert!(resolve_home_dir(Some("~bob/x".into()), ".x", false).is_err());
    }
}
