use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cache::{ListingCache, lmdb_lock_path};
use crate::cli::Cli;
use crate::project::{BootSettings, tokenize_classpath};

pub const BOOT_CLASSPATH_ENV: &str = "JDE_BOOT_CLASSPATH";
pub const EXT_DIRS_ENV: &str = "JDE_EXT_DIRS";

pub fn resolve_java_home(cli: &Cli) -> Option<PathBuf> {
    if let Some(p) = cli.java_home.clone() {
        return Some(p);
    }
    non_empty_env("JAVA_HOME").map(PathBuf::from)
}

pub fn resolve_boot_settings(cli: &Cli) -> BootSettings {
    if cli.no_boot {
        return BootSettings::default();
    }

    let boot_class_path = cli
        .boot_classpath
        .clone()
        .or_else(|| non_empty_env(BOOT_CLASSPATH_ENV));
    let ext_dirs = cli
        .ext_dirs
        .clone()
        .or_else(|| non_empty_env(EXT_DIRS_ENV))
        .map(|dirs| tokenize_classpath(&dirs))
        .unwrap_or_default();

    BootSettings {
        java_home: resolve_java_home(cli),
        boot_class_path,
        ext_dirs,
    }
}

/// The project classpath: the explicit argument, else `$CLASSPATH`.
pub fn resolve_classpath(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| non_empty_env("CLASSPATH"))
        .unwrap_or_default()
}

pub fn resolve_db_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.db.clone() {
        return Ok(p);
    }

    Ok(jde_classpath_home()?.join("listings.lmdb"))
}

/// Opens the listing cache unless disabled. A cache that cannot be opened
/// is reported and skipped.
pub fn open_listing_cache(cli: &Cli) -> Result<Option<ListingCache>> {
    if cli.no_cache {
        return Ok(None);
    }
    let db_path = resolve_db_path(cli)?;
    match ListingCache::open(db_path.clone()) {
        Ok(cache) => Ok(Some(cache)),
        Err(e) => {
            warn!(db = %db_path.display(), error = %format!("{e:#}"), "listing cache unavailable");
            Ok(None)
        }
    }
}

pub fn clear_db(db_path: &Path) -> Result<()> {
    remove_file_if_exists(db_path, "db")?;
    remove_file_if_exists(&lmdb_lock_path(db_path), "db lock")?;
    Ok(())
}

fn jde_classpath_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("jde-classpath"))
}

fn remove_file_if_exists(path: &Path, kind: &str) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {kind} file: {}", path.display()))?;
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn explicit_flags_win_and_no_boot_clears_everything() {
        let cli = Cli::parse_from([
            "jde-classpath",
            "--java-home",
            "/opt/jdk",
            "--boot-classpath",
            "/opt/rt.jar",
            "--db",
            "/tmp/listings.lmdb",
            "stats",
        ]);
        let settings = resolve_boot_settings(&cli);
        assert_eq!(settings.java_home, Some(PathBuf::from("/opt/jdk")));
        assert_eq!(settings.boot_class_path.as_deref(), Some("/opt/rt.jar"));
        assert_eq!(resolve_db_path(&cli).unwrap(), PathBuf::from("/tmp/listings.lmdb"));

        let cli = Cli::parse_from(["jde-classpath", "--no-boot", "--java-home", "/opt/jdk", "stats"]);
        let settings = resolve_boot_settings(&cli);
        assert!(settings.java_home.is_none());
        assert!(settings.boot_class_path.is_none());
        assert!(settings.ext_dirs.is_empty());
    }

    #[test]
    fn no_cache_skips_opening() -> Result<()> {
        let cli = Cli::parse_from(["jde-classpath", "--no-cache", "stats"]);
        assert!(open_listing_cache(&cli)?.is_none());
        Ok(())
    }

    #[test]
    fn explicit_classpath_is_kept_verbatim() {
        assert_eq!(resolve_classpath(Some("a.jar:b")), "a.jar:b");
    }

    #[test]
    fn clear_db_removes_db_and_lock() -> Result<()> {
        let db = std::env::temp_dir().join(format!(
            "jde_classpath_clear_{}_{}.lmdb",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        drop(ListingCache::open(db.clone())?);
        assert!(db.exists());
        clear_db(&db)?;
        assert!(!db.exists());
        assert!(!lmdb_lock_path(&db).exists());
        clear_db(&db)?;
        Ok(())
    }
}
