//! Class listing of the JDK 9+ module image through the `jimage` tool.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::scan::binary_name_to_class_name;

/// Only the public platform packages are worth offering for completion.
const KEEP_CLASS_PREFIXES: [&str; 3] = ["java/", "javax/", "org/"];

#[derive(Debug, Clone)]
pub struct JImage {
    jimage_bin: PathBuf,
    modules_file: PathBuf,
}

impl JImage {
    pub fn new(java_home: &Path) -> Self {
        Self {
            jimage_bin: java_home.join("bin").join(jimage_exe_name()),
            modules_file: java_home.join("lib").join("modules"),
        }
    }

    pub fn modules_file(&self) -> &Path {
        &self.modules_file
    }

    pub fn is_available(&self) -> bool {
        is_executable(&self.jimage_bin) && std::fs::File::open(&self.modules_file).is_ok()
    }

    pub fn list_classes(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.jimage_bin)
            .arg("list")
            .arg(&self.modules_file)
            .output()
            .with_context(|| format!("Failed to execute {}", self.jimage_bin.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("jimage list failed: {}", stderr.trim());
        }

        Ok(parse_jimage_listing(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extracts class names from `jimage list` output. Module headers and
/// resources are skipped, as are classes outside [`KEEP_CLASS_PREFIXES`].
pub fn parse_jimage_listing(listing: &str) -> Vec<String> {
    let mut classes = Vec::new();
    for line in listing.lines() {
        let line = line.trim();
        let Some(binary) = line.strip_suffix(".class") else {
            continue;
        };
        if !KEEP_CLASS_PREFIXES.iter().any(|p| binary.starts_with(p)) {
            continue;
        }
        if let Some(class_name) = binary_name_to_class_name(binary) {
            classes.push(class_name);
        }
    }
    classes
}

fn jimage_exe_name() -> &'static str {
    if cfg!(windows) { "jimage.exe" } else { "jimage" }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_jimage_listing_filters_prefixes_and_generated_classes() {
        let listing = "\
jimage: modules
Module: java.base
    META-INF/services/java.nio.file.spi.FileSystemProvider
    java/lang/Object.class
    java/util/Map$Entry.class
    java/util/HashMap$1.class
    sun/misc/Unsafe.class
    module-info.class
Module: java.xml
    javax/xml/XMLConstants.class
    org/w3c/dom/Node.class
    com/sun/org/apache/Thing.class
";
        assert_eq!(
            parse_jimage_listing(listing),
            vec![
                "java.lang.Object",
                "java.util.Map.Entry",
                "javax.xml.XMLConstants",
                "org.w3c.dom.Node",
            ]
        );
    }

    #[test]
    fn missing_java_home_is_unavailable() {
        let jimage = JImage::new(Path::new("/nonexistent/jde-classpath/java-home"));
        assert!(!jimage.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn list_classes_runs_fake_jimage() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let home = std::env::temp_dir().join(format!(
            "jde_classpath_jimage_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(home.join("bin"))?;
        std::fs::create_dir_all(home.join("lib"))?;
        std::fs::write(home.join("lib/modules"), b"image")?;
        let bin = home.join("bin/jimage");
        std::fs::write(
            &bin,
            "#!/bin/sh\n[ \"$1\" = list ] || exit 2\necho 'Module: java.base'\necho '    java/lang/String.class'\n",
        )?;
        let mut perms = std::fs::metadata(&bin)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms)?;

        let jimage = JImage::new(&home);
        assert!(jimage.is_available());
        assert_eq!(jimage.list_classes()?, vec!["java.lang.String"]);

        let _ = std::fs::remove_dir_all(home);
        Ok(())
    }
}
