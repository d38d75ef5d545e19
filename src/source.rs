//! Providers of raw class name listings for classpath entries.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::catalog::catalog;
use crate::jimage::JImage;
use crate::scan::{binary_name_to_class_name, scan_directory_classes};

/// Produces the fully-qualified class names of one classpath entry.
pub trait ClassSource: Send + Sync + fmt::Debug {
    fn describe(&self) -> String;

    fn list_classes(&self) -> Result<Vec<String>>;

    /// Path whose modification time decides whether a persisted listing is
    /// still valid. `None` disables the listing cache for this source.
    fn cache_path(&self) -> Option<&Path> {
        None
    }
}

/// A directory of compiled classes. Never cached: nested class files change
/// without touching the root's modification time.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ClassSource for DirectorySource {
    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    fn list_classes(&self) -> Result<Vec<String>> {
        scan_directory_classes(&self.root)
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveSource {
    path: PathBuf,
}

impl ArchiveSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ClassSource for ArchiveSource {
    fn describe(&self) -> String {
        format!("archive:{}", self.path.display())
    }

    fn list_classes(&self) -> Result<Vec<String>> {
        catalog(&self.path)
    }

    fn cache_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// The JDK's `lib/classlist`, one slash separated class per line.
#[derive(Debug, Clone)]
pub struct ClassListSource {
    path: PathBuf,
}

impl ClassListSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_java_home(java_home: &Path) -> Self {
        Self::new(java_home.join("lib").join("classlist"))
    }
}

impl ClassSource for ClassListSource {
    fn describe(&self) -> String {
        format!("classlist:{}", self.path.display())
    }

    fn list_classes(&self) -> Result<Vec<String>> {
        if !self.path.is_file() {
            debug!(path = %self.path.display(), "no class list present");
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read class list: {}", self.path.display()))?;
        Ok(parse_class_list(&text))
    }

    fn cache_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

pub fn parse_class_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('@'))
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(binary_name_to_class_name)
        .collect()
}

#[derive(Debug, Clone)]
pub struct JImageSource {
    jimage: JImage,
}

impl JImageSource {
    pub fn new(java_home: &Path) -> Self {
        Self {
            jimage: JImage::new(java_home),
        }
    }
}

impl ClassSource for JImageSource {
    fn describe(&self) -> String {
        format!("jimage:{}", self.jimage.modules_file().display())
    }

    fn list_classes(&self) -> Result<Vec<String>> {
        if !self.jimage.is_available() {
            debug!(
                modules = %self.jimage.modules_file().display(),
                "jimage or module image not available"
            );
            return Ok(Vec::new());
        }
        self.jimage.list_classes()
    }

    /// Only a real listing is persisted, so a `jimage` that appears later
    /// is picked up even though the module image is unchanged.
    fn cache_path(&self) -> Option<&Path> {
        self.jimage
            .is_available()
            .then(|| self.jimage.modules_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_class_list_skips_comments_and_directives() {
        let text = "\
# NOTE: Do not modify this file.
java/lang/Object
java/util/HashMap$Node id: 12
java/lang/invoke/LambdaForm$1
@lambda-proxy java/lang/invoke/Foo run
@cp java/lang/Foo 1

javax/swing/JFrame
";
        assert_eq!(
            parse_class_list(text),
            vec!["java.lang.Object", "java.util.HashMap.Node", "javax.swing.JFrame"]
        );
    }

    #[test]
    fn missing_class_list_is_empty() -> Result<()> {
        let source = ClassListSource::for_java_home(Path::new("/nonexistent/jde-classpath"));
        assert!(source.list_classes()?.is_empty());
        Ok(())
    }

    #[test]
    fn describe_names_kind_and_path() {
        let source = ArchiveSource::new(PathBuf::from("/lib/a.jar"));
        assert_eq!(source.describe(), "archive:/lib/a.jar");
        assert_eq!(source.cache_path(), Some(Path::new("/lib/a.jar")));
        assert_eq!(DirectorySource::new(PathBuf::from("/c")).cache_path(), None);
    }
}
