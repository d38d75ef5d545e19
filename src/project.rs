//! Project classpaths built on top of the shared boot classpath.

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::entry::{ClassPathEntry, Entry, EntryCache, Immutable};
use crate::source::{ClassListSource, JImageSource};

/// Splits a classpath on the platform separator, dropping empty tokens.
pub fn tokenize_classpath(classpath: &str) -> Vec<PathBuf> {
    std::env::split_paths(classpath)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// Where the platform classes live.
#[derive(Debug, Clone, Default)]
pub struct BootSettings {
    pub java_home: Option<PathBuf>,
    pub boot_class_path: Option<String>,
    pub ext_dirs: Vec<PathBuf>,
}

/// The immutable entries every project starts with.
#[derive(Debug, Clone, Default)]
pub struct BootClassPath {
    entries: Vec<Arc<dyn Entry>>,
    shared: Vec<Arc<ClassPathEntry>>,
}

impl BootClassPath {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Boot classpath archives, each file of every extension directory, then
    /// the JDK class list and module image listings.
    pub fn load(settings: &BootSettings, cache: &EntryCache) -> Self {
        let mut boot = Self::empty();

        if let Some(boot_class_path) = settings.boot_class_path.as_deref() {
            for path in tokenize_classpath(boot_class_path) {
                boot.add_path(&path, cache);
            }
        }

        for dir in settings.ext_dirs.iter() {
            let Ok(read_dir) = std::fs::read_dir(dir) else {
                debug!(dir = %dir.display(), "skipping unreadable extension directory");
                continue;
            };
            let mut files: Vec<PathBuf> = read_dir.flatten().map(|e| e.path()).collect();
            files.sort();
            for file in files {
                boot.add_path(&file, cache);
            }
        }

        if let Some(java_home) = settings.java_home.as_deref() {
            let listings = cache.listings().cloned();
            boot.push(ClassPathEntry::new(
                Box::new(ClassListSource::for_java_home(java_home)),
                listings.clone(),
            ));
            boot.push(ClassPathEntry::new(
                Box::new(JImageSource::new(java_home)),
                listings,
            ));
        }

        info!(entries = boot.entries.len(), "boot classpath ready");
        boot
    }

    fn add_path(&mut self, path: &Path, cache: &EntryCache) {
        if let Some(entry) = cache.instance_for(path) {
            self.shared.push(Arc::clone(&entry));
            self.entries.push(Arc::new(Immutable::new(entry)));
        }
    }

    fn push(&mut self, entry: ClassPathEntry) {
        self.entries.push(Arc::new(Immutable::new(Arc::new(entry))));
    }

    pub fn entries(&self) -> &[Arc<dyn Entry>] {
        &self.entries
    }

    /// Whether a shared entry is also on the boot classpath.
    pub fn contains(&self, entry: &Arc<ClassPathEntry>) -> bool {
        self.shared.iter().any(|e| Arc::ptr_eq(e, entry))
    }
}

/// The classes visible to one project: the boot classpath followed by the
/// project's own classpath entries.
#[derive(Debug)]
pub struct ProjectClasses {
    classpath: String,
    entries: Vec<Arc<dyn Entry>>,
    boot: BootClassPath,
    cache: Arc<EntryCache>,
}

impl ProjectClasses {
    pub fn new(classpath: &str, boot: &BootClassPath, cache: Arc<EntryCache>) -> Self {
        let mut entries = boot.entries().to_vec();
        for path in tokenize_classpath(classpath) {
            match cache.instance_for(&path) {
                Some(entry) if boot.contains(&entry) => entries.push(Arc::new(Immutable::new(entry))),
                Some(entry) => entries.push(entry),
                None => debug!(path = %path.display(), "ignoring classpath entry"),
            }
        }

        Self {
            classpath: classpath.to_string(),
            entries,
            boot: boot.clone(),
            cache,
        }
    }

    pub fn classpath(&self) -> &str {
        &self.classpath
    }

    pub fn entries(&self) -> &[Arc<dyn Entry>] {
        &self.entries
    }

    /// Fully-qualified names matching `unqualified` in classpath order,
    /// first occurrence wins.
    pub fn class_names(&self, unqualified: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in self.entries.iter() {
            for name in entry.class_names(unqualified) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Reloads the entry for a single path. Returns whether an entry was
    /// found for it; boot entries are found but left untouched.
    pub fn reload_entry(&self, path: &Path) -> bool {
        let Some(entry) = self.cache.instance_for(path) else {
            return false;
        };
        if self.boot.contains(&entry) {
            debug!(path = %path.display(), "not reloading boot classpath entry");
        } else {
            entry.reload();
        }
        true
    }

    pub fn reload_all(&self) {
        for entry in self.entries.iter() {
            entry.reload();
        }
    }

    /// Loads every entry up front, in parallel.
    pub fn preload(&self) -> usize {
        self.entries.par_iter().map(|e| e.class_count()).sum()
    }
}

/// Projects keyed by classpath, with the one the editor selected last.
#[derive(Debug)]
pub struct Workspace {
    boot: BootClassPath,
    cache: Arc<EntryCache>,
    projects: HashMap<String, Arc<ProjectClasses>>,
    current: Arc<ProjectClasses>,
}

impl Workspace {
    pub fn new(boot: BootClassPath, cache: Arc<EntryCache>) -> Self {
        let current = Arc::new(ProjectClasses::new("", &boot, Arc::clone(&cache)));
        Self {
            boot,
            cache,
            projects: HashMap::new(),
            current,
        }
    }

    /// Makes the project for `classpath` current, creating it if needed.
    pub fn set_project(&mut self, classpath: &str) -> Arc<ProjectClasses> {
        let project = match self.projects.get(classpath) {
            Some(project) => Arc::clone(project),
            None => {
                let project = Arc::new(ProjectClasses::new(
                    classpath,
                    &self.boot,
                    Arc::clone(&self.cache),
                ));
                self.projects.insert(classpath.to_string(), Arc::clone(&project));
                project
            }
        };
        self.current = Arc::clone(&project);
        project
    }

    pub fn current(&self) -> &Arc<ProjectClasses> {
        &self.current
    }

    pub fn qualified_names(&self, unqualified: &str) -> Vec<String> {
        self.current.class_names(unqualified)
    }

    /// Reloads one entry of the current project, or all of them.
    pub fn reload(&self, entry: Option<&Path>) -> bool {
        match entry {
            Some(path) => self.current.reload_entry(path),
            None => {
                self.current.reload_all();
                true
            }
        }
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}
