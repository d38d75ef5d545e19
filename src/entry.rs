//! Lazily loaded classpath entries.
//!
//! A [`ClassPathEntry`] wraps a [`ClassSource`] and builds its
//! [`ClassIndex`] on the first query. Entries are shared between projects
//! through the [`EntryCache`], so an archive that appears on several
//! classpaths is listed once. Boot and extension entries are wrapped in
//! [`Immutable`], which turns `reload` into a no-op.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::cache::ListingCache;
use crate::catalog::is_archive;
use crate::scan::simple_name;
use crate::source::{ArchiveSource, ClassSource, DirectorySource};

/// Fully-qualified names grouped by unqualified name.
#[derive(Debug, Default, Clone)]
pub struct ClassIndex {
    by_simple_name: HashMap<String, Vec<String>>,
    count: usize,
}

impl ClassIndex {
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut index = Self::default();
        for name in names {
            index.add_class(name);
        }
        index
    }

    pub fn add_class(&mut self, qualified: String) {
        let simple = simple_name(&qualified).to_string();
        let names = self.by_simple_name.entry(simple).or_default();
        if !names.contains(&qualified) {
            names.push(qualified);
            self.count += 1;
        }
    }

    pub fn class_names(&self, unqualified: &str) -> &[String] {
        self.by_simple_name
            .get(unqualified)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// A provider of class names on a classpath.
pub trait Entry: Send + Sync + fmt::Debug {
    fn describe(&self) -> String;

    /// Fully-qualified names registered under `unqualified`, loading the
    /// entry first if needed.
    fn class_names(&self, unqualified: &str) -> Vec<String>;

    fn reload(&self);

    fn is_loaded(&self) -> bool;

    fn class_count(&self) -> usize;
}

pub struct ClassPathEntry {
    source: Box<dyn ClassSource>,
    cache: Option<ListingCache>,
    index: RwLock<Option<Arc<ClassIndex>>>,
}

impl fmt::Debug for ClassPathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassPathEntry")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ClassPathEntry {
    pub fn new(source: Box<dyn ClassSource>, cache: Option<ListingCache>) -> Self {
        Self {
            source,
            cache,
            index: RwLock::new(None),
        }
    }

    /// Resolves a classpath path to an entry: directories and `.jar`/`.zip`
    /// archives are supported, anything else yields `None`.
    pub fn for_path(path: &Path, cache: Option<ListingCache>) -> Option<Self> {
        if path.is_dir() {
            return Some(Self::new(
                Box::new(DirectorySource::new(path.to_path_buf())),
                cache,
            ));
        }
        if path.is_file() && is_archive(path) {
            return Some(Self::new(
                Box::new(ArchiveSource::new(path.to_path_buf())),
                cache,
            ));
        }
        debug!(path = %path.display(), "unsupported classpath entry");
        None
    }

    pub fn index(&self) -> Arc<ClassIndex> {
        if let Some(index) = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(index);
        }

        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = guard.as_ref() {
            return Arc::clone(index);
        }
        let index = Arc::new(self.load(true));
        *guard = Some(Arc::clone(&index));
        index
    }

    fn load(&self, use_cache: bool) -> ClassIndex {
        let describe = self.source.describe();
        match self.read_listing(use_cache) {
            Ok(classes) => {
                let index = ClassIndex::from_names(classes);
                debug!(entry = %describe, classes = index.len(), "loaded classpath entry");
                index
            }
            Err(e) => {
                warn!(entry = %describe, error = %format!("{e:#}"), "failed to load classpath entry");
                ClassIndex::default()
            }
        }
    }

    fn read_listing(&self, use_cache: bool) -> anyhow::Result<Vec<String>> {
        let cached = match (self.cache.as_ref(), self.source.cache_path()) {
            (Some(cache), Some(path)) => Some((cache, path)),
            _ => None,
        };

        if use_cache && let Some((cache, path)) = cached {
            match cache.get(path) {
                Ok(Some(classes)) => return Ok(classes),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read cached listing"),
            }
        }

        let classes = self.source.list_classes()?;
        if let Some((cache, path)) = cached
            && let Err(e) = cache.put(path, &classes)
        {
            warn!(path = %path.display(), error = %e, "failed to persist listing");
        }
        Ok(classes)
    }
}

impl Entry for ClassPathEntry {
    fn describe(&self) -> String {
        self.source.describe()
    }

    fn class_names(&self, unqualified: &str) -> Vec<String> {
        self.index().class_names(unqualified).to_vec()
    }

    fn reload(&self) {
        let index = Arc::new(self.load(false));
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    fn is_loaded(&self) -> bool {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn class_count(&self) -> usize {
        self.index().len()
    }
}

/// Wraps an entry whose contents never change while the process runs.
#[derive(Debug)]
pub struct Immutable<E: Entry + ?Sized> {
    inner: Arc<E>,
}

impl<E: Entry + ?Sized> Immutable<E> {
    pub fn new(inner: Arc<E>) -> Self {
        Self { inner }
    }
}

impl<E: Entry + ?Sized> Entry for Immutable<E> {
    fn describe(&self) -> String {
        format!("immutable:{}", self.inner.describe())
    }

    fn class_names(&self, unqualified: &str) -> Vec<String> {
        self.inner.class_names(unqualified)
    }

    fn reload(&self) {}

    fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    fn class_count(&self) -> usize {
        self.inner.class_count()
    }
}

/// Entries shared across projects, keyed by canonical path.
#[derive(Debug, Default)]
pub struct EntryCache {
    entries: Mutex<HashMap<PathBuf, Arc<ClassPathEntry>>>,
    listings: Option<ListingCache>,
}

impl EntryCache {
    pub fn new(listings: Option<ListingCache>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            listings,
        }
    }

    pub fn listings(&self) -> Option<&ListingCache> {
        self.listings.as_ref()
    }

    /// Returns the shared entry for `path`, creating it on first use.
    /// Missing paths and unsupported files yield `None`.
    pub fn instance_for(&self, path: &Path) -> Option<Arc<ClassPathEntry>> {
        let key = std::fs::canonicalize(path).ok()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&key) {
            return Some(Arc::clone(entry));
        }
        let entry = Arc::new(ClassPathEntry::for_path(&key, self.listings.clone())?);
        entries.insert(key, Arc::clone(&entry));
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingSource {
        loads: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ClassSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn list_classes(&self) -> anyhow::Result<Vec<String>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("broken source");
            }
            let mut classes = vec!["a.Foo".to_string(), "b.Foo".to_string()];
            if n > 0 {
                classes.push("c.Foo".to_string());
            }
            Ok(classes)
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "jde_classpath_entry_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    #[test]
    fn class_index_groups_by_simple_name_and_dedupes() {
        let index = ClassIndex::from_names(
            ["java.util.List", "java.awt.List", "java.util.List", "java.util.Map.Entry"]
                .map(String::from),
        );
        assert_eq!(index.class_names("List"), ["java.util.List", "java.awt.List"]);
        assert_eq!(index.class_names("Entry"), ["java.util.Map.Entry"]);
        assert!(index.class_names("Missing").is_empty());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn entry_loads_lazily_once_and_reload_relists() {
        let loads = Arc::new(AtomicUsize::new(0));
        let entry = ClassPathEntry::new(
            Box::new(CountingSource {
                loads: Arc::clone(&loads),
                fail: false,
            }),
            None,
        );

        assert!(!entry.is_loaded());
        assert_eq!(entry.class_names("Foo"), vec!["a.Foo", "b.Foo"]);
        assert_eq!(entry.class_names("Foo").len(), 2);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        entry.reload();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(entry.class_names("Foo"), vec!["a.Foo", "b.Foo", "c.Foo"]);
    }

    #[test]
    fn immutable_entry_ignores_reload() {
        let loads = Arc::new(AtomicUsize::new(0));
        let inner = Arc::new(ClassPathEntry::new(
            Box::new(CountingSource {
                loads: Arc::clone(&loads),
                fail: false,
            }),
            None,
        ));
        let entry = Immutable::new(inner);

        assert_eq!(entry.class_count(), 2);
        entry.reload();
        entry.reload();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(entry.class_names("Foo"), vec!["a.Foo", "b.Foo"]);
        assert_eq!(entry.describe(), "immutable:counting");
    }

    #[test]
    fn failing_source_becomes_empty_loaded_entry() {
        let entry = ClassPathEntry::new(
            Box::new(CountingSource {
                loads: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
            None,
        );
        assert!(entry.class_names("Foo").is_empty());
        assert!(entry.is_loaded());
    }

    #[test]
    fn entry_cache_shares_entries_by_canonical_path() {
        let dir = temp_dir("shared");
        std::fs::create_dir_all(dir.join("pkg")).unwrap();
        std::fs::write(dir.join("pkg/Foo.class"), b"").unwrap();
        std::fs::write(dir.join("notes.txt"), b"").unwrap();

        let cache = EntryCache::new(None);
        let a = cache.instance_for(&dir).unwrap();
        let b = cache.instance_for(&dir.join("pkg").join("..")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(a.class_names("Foo"), vec!["pkg.Foo"]);

        assert!(cache.instance_for(&dir.join("notes.txt")).is_none());
        assert!(cache.instance_for(&dir.join("missing.jar")).is_none());
        assert_eq!(cache.len(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[cfg(unix)]
    #[test]
    fn unusable_jimage_listing_is_not_persisted() -> anyhow::Result<()> {
        use crate::source::JImageSource;
        use std::os::unix::fs::PermissionsExt;

        let base = temp_dir("jimage_cache");
        let home = base.join("jdk");
        std::fs::create_dir_all(home.join("bin"))?;
        std::fs::create_dir_all(home.join("lib"))?;
        std::fs::write(home.join("lib/modules"), b"image")?;
        let bin = home.join("bin/jimage");
        std::fs::write(
            &bin,
            "#!/bin/sh\necho 'Module: java.base'\necho '    java/lang/String.class'\n",
        )?;
        let mut perms = std::fs::metadata(&bin)?.permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(&bin, perms.clone())?;

        let listings = ListingCache::open(base.join("listings.lmdb"))?;
        let before = ClassPathEntry::new(Box::new(JImageSource::new(&home)), Some(listings.clone()));
        assert!(before.class_names("String").is_empty());
        assert_eq!(listings.get(&home.join("lib/modules"))?, None);

        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms)?;
        let after = ClassPathEntry::new(Box::new(JImageSource::new(&home)), Some(listings.clone()));
        assert_eq!(after.class_names("String"), vec!["java.lang.String"]);
        assert_eq!(
            listings.get(&home.join("lib/modules"))?,
            Some(vec!["java.lang.String".to_string()])
        );

        let _ = std::fs::remove_dir_all(base);
        Ok(())
    }
}
