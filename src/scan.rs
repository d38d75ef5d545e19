use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Converts an archive or directory member such as `a/b/Outer$Inner.class`
/// into a dotted class name (`a.b.Outer.Inner`).
///
/// Returns `None` for non-class files, anonymous/local classes and the
/// `module-info`/`package-info` pseudo classes.
pub fn class_file_to_name(member: &str) -> Option<String> {
    let stem = member.strip_suffix(".class")?;
    let stem = stem.trim_start_matches(['/', '\\']);
    binary_name_to_class_name(&stem.replace('\\', "/"))
}

/// Same as [`class_file_to_name`] for names without the `.class` suffix,
/// slash or dot separated (`java/util/Map$Entry`).
pub fn binary_name_to_class_name(binary: &str) -> Option<String> {
    let binary = binary.trim();
    if binary.is_empty() {
        return None;
    }
    let last = binary.rsplit(['/', '.']).next().unwrap_or(binary);
    if last == "module-info" || last == "package-info" {
        return None;
    }
    if is_anonymous_class(binary) {
        return None;
    }
    Some(binary.replace(['/', '$'], "."))
}

/// `Foo$1` and `Foo$1Local` are compiler generated and never offered.
pub fn is_anonymous_class(binary: &str) -> bool {
    binary
        .split('$')
        .skip(1)
        .any(|part| part.chars().next().is_none_or(|c| c.is_ascii_digit()))
}

pub fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

pub fn scan_class_files(base_path: &Path) -> Result<Vec<PathBuf>> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "class") {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    Ok(rx.iter().collect())
}

/// Lists the class names below a directory classpath entry.
pub fn scan_directory_classes(root: &Path) -> Result<Vec<String>> {
    let mut classes: Vec<String> = scan_class_files(root)?
        .into_iter()
        .filter_map(|path| {
            let rel = path.strip_prefix(root).ok()?;
            let member = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            class_file_to_name(&member)
        })
        .collect();
    classes.sort();
    Ok(classes)
}
