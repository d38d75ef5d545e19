use anyhow::Result;
use clap::Parser;
use jde_classpath::bridge::Connection;
use jde_classpath::cache::ListingCache;
use jde_classpath::cli::{Cli, Commands, OutputFormat};
use jde_classpath::config::{
    clear_db, open_listing_cache, resolve_boot_settings, resolve_classpath, resolve_db_path,
};
use jde_classpath::entry::EntryCache;
use jde_classpath::handler::ClasspathHandler;
use jde_classpath::lisp::Value;
use jde_classpath::project::{BootClassPath, ProjectClasses, Workspace};
use serde::Serialize;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = parse_cli()?;

    // stdout carries results and the bridge protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jde_classpath=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command.clone() {
        Commands::Clear => {
            let db_path = resolve_db_path(&cli)?;
            clear_db(&db_path)?;
        }
        Commands::Stats => {
            let db_path = resolve_db_path(&cli)?;
            let cache = ListingCache::open(db_path)?;
            let stats = cache.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Find {
            class_name,
            classpath,
            format,
        } => {
            let (boot, cache) = load_boot(&cli)?;
            let classpath = resolve_classpath(classpath.as_deref());
            let result = find_class(&classpath, &boot, cache, &normalize_class_name(&class_name));
            write_find_output(&result, format)?;
        }
        Commands::Entries { classpath } => {
            let (boot, cache) = load_boot(&cli)?;
            let classpath = resolve_classpath(classpath.as_deref());
            let project = ProjectClasses::new(&classpath, &boot, cache);
            let entries: Vec<EntryRow> = project
                .entries()
                .iter()
                .map(|e| EntryRow {
                    entry: e.describe(),
                    classes: e.class_count(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Serve { classpath, preload } => {
            let (boot, cache) = load_boot(&cli)?;
            let mut workspace = Workspace::new(boot, cache);
            let project = workspace.set_project(&resolve_classpath(classpath.as_deref()));
            if preload {
                let start = Instant::now();
                let classes = project.preload();
                info!(
                    classes,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "preloaded project classpath"
                );
            }

            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            let mut conn = Connection::new(BufReader::new(stdin.lock()), BufWriter::new(stdout.lock()));
            conn.serve(&mut ClasspathHandler::new(workspace))?;
        }
    }

    Ok(())
}

fn parse_cli() -> Result<Cli> {
    let args: Vec<String> = std::env::args().collect();
    Ok(Cli::parse_from(rewrite_args_for_implicit_find(args)))
}

fn rewrite_args_for_implicit_find(mut args: Vec<String>) -> Vec<String> {
    if args.len() <= 1 {
        return args;
    }

    let subcommands = ["find", "serve", "entries", "stats", "clear", "help"];
    let valued = ["--java-home", "--boot-classpath", "--ext-dirs", "--db"];

    let mut idx = 1usize;
    while idx < args.len() {
        let a = args[idx].as_str();
        if a == "--" {
            idx += 1;
            break;
        }

        if valued.contains(&a) {
            idx += 2;
            continue;
        }

        if a.starts_with('-') {
            idx += 1;
            continue;
        }

        break;
    }

    if idx < args.len() {
        let token = args[idx].as_str();
        if !subcommands.contains(&token) {
            args.insert(idx, "find".to_string());
        }
    }

    args
}

fn load_boot(cli: &Cli) -> Result<(BootClassPath, Arc<EntryCache>)> {
    let listings = open_listing_cache(cli)?;
    let cache = Arc::new(EntryCache::new(listings));
    let boot = BootClassPath::load(&resolve_boot_settings(cli), &cache);
    Ok((boot, cache))
}

/// Accepts `import a.b.C;` and `a.b.C` as well as a bare name; only the
/// last segment is looked up.
fn normalize_class_name(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("import")
        && rest.starts_with(char::is_whitespace)
    {
        s = rest.trim();
    }
    if s.ends_with(';') {
        s = s.trim_end_matches(';').trim();
    }
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    match s.rsplit_once('.') {
        Some((_, simple)) if !simple.is_empty() => simple.to_string(),
        _ => s,
    }
}

#[derive(Debug, Serialize)]
struct EntryRow {
    entry: String,
    classes: usize,
}

#[derive(Debug, Serialize)]
struct FindResult {
    class_name: String,
    classpath: String,
    entries: usize,
    duration_ms: u64,
    matches: Vec<String>,
}

fn find_class(
    classpath: &str,
    boot: &BootClassPath,
    cache: Arc<EntryCache>,
    class_name: &str,
) -> FindResult {
    let start = Instant::now();
    let project = ProjectClasses::new(classpath, boot, cache);
    let matches = project.class_names(class_name);

    FindResult {
        class_name: class_name.to_string(),
        classpath: classpath.to_string(),
        entries: project.entries().len(),
        duration_ms: start.elapsed().as_millis() as u64,
        matches,
    }
}

fn write_find_output(result: &FindResult, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => result.matches.join("\n"),
        OutputFormat::Lisp => Value::from(result.matches.clone()).to_string(),
    };

    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_class_name_strips_import_and_package() {
        assert_eq!(normalize_class_name("import java.util. List ;"), "List");
        assert_eq!(normalize_class_name("Map"), "Map");
        assert_eq!(normalize_class_name("java.util.Map.Entry"), "Entry");
        assert_eq!(normalize_class_name("Importer"), "Importer");
        assert_eq!(normalize_class_name("importer"), "importer");
        assert_eq!(normalize_class_name("import\tjava.io.File;"), "File");
    }

    #[test]
    fn rewrite_args_for_implicit_find_skips_global_option_values() {
        let args = vec![
            "jde-classpath".to_string(),
            "--java-home".to_string(),
            "/opt/jdk".to_string(),
            "--no-cache".to_string(),
            "List".to_string(),
            "-f".to_string(),
            "text".to_string(),
        ];

        let rewritten = rewrite_args_for_implicit_find(args);
        assert_eq!(rewritten[1], "--java-home");
        assert_eq!(rewritten[2], "/opt/jdk");
        assert_eq!(rewritten[3], "--no-cache");
        assert_eq!(rewritten[4], "find");
        assert_eq!(rewritten[5], "List");
    }

    #[test]
    fn rewrite_args_leaves_subcommands_alone() {
        let args = vec!["jde-classpath".to_string(), "serve".to_string()];
        assert_eq!(rewrite_args_for_implicit_find(args.clone()), args);
    }
}
