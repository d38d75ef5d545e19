use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "jde-classpath")]
#[command(about = "List Java classes on a classpath for editor completion and serve Emacs over a Lisp line protocol")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JDK whose class list and module image join the boot classpath (default: $JAVA_HOME)
    #[arg(long, value_name = "DIR")]
    pub java_home: Option<PathBuf>,

    /// Boot classpath archives (default: $JDE_BOOT_CLASSPATH)
    #[arg(long, value_name = "PATHS")]
    pub boot_classpath: Option<String>,

    /// Extension directories; every archive inside joins the boot classpath (default: $JDE_EXT_DIRS)
    #[arg(long, value_name = "DIRS")]
    pub ext_dirs: Option<String>,

    /// Skip boot classpath, extension directories and the JDK entirely
    #[arg(long)]
    pub no_boot: bool,

    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Do not read or write the persistent listing cache
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print the fully-qualified names of a class
    Find {
        class_name: String,

        /// Project classpath (default: $CLASSPATH)
        #[arg(short = 'c', long, value_name = "PATHS")]
        classpath: Option<String>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Answer bridge requests on stdin/stdout
    Serve {
        /// Initial project classpath (default: $CLASSPATH)
        #[arg(short = 'c', long, value_name = "PATHS")]
        classpath: Option<String>,

        /// Load every entry before reading requests
        #[arg(long)]
        preload: bool,
    },
    /// List the entries of a project classpath
    Entries {
        #[arg(short = 'c', long, value_name = "PATHS")]
        classpath: Option<String>,
    },
    Stats,
    Clear,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
    Lisp,
}
