//! Plumb CLI - plumb command

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// Plumb - content-addressed object store plumbing
#[derive(Parser)]
#[command(name = "plumb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty repository in the current directory
    Init,
    /// Compute object ids for files, optionally storing them as blobs
    HashObject {
        /// Write the objects into the object store
        #[arg(short = 'w')]
        write: bool,
        /// Read the content from stdin instead of files
        #[arg(long)]
        stdin: bool,
        /// Files to hash
        files: Vec<PathBuf>,
    },
    /// Show the content, kind or size of an object
    CatFile {
        #[command(flatten)]
        mode: CatFileMode,
        /// Object id (full or abbreviated)
        object: String,
    },
    /// List the entries of a tree object
    LsTree {
        /// Only print entry names
        #[arg(long)]
        name_only: bool,
        /// Tree id (full or abbreviated)
        tree: String,
    },
    /// Store a directory (default: worktree root) as a tree object
    WriteTree {
        /// Directory to snapshot
        dir: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct CatFileMode {
    /// Pretty-print the object content
    #[arg(short = 'p')]
    pretty: bool,
    /// Print the object kind
    #[arg(short = 't')]
    kind: bool,
    /// Print the payload size in bytes
    #[arg(short = 's')]
    size: bool,
    /// Exit with status 0 if the object exists and is valid, 1 otherwise
    #[arg(short = 'e')]
    exists: bool,
}

fn main() {
    // Logs go to stderr so stdout stays byte-exact
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => cmd::init::run(),
        Commands::HashObject { write, stdin, files } => cmd::hash_object::run(write, stdin, &files),
        Commands::CatFile { mode, object } => {
            let mode = if mode.pretty {
                cmd::cat_file::Mode::Pretty
            } else if mode.kind {
                cmd::cat_file::Mode::Kind
            } else if mode.size {
                cmd::cat_file::Mode::Size
            } else {
                cmd::cat_file::Mode::Exists
            };
            match cmd::cat_file::run(mode, &object) {
                // `-e` reports a missing object through the exit status alone
                Ok(false) => std::process::exit(1),
                other => other.map(|_| ()),
            }
        }
        Commands::LsTree { name_only, tree } => cmd::ls_tree::run(&tree, name_only),
        Commands::WriteTree { dir } => cmd::write_tree::run(dir.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(util::exit_code(&e));
    }
}
