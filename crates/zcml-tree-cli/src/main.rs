use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use zcml_tree::{SearchPath, TreeOptions, TreeWalker, DEFAULT_FILENAME, DEFAULT_INIT_FILE};

/// Environment variable whose entries extend the search path
const SEARCH_PATH_ENV: &str = "PYTHONPATH";

#[derive(Debug, Parser)]
#[command(name = "zcml-tree", version, about = "Show the ZCML include tree")]
struct Args {
    /// Root ZCML file
    #[arg(value_name = "FILENAME", default_value = DEFAULT_FILENAME)]
    filename: String,
    /// Package the root file belongs to
    #[arg(short, long)]
    package: Option<String>,
    /// Also print files that were already shown, marked [seen]
    #[arg(long)]
    show_seen: bool,
    /// Print absolute file paths instead of package:filename
    #[arg(long)]
    full_filenames: bool,
    /// Directory to search for packages (repeatable, searched first)
    #[arg(short = 'I', long = "search-path", value_name = "DIR")]
    search_path: Vec<PathBuf>,
    /// Ignore search path entries from PYTHONPATH
    #[arg(long)]
    no_env_path: bool,
    /// File marking a directory as a package
    #[arg(long, value_name = "NAME", default_value = DEFAULT_INIT_FILE)]
    init_file: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let search_path = build_search_path(&args)?;
    debug!(dirs = ?search_path.dirs(), "search path");

    let options = TreeOptions::new(args.show_seen, args.full_filenames);
    let stdout = io::stdout().lock();
    let mut walker = TreeWalker::new(&search_path, options, stdout)?;
    let summary = walker
        .print_tree(args.package.as_deref(), &args.filename)
        .with_context(|| format!("failed to print include tree of {}", args.filename))?;
    debug!(?summary, "done");

    walker.into_inner().flush().context("failed to flush stdout")?;
    Ok(())
}

/// Explicit directories, then PYTHONPATH entries, then the current directory
fn build_search_path(args: &Args) -> Result<SearchPath> {
    let mut search_path = SearchPath::new(args.search_path.iter().cloned())
        .with_init_file(args.init_file.as_str());

    if !args.no_env_path {
        if let Some(value) = env::var_os(SEARCH_PATH_ENV) {
            env::split_paths(&value)
                .filter(|dir| !dir.as_os_str().is_empty())
                .for_each(|dir| search_path.push(dir));
        }
    }

    let cwd = env::current_dir().context("failed to determine current directory")?;
    search_path.push(cwd);
    Ok(search_path)
}
