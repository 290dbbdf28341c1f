//! Graph mapping CLI.
//!
//! Provides the `ogm` binary. `plan` prints the single-statement mutation
//! program for a JSON graph document, `delete` prints the delete-by-id
//! statement for one of its records, and `render` resolves a query template
//! against a JSON parameter file.
//!
//! Log verbosity follows `RUST_LOG` (default `warn`); logs go to stderr so
//! stdout carries only statement text.

mod document;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use document::DocumentError;
use ogm_core::PlanConfig;
use ogm_render::{Order, Query};

/// Graph mapping planner and query renderer.
#[derive(Parser)]
#[command(name = "ogm", about = "Graph mutation planner and query renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Plan the mutation program that saves a graph document's root.
    Plan {
        /// Path to the graph document (JSON).
        #[arg(short, long)]
        graph: PathBuf,

        /// Path to a planner configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the statements and alias table as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the delete-by-id statement for one record.
    Delete {
        /// Path to the graph document (JSON).
        #[arg(short, long)]
        graph: PathBuf,

        /// Key of the record to delete.
        #[arg(short, long)]
        record: String,

        /// Path to a planner configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Resolve a query template.
    Render {
        /// Template text with `${name}` / `#{name}` placeholders.
        #[arg(short, long)]
        template: String,

        /// Path to a parameter file (JSON object).
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Sort order as `property[:asc|desc]`; repeatable.
        #[arg(long)]
        sort: Vec<Order>,

        /// Prefix for sort properties (e.g. `n` for `n.age`).
        #[arg(long)]
        sort_prefix: Option<String>,

        #[arg(long)]
        skip: Option<u64>,

        #[arg(long)]
        limit: Option<u64>,

        /// Path to a planner configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Plan {
            graph,
            config,
            json,
        } => run_plan(&graph, config.as_deref(), json),
        Commands::Delete {
            graph,
            record,
            config,
        } => run_delete(&graph, &record, config.as_deref()),
        Commands::Render {
            template,
            params,
            sort,
            sort_prefix,
            skip,
            limit,
            config,
        } => {
            let mut query = Query::new(template);
            for order in sort {
                query = query.sort(order);
            }
            if let Some(prefix) = sort_prefix {
                query = query.sort_prefix(prefix);
            }
            if let Some(skip) = skip {
                query = query.skip(skip);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            run_render(query, params.as_deref(), config.as_deref())
        }
    };
    process::exit(exit_code);
}

fn read(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn load_config(path: Option<&Path>) -> Result<PlanConfig, DocumentError> {
    match path {
        Some(path) => Ok(PlanConfig::from_json_str(&read(path)?)?),
        None => Ok(PlanConfig::default()),
    }
}

fn load(graph: &Path, config: Option<&Path>) -> Result<(document::LoadedGraph, PlanConfig), DocumentError> {
    let config = load_config(config)?;
    let doc = document::parse_graph(&read(graph)?)?;
    let loaded = document::load_graph(&doc, &config)?;
    Ok((loaded, config))
}

/// Exit code for a document error: planning failures are 1, everything
/// else (I/O, malformed input) is 3.
fn report(err: &DocumentError) -> i32 {
    eprintln!("Error: {}", err);
    match err {
        DocumentError::Planning(_) => 1,
        _ => 3,
    }
}

/// Returns exit code: 0 = success, 1 = planning error,
/// 3 = I/O or document error.
fn run_plan(graph: &Path, config: Option<&Path>, json: bool) -> i32 {
    let (loaded, config) = match load(graph, config) {
        Ok(loaded) => loaded,
        Err(e) => return report(&e),
    };

    let plan = match ogm_plan::plan(&loaded.graph, loaded.root, &config) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Planning error: {}", e);
            return 1;
        }
    };

    if json {
        match serde_json::to_string_pretty(&plan) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to serialize plan: {}", e);
                return 3;
            }
        }
    } else if plan.is_empty() {
        eprintln!("Nothing to save: the root's cascade does not include PERSIST");
    } else {
        println!("{}", plan.program());
    }
    0
}

/// Returns exit code: 0 = success, 1 = planning error,
/// 3 = I/O or document error.
fn run_delete(graph: &Path, record: &str, config: Option<&Path>) -> i32 {
    let (loaded, config) = match load(graph, config) {
        Ok(loaded) => loaded,
        Err(e) => return report(&e),
    };
    let id = match loaded.record(record) {
        Ok(id) => id,
        Err(e) => return report(&e),
    };

    match ogm_plan::plan_delete(&loaded.graph, id, &config) {
        Ok(statement) => {
            println!("{}", statement);
            0
        }
        Err(e) => {
            eprintln!("Planning error: {}", e);
            1
        }
    }
}

/// Returns exit code: 0 = success, 1 = render error,
/// 3 = I/O or parameter file error.
fn run_render(query: Query, params: Option<&Path>, config: Option<&Path>) -> i32 {
    let config = match load_config(config) {
        Ok(config) => config,
        Err(e) => return report(&e),
    };
    let query = match params {
        Some(path) => match read(path).and_then(|text| document::parse_params(&text)) {
            Ok(params) => query.params(params),
            Err(e) => return report(&e),
        },
        None => query,
    };

    match query.render(&config) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Render error: {}", e);
            1
        }
    }
}
